// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Provides the 2D mathematics primitives used by the lighting pipeline.
//!
//! All angular functions operate in **radians**. Screen and world space both
//! use a y-down convention, so a rotation by a positive angle turns clockwise
//! on screen.

/// A small constant for floating-point comparisons.
pub const EPSILON: f32 = 1e-5;

pub use std::f32::consts::{FRAC_PI_2, PI, TAU};

pub mod affine;
pub mod color;
pub mod dimension;
pub mod geometry;
pub mod vector;

pub use self::affine::Affine2;
pub use self::color::LinearRgba;
pub use self::dimension::Extent2D;
pub use self::geometry::Rect;
pub use self::vector::Vec2;

/// Clamps a floating-point value to the `[0.0, 1.0]` range.
///
/// # Examples
///
/// ```
/// use umbra_core::math::saturate;
/// assert_eq!(saturate(1.5), 1.0);
/// assert_eq!(saturate(-0.5), 0.0);
/// ```
#[inline]
pub fn saturate(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Linearly interpolates between `a` and `b` without clamping `t`.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Returns the smallest power of two greater than or equal to `value`.
///
/// `0` maps to `1`.
///
/// ```
/// use umbra_core::math::next_power_of_two;
/// assert_eq!(next_power_of_two(0), 1);
/// assert_eq!(next_power_of_two(33), 64);
/// assert_eq!(next_power_of_two(64), 64);
/// ```
#[inline]
pub fn next_power_of_two(value: u32) -> u32 {
    value.max(1).next_power_of_two()
}
