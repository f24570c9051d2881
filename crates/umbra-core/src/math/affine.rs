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

//! A 2D affine transformation (linear part + translation).
//!
//! Every coordinate space hop in the pipeline is an `Affine2`: world to
//! screen, world to light-space accumulation pixels, world to a light's
//! private shadow buffer, and the final accumulation-to-screen transform.

use super::{Rect, Vec2, EPSILON};
use std::ops::Mul;

/// A 2D affine transform mapping `p` to `x_axis * p.x + y_axis * p.y + translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine2 {
    /// Image of the unit X vector.
    pub x_axis: Vec2,
    /// Image of the unit Y vector.
    pub y_axis: Vec2,
    /// Image of the origin.
    pub translation: Vec2,
}

impl Default for Affine2 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Affine2 {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        x_axis: Vec2::X,
        y_axis: Vec2::Y,
        translation: Vec2::ZERO,
    };

    /// A pure translation.
    #[inline]
    pub const fn from_translation(translation: Vec2) -> Self {
        Self {
            x_axis: Vec2::X,
            y_axis: Vec2::Y,
            translation,
        }
    }

    /// A non-uniform scale about the origin.
    #[inline]
    pub const fn from_scale(scale: Vec2) -> Self {
        Self {
            x_axis: Vec2::new(scale.x, 0.0),
            y_axis: Vec2::new(0.0, scale.y),
            translation: Vec2::ZERO,
        }
    }

    /// Scale followed by translation: `p * scale + translation`.
    #[inline]
    pub const fn from_scale_translation(scale: Vec2, translation: Vec2) -> Self {
        Self {
            x_axis: Vec2::new(scale.x, 0.0),
            y_axis: Vec2::new(0.0, scale.y),
            translation,
        }
    }

    /// A rotation about the origin.
    #[inline]
    pub fn from_rotation(angle: f32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            x_axis: Vec2::new(cos, sin),
            y_axis: Vec2::new(-sin, cos),
            translation: Vec2::ZERO,
        }
    }

    /// Uniform scale by `factor` keeping `center` fixed.
    #[inline]
    pub fn scale_about(center: Vec2, factor: f32) -> Self {
        Self::from_scale_translation(Vec2::splat(factor), center - center * factor)
    }

    /// Maps the rectangle `from` onto the rectangle `to` (axis aligned, no rotation).
    pub fn rect_to_rect(from: Rect, to: Rect) -> Self {
        let from_size = from.size();
        let to_size = to.size();
        let scale = Vec2::new(
            if from_size.x.abs() > EPSILON { to_size.x / from_size.x } else { 1.0 },
            if from_size.y.abs() > EPSILON { to_size.y / from_size.y } else { 1.0 },
        );
        Self::from_scale_translation(scale, to.min - from.min * scale)
    }

    /// Transforms a point.
    #[inline]
    pub fn transform_point(&self, p: Vec2) -> Vec2 {
        self.x_axis * p.x + self.y_axis * p.y + self.translation
    }

    /// Transforms a direction (ignores translation).
    #[inline]
    pub fn transform_vector(&self, v: Vec2) -> Vec2 {
        self.x_axis * v.x + self.y_axis * v.y
    }

    /// Transforms an axis-aligned rectangle and returns the bounds of the result.
    pub fn transform_rect(&self, rect: Rect) -> Rect {
        let corners = rect.corners().map(|c| self.transform_point(c));
        Rect::from_points(&corners)
    }

    /// Average linear scale factor, used to convert world radii into pixels.
    #[inline]
    pub fn uniform_scale(&self) -> f32 {
        self.determinant().abs().sqrt()
    }

    /// Determinant of the linear part.
    #[inline]
    pub fn determinant(&self) -> f32 {
        self.x_axis.x * self.y_axis.y - self.y_axis.x * self.x_axis.y
    }

    /// Returns the inverse transform, or `None` if the linear part is singular.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() <= f32::EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let x_axis = Vec2::new(self.y_axis.y * inv_det, -self.x_axis.y * inv_det);
        let y_axis = Vec2::new(-self.y_axis.x * inv_det, self.x_axis.x * inv_det);
        let t = self.translation;
        let translation = -(x_axis * t.x + y_axis * t.y);
        Some(Self {
            x_axis,
            y_axis,
            translation,
        })
    }

    /// Returns the transform that applies `self` first and `next` afterwards.
    #[inline]
    pub fn then(self, next: Self) -> Self {
        next * self
    }
}

/// `a * b` applies `b` first, then `a`.
impl Mul for Affine2 {
    type Output = Affine2;
    fn mul(self, rhs: Affine2) -> Affine2 {
        Affine2 {
            x_axis: self.transform_vector(rhs.x_axis),
            y_axis: self.transform_vector(rhs.y_axis),
            translation: self.transform_point(rhs.translation),
        }
    }
}
