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

//! Rendering lane - deferred 2D lighting.
//!
//! A frame accumulates light in a light-space texture (ambient, simple
//! lights, shadowed dynamic lights, emissive glow, directional light) and
//! darkens it by the viewer's vision. The result is multiplied over the
//! scene by [`LightingCompositor::composite`].

mod blur;
mod compositor;
mod frame;
mod geometry;
mod light_accumulator;
mod light_space;
mod sub_passes;
mod swap_pool;
mod world;

pub use blur::{blur_taps, BLUR_CLEAR, BLUR_TAP_WEIGHT};
pub use compositor::*;
pub use frame::FrameReport;
pub use geometry::*;
pub use light_accumulator::LightAccumulator;
pub use light_space::*;
pub use swap_pool::*;
pub use world::*;
