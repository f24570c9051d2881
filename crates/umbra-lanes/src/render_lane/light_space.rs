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

//! The light-space accumulation frame.
//!
//! Lighting is accumulated at reduced resolution over a region slightly
//! larger than the camera view, so lights and shadows entering the screen
//! edge are already lit. The used area of the accumulator is its top-left
//! `content` pixels.

use umbra_core::math::{Affine2, Extent2D, Rect, Vec2};
use umbra_core::renderer::{LightingConfig, SizeClass};
use umbra_data::Camera2D;

/// Mapping between world space and accumulator pixels for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSpace {
    /// World region covered by the accumulator.
    pub region: Rect,
    /// Used accumulator pixels.
    pub content: Extent2D,
    /// World to accumulator pixels.
    pub world_to_light: Affine2,
}

impl LightSpace {
    /// Computes the frame for `camera`.
    ///
    /// The region is the visible bounds grown by `finalTextureCameraScale`;
    /// its resolution is the viewport scaled by `finalTextureSizeScale` and
    /// the camera scale, capped at `max_side`.
    pub fn compute(camera: &Camera2D, config: &LightingConfig, max_side: u32) -> Self {
        let camera_scale = positive_or(config.final_texture_camera_scale, 1.0);
        let size_scale = positive_or(config.final_texture_size_scale, 1.0);
        let region = camera.visible_bounds().scale_about_center(camera_scale);

        let max_side = max_side.max(1);
        let scale = size_scale * camera_scale;
        let side = |pixels: u32| ((pixels as f32 * scale).ceil() as u32).clamp(1, max_side);
        let content = Extent2D::new(side(camera.viewport.width), side(camera.viewport.height));

        let world_to_light = Affine2::rect_to_rect(
            region,
            Rect::new(
                Vec2::ZERO,
                Vec2::new(content.width as f32, content.height as f32),
            ),
        );
        Self {
            region,
            content,
            world_to_light,
        }
    }

    /// Size class of a target able to hold the content.
    pub fn class(&self) -> SizeClass {
        SizeClass::for_extent(self.content)
    }

    /// World units to accumulator pixels.
    pub fn pixels_per_unit(&self) -> f32 {
        self.world_to_light.uniform_scale()
    }

    /// Accumulator pixels to screen pixels for `camera`.
    ///
    /// `None` if the region is degenerate.
    pub fn final_transform(&self, camera: &Camera2D) -> Option<Affine2> {
        Some(self.world_to_light.inverse()?.then(camera.world_to_screen()))
    }
}

fn positive_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        fallback
    }
}
