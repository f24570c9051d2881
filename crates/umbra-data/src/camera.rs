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

//! The 2D camera the pipeline renders from.

use serde::{Deserialize, Serialize};
use umbra_core::math::{Affine2, Extent2D, Rect, Vec2};

/// An axis-aligned 2D camera.
///
/// `position` is the world point shown at the center of the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Camera2D {
    /// World point at the viewport center.
    pub position: Vec2,
    /// Screen pixels per world unit.
    pub zoom: f32,
    /// Viewport size in pixels.
    pub viewport: Extent2D,
}

impl Default for Camera2D {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            zoom: 1.0,
            viewport: Extent2D::new(1280, 720),
        }
    }
}

impl Camera2D {
    /// Creates a camera centered on `position`.
    pub fn new(position: Vec2, zoom: f32, viewport: Extent2D) -> Self {
        Self {
            position,
            zoom,
            viewport,
        }
    }

    fn half_viewport(&self) -> Vec2 {
        Vec2::new(self.viewport.width as f32, self.viewport.height as f32) * 0.5
    }

    fn safe_zoom(&self) -> f32 {
        if self.zoom.is_finite() && self.zoom > 0.0 {
            self.zoom
        } else {
            1.0
        }
    }

    /// World to screen pixels: `(p - position) * zoom + viewport / 2`.
    pub fn world_to_screen(&self) -> Affine2 {
        let zoom = self.safe_zoom();
        Affine2::from_scale_translation(
            Vec2::splat(zoom),
            self.half_viewport() - self.position * zoom,
        )
    }

    /// Screen pixels to world.
    pub fn screen_to_world(&self) -> Affine2 {
        let zoom = self.safe_zoom();
        Affine2::from_scale_translation(
            Vec2::splat(1.0 / zoom),
            self.position - self.half_viewport() / zoom,
        )
    }

    /// The world rectangle covered by the viewport.
    pub fn visible_bounds(&self) -> Rect {
        Rect::from_center_size(self.position, self.half_viewport() * 2.0 / self.safe_zoom())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn center_maps_to_viewport_center() {
        let cam = Camera2D::new(Vec2::new(100.0, 50.0), 2.0, Extent2D::new(200, 100));
        let p = cam.world_to_screen().transform_point(cam.position);
        assert_relative_eq!(p.x, 100.0);
        assert_relative_eq!(p.y, 50.0);

        let back = cam.screen_to_world().transform_point(Vec2::new(0.0, 0.0));
        assert_relative_eq!(back.x, 50.0);
        assert_relative_eq!(back.y, 25.0);
    }

    #[test]
    fn visible_bounds_shrink_with_zoom() {
        let cam = Camera2D::new(Vec2::ZERO, 4.0, Extent2D::new(400, 200));
        let b = cam.visible_bounds();
        assert_relative_eq!(b.width(), 100.0);
        assert_relative_eq!(b.height(), 50.0);
        assert_relative_eq!(b.min.x, -50.0);
    }
}
