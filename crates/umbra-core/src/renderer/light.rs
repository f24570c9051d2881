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

//! Defines the 2D light type borrowed by the light accumulator each frame.
//!
//! Lights are owned by gameplay objects. The pipeline only ever sees a
//! per-frame slice of them and classifies each one as *simple* (no shadow,
//! batched into one draw) or *dynamic* (soft shadow through the multi-pass
//! shrink-and-re-blend sequence).

use crate::math::{LinearRgba, Rect, Vec2};
use serde::{Deserialize, Serialize};

/// Restricts a light to a cone, turning a point light into a spot light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightCone {
    /// Angle of the cone axis in radians, measured from +X (y-down, clockwise).
    pub direction: f32,
    /// Half of the cone's opening angle in radians.
    pub half_angle: f32,
}

/// A 2D point or spot light.
///
/// # Examples
///
/// ```
/// use umbra_core::renderer::light::Light2D;
/// use umbra_core::math::{LinearRgba, Vec2};
///
/// let torch = Light2D::point(Vec2::new(64.0, 32.0), 96.0, LinearRgba::rgb(1.0, 0.8, 0.5))
///     .with_shadow(true);
/// assert!(torch.is_dynamic());
/// assert_eq!(torch.effective_radius(128.0), 96.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Light2D {
    /// World position of the light.
    pub position: Vec2,
    /// Radius in world units. Zero or less means "use the configured default".
    pub radius: f32,
    /// Light color in linear space.
    pub color: LinearRgba,
    /// Multiplier applied to `color` at the light center.
    pub intensity: f32,
    /// Whether the light casts a soft shadow.
    pub casts_shadow: bool,
    /// Optional spot cone.
    pub cone: Option<LightCone>,
}

impl Default for Light2D {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            radius: 0.0,
            color: LinearRgba::WHITE,
            intensity: 1.0,
            casts_shadow: false,
            cone: None,
        }
    }
}

impl Light2D {
    /// Creates a point light without shadow.
    pub fn point(position: Vec2, radius: f32, color: LinearRgba) -> Self {
        Self {
            position,
            radius,
            color,
            ..Default::default()
        }
    }

    /// Returns a copy with the shadow flag set.
    #[must_use]
    pub fn with_shadow(mut self, casts_shadow: bool) -> Self {
        self.casts_shadow = casts_shadow;
        self
    }

    /// Returns a copy restricted to a cone.
    #[must_use]
    pub fn with_cone(mut self, direction: f32, half_angle: f32) -> Self {
        self.cone = Some(LightCone {
            direction,
            half_angle,
        });
        self
    }

    /// Returns a copy with another intensity.
    #[must_use]
    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }

    /// A dynamic light casts a shadow; every other light is simple.
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.casts_shadow
    }

    /// The light radius, falling back to `default_radius`.
    #[inline]
    pub fn effective_radius(&self, default_radius: f32) -> f32 {
        if self.radius > 0.0 {
            self.radius
        } else {
            default_radius
        }
    }

    /// The color at the light center.
    #[inline]
    pub fn center_color(&self) -> LinearRgba {
        self.color.scale_rgb(self.intensity)
    }

    /// World-space bounds of the lit area.
    pub fn bounds(&self, default_radius: f32) -> Rect {
        Rect::from_circle(self.position, self.effective_radius(default_radius))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_radius_fallback() {
        let light = Light2D::point(Vec2::ZERO, 0.0, LinearRgba::WHITE);
        assert_eq!(light.effective_radius(128.0), 128.0);
        assert_eq!(light.bounds(10.0).width(), 20.0);
    }

    #[test]
    fn deserializes_partial_documents() {
        let light: Light2D =
            serde_json::from_str(r#"{ "position": { "x": 1.0, "y": 2.0 }, "castsShadow": true }"#)
                .unwrap();
        assert!(light.is_dynamic());
        assert_eq!(light.intensity, 1.0);
        assert_eq!(light.position, Vec2::new(1.0, 2.0));
    }
}
