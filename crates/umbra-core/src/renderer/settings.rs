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

//! Runtime tunables of the lighting compositor and the terrain cache.
//!
//! Both structs serialize with the console names (`maxSimpleLights`,
//! `shadowPassCount`, ...) and implement [`NamedOptions`], so they can be
//! loaded from JSON and mutated one option at a time.

use crate::config::NamedOptions;
use crate::math::{LinearRgba, FRAC_PI_2};
use serde::{Deserialize, Serialize};

/// Tunables of the light accumulator, the sub-passes and the final compositor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LightingConfig {
    /// Most simple (shadowless) lights rendered per frame.
    pub max_simple_lights: u32,
    /// Most dynamic (shadow-casting) lights rendered per frame.
    pub max_dynamic_lights: u32,
    /// World radius of lights that do not set their own.
    pub default_light_radius: f32,
    /// Smallest side, in texels, of a dynamic light's private buffer.
    pub light_buffer_min_size: u32,
    /// Largest side, in texels, of a dynamic light's private buffer.
    pub light_buffer_max_size: u32,
    /// Number of rim segments of a light's radial fan.
    pub light_fan_segments: u32,
    /// Color the accumulator is cleared to each frame.
    pub ambient_color: LinearRgba,

    /// Number of shrink-and-re-blend passes for soft shadows.
    pub shadow_pass_count: u32,
    /// Geometric growth of the stretch between consecutive passes.
    pub shadow_cast_scale: f32,
    /// Stretch factor of the first pass.
    pub shadow_pass_start_size: f32,
    /// Opacity of each re-blend. Lower values give softer shadows.
    pub shadow_softening: f32,

    /// Enables the emissive sub-pass.
    pub emissive_light_enable: bool,
    /// Blur iterations applied to the emissive buffer.
    pub emissive_blur_pass_count: u32,
    /// Blur tap distance in texels.
    pub emissive_blur_size: f32,
    /// Opacity of the sharp emissive composite.
    pub emissive_alpha: f32,
    /// Opacity of the blurred (bloom) emissive composite.
    pub emissive_bloom_alpha: f32,

    /// Enables the directional light sub-pass.
    pub directional_light_enable: bool,
    /// Direction the light travels, in radians from +X (y-down).
    pub directional_light_angle: f32,
    /// Color of the directional light.
    pub directional_light_color: LinearRgba,
    /// Length of cast shadows, in world units.
    pub directional_shadow_length: f32,
    /// Offset re-blend passes used to extrude shadows.
    pub directional_shadow_pass_count: u32,
    /// Blur iterations applied to the directional mask.
    pub directional_blur_pass_count: u32,
    /// Opacity of the directional composite.
    pub directional_light_redraw_alpha: f32,

    /// Enables the vision sub-pass.
    pub vision_enable: bool,
    /// Radius of the viewer's visibility fan, in world units.
    pub vision_radius: f32,
    /// Blur iterations applied to the occluder mask before casting.
    pub vision_pre_blur_pass_count: u32,
    /// Blur iterations applied to the final visibility mask.
    pub vision_post_blur_pass_count: u32,
    /// Blur tap distance in texels.
    pub vision_blur_size: f32,
    /// Strength of the darkening outside the visible area.
    pub vision_alpha: f32,

    /// Accumulator resolution relative to the viewport.
    pub final_texture_size_scale: f32,
    /// Accumulated region relative to the camera's visible bounds.
    pub final_texture_camera_scale: f32,
    /// Freezes the displayed light mask for inspection.
    pub show_final_accumulator: bool,
    /// Largest side of any scratch target.
    pub max_texture_size: u32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            max_simple_lights: 64,
            max_dynamic_lights: 8,
            default_light_radius: 128.0,
            light_buffer_min_size: 32,
            light_buffer_max_size: 256,
            light_fan_segments: 24,
            ambient_color: LinearRgba::rgb(0.08, 0.08, 0.12),

            shadow_pass_count: 4,
            shadow_cast_scale: 2.0,
            shadow_pass_start_size: 1.1,
            shadow_softening: 0.85,

            emissive_light_enable: true,
            emissive_blur_pass_count: 2,
            emissive_blur_size: 1.5,
            emissive_alpha: 1.0,
            emissive_bloom_alpha: 0.6,

            directional_light_enable: true,
            directional_light_angle: FRAC_PI_2 * 0.5,
            directional_light_color: LinearRgba::rgb(0.35, 0.33, 0.3),
            directional_shadow_length: 24.0,
            directional_shadow_pass_count: 3,
            directional_blur_pass_count: 1,
            directional_light_redraw_alpha: 0.5,

            vision_enable: false,
            vision_radius: 256.0,
            vision_pre_blur_pass_count: 1,
            vision_post_blur_pass_count: 2,
            vision_blur_size: 1.0,
            vision_alpha: 1.0,

            final_texture_size_scale: 0.5,
            final_texture_camera_scale: 1.25,
            show_final_accumulator: false,
            max_texture_size: 2048,
        }
    }
}

impl NamedOptions for LightingConfig {
    const SECTION: &'static str = "lighting";
}

impl LightingConfig {
    /// Stretch factor of soft-shadow pass `index` (0-based).
    ///
    /// Pass 0 stretches by `shadowPassStartSize`; the excess over 1 then
    /// grows by `shadowCastScale` each pass.
    pub fn shadow_pass_scale(&self, index: u32) -> f32 {
        let exponent = i32::try_from(index).unwrap_or(i32::MAX);
        1.0 + (self.shadow_pass_start_size - 1.0) * self.shadow_cast_scale.powi(exponent)
    }
}

/// Tunables of the terrain batch cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TerrainRenderConfig {
    /// Uses retained per-patch buffers. When off every patch renders slowly.
    pub cache_enable: bool,
    /// Most cache rebuilds per frame; `0` means unlimited. Patches over the
    /// limit render slowly until a later frame catches up.
    pub limit_cache_update: u32,
    /// Render groups per patch above which a warning is raised.
    pub render_group_budget: u32,
    /// Skips layers behind the occlusion plane in occluder passes.
    pub foreground_layer_occlusion: bool,
    /// Layers with a depth below this value lie behind the occlusion plane.
    pub occlusion_plane_depth: i32,
    /// Extra patches kept around the visible window.
    pub visibility_margin: u32,
}

impl Default for TerrainRenderConfig {
    fn default() -> Self {
        Self {
            cache_enable: true,
            limit_cache_update: 0,
            render_group_budget: 32,
            foreground_layer_occlusion: true,
            occlusion_plane_depth: 0,
            visibility_margin: 1,
        }
    }
}

impl NamedOptions for TerrainRenderConfig {
    const SECTION: &'static str = "terrain";

    fn option_aliases() -> &'static [(&'static str, &'static str)] {
        &[("foregroundLayerOcculsion", "foregroundLayerOcclusion")]
    }
}

impl TerrainRenderConfig {
    /// The occlusion plane for occluder passes, if enabled.
    pub fn occlusion_depth(&self) -> Option<i32> {
        self.foreground_layer_occlusion
            .then_some(self.occlusion_plane_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn shadow_scales_grow_geometrically() {
        let config = LightingConfig::default();
        assert_relative_eq!(config.shadow_pass_scale(0), 1.1, epsilon = 1e-6);
        assert_relative_eq!(config.shadow_pass_scale(1), 1.2, epsilon = 1e-6);
        assert_relative_eq!(config.shadow_pass_scale(3), 1.8, epsilon = 1e-5);
    }

    #[test]
    fn console_names_round_trip() {
        let mut config = LightingConfig::default();
        config.set_option("maxSimpleLights", "3").unwrap();
        config.set_option("visionEnable", "1").unwrap();
        config.set_option("ambientColor", r#"{"r":0.5,"g":0.5,"b":0.5}"#).unwrap();
        assert_eq!(config.max_simple_lights, 3);
        assert!(config.vision_enable);
        assert_eq!(config.ambient_color, LinearRgba::gray(0.5));
        assert!(config.option_names().contains(&"shadowPassCount".to_string()));
    }

    #[test]
    fn misspelled_occlusion_option_is_accepted() {
        let mut config = TerrainRenderConfig::default();
        config.set_option("foregroundLayerOcculsion", "0").unwrap();
        assert!(!config.foreground_layer_occlusion);
        assert_eq!(config.occlusion_depth(), None);
    }

    #[test]
    fn json_document_overrides_only_named_fields() {
        let config = LightingConfig::from_json_str(r#"{ "shadowPassCount": 6 }"#).unwrap();
        assert_eq!(config.shadow_pass_count, 6);
        assert_eq!(config.max_dynamic_lights, 8);
    }
}
