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

//! Per-light contributions to the accumulation buffer.
//!
//! Lights are classified every frame. *Simple* lights are additive fans
//! batched into a single draw. *Dynamic* lights render the occluders around
//! them into a private mask, grow soft shadows out of it with repeated
//! shrink-and-re-blend passes, and add the shadowed fan to the accumulator.
//! Everything adds up, so light order never matters.

use super::frame::PassRecorder;
use super::geometry::{light_fan, quad};
use super::light_space::LightSpace;
use super::swap_pool::{PingPong, PooledTarget};
use umbra_core::math::{next_power_of_two, Affine2, LinearRgba, Rect, Vec2};
use umbra_core::renderer::{
    BlendMode, FilterMode, Light2D, LightingConfig, PassContext, PrimitiveTopology, RenderError,
    RenderPass, SceneRenderable, SizeClass,
};

/// The lights selected for the current frame.
#[derive(Debug, Default)]
pub struct LightAccumulator {
    simple: Vec<Light2D>,
    dynamic: Vec<Light2D>,
    culled: usize,
    capped: usize,
}

impl LightAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies, culls and caps this frame's lights.
    ///
    /// Lights whose bounds miss `region` are culled first. The survivors of
    /// each class are ordered by distance to `focus` and the farthest beyond
    /// the configured cap are skipped.
    pub fn global_update(
        &mut self,
        lights: &[Light2D],
        region: Rect,
        focus: Vec2,
        config: &LightingConfig,
    ) {
        self.simple.clear();
        self.dynamic.clear();
        self.culled = 0;

        for light in lights {
            if !light.bounds(config.default_light_radius).intersects(&region) {
                self.culled += 1;
            } else if light.is_dynamic() {
                self.dynamic.push(*light);
            } else {
                self.simple.push(*light);
            }
        }

        let by_distance = |a: &Light2D, b: &Light2D| {
            a.position
                .distance_squared(focus)
                .total_cmp(&b.position.distance_squared(focus))
        };
        self.simple.sort_by(by_distance);
        self.dynamic.sort_by(by_distance);

        let before = self.simple.len() + self.dynamic.len();
        self.simple.truncate(config.max_simple_lights as usize);
        self.dynamic.truncate(config.max_dynamic_lights as usize);
        self.capped = before - self.simple.len() - self.dynamic.len();

        log::trace!(
            "Lights: {} simple, {} dynamic, {} culled, {} capped",
            self.simple.len(),
            self.dynamic.len(),
            self.culled,
            self.capped
        );
    }

    /// Simple lights selected for this frame, nearest first.
    pub fn simple_lights(&self) -> &[Light2D] {
        &self.simple
    }

    /// Dynamic lights selected for this frame, nearest first.
    pub fn dynamic_lights(&self) -> &[Light2D] {
        &self.dynamic
    }

    /// Lights culled by the last update.
    pub fn culled(&self) -> usize {
        self.culled
    }

    /// Lights skipped by the caps in the last update.
    pub fn capped(&self) -> usize {
        self.capped
    }

    /// Adds every simple light to the accumulator in one draw.
    pub(crate) fn render_simple(
        &self,
        rec: &mut PassRecorder<'_>,
        accumulator: &PooledTarget,
        space: &LightSpace,
        config: &LightingConfig,
    ) -> Result<(), RenderError> {
        if self.simple.is_empty() {
            return Ok(());
        }
        let mut vertices = Vec::new();
        for light in &self.simple {
            vertices.extend(light_fan(
                light.position,
                light.effective_radius(config.default_light_radius),
                light.center_color(),
                LinearRgba::BLACK,
                config.light_fan_segments,
                light.cone,
            ));
        }
        let mut pass = rec.begin("simple_lights", accumulator.id(), None)?;
        pass.set_transform(space.world_to_light);
        pass.set_blend_mode(BlendMode::Additive);
        pass.set_texture(None, FilterMode::Linear);
        pass.draw(&vertices, PrimitiveTopology::TriangleList)
    }

    /// Renders every dynamic light through its shadow sequence.
    pub(crate) fn render_dynamic(
        &self,
        rec: &mut PassRecorder<'_>,
        scene: &dyn SceneRenderable,
        accumulator: &PooledTarget,
        space: &LightSpace,
        config: &LightingConfig,
        occlusion_depth: Option<i32>,
    ) -> Result<(), RenderError> {
        for light in &self.dynamic {
            let radius = light.effective_radius(config.default_light_radius);
            let local = LocalBuffer::acquire(rec, light.position, radius, space, config)?;
            let LocalBuffer {
                mut pair,
                bounds,
                to_local,
                side,
            } = local;

            render_occluder_mask(
                rec,
                &pair,
                scene,
                PassContext::new(RenderPass::LightShadow, to_local, bounds)
                    .with_occlusion_depth(occlusion_depth),
            )?;
            cast_soft_shadow(rec, &mut pair, side, config)?;

            {
                let mut pass = rec.begin("light_fan", pair.other().id(), Some(LinearRgba::BLACK))?;
                pass.set_transform(to_local);
                pass.set_blend_mode(BlendMode::Additive);
                pass.set_texture(None, FilterMode::Linear);
                let fan = light_fan(
                    light.position,
                    radius,
                    light.center_color(),
                    LinearRgba::BLACK,
                    config.light_fan_segments,
                    light.cone,
                );
                pass.draw(&fan, PrimitiveTopology::TriangleList)?;

                pass.set_transform(Affine2::IDENTITY);
                pass.set_blend_mode(BlendMode::Multiply);
                pass.set_texture(Some(pair.current().id()), FilterMode::Linear);
                pass.draw(&local_quad(side, pair.current().side()), PrimitiveTopology::TriangleStrip)?;
            }

            let mut pass = rec.begin("light_composite", accumulator.id(), None)?;
            pass.set_transform(space.world_to_light);
            pass.set_blend_mode(BlendMode::Additive);
            pass.set_texture(Some(pair.other().id()), FilterMode::Linear);
            pass.draw(
                &quad(bounds, local_uv(side, pair.other().side()), LinearRgba::WHITE),
                PrimitiveTopology::TriangleStrip,
            )?;
        }
        Ok(())
    }
}

/// A light-centered pair of square buffers.
pub(crate) struct LocalBuffer {
    pub(crate) pair: PingPong,
    /// World rectangle mapped onto the used pixels.
    pub(crate) bounds: Rect,
    /// World to buffer pixels.
    pub(crate) to_local: Affine2,
    /// Used pixels per side.
    pub(crate) side: u32,
}

impl LocalBuffer {
    /// Sizes a buffer for a circle of `radius` at the accumulator
    /// resolution, clamped to the configured light buffer sizes.
    pub(crate) fn acquire(
        rec: &mut PassRecorder<'_>,
        center: Vec2,
        radius: f32,
        space: &LightSpace,
        config: &LightingConfig,
    ) -> Result<Self, RenderError> {
        let min = next_power_of_two(config.light_buffer_min_size.max(1));
        let max = next_power_of_two(config.light_buffer_max_size).max(min);
        let wanted = (2.0 * radius * space.pixels_per_unit()).ceil().max(1.0) as u32;
        let side = next_power_of_two(wanted).clamp(min, max);

        let pair = rec.acquire_pair(SizeClass::fitting(side))?;
        let side = side.min(pair.current().side());
        let bounds = Rect::from_circle(center, radius);
        let to_local = Affine2::rect_to_rect(
            bounds,
            Rect::new(Vec2::ZERO, Vec2::splat(side as f32)),
        );
        Ok(Self {
            pair,
            bounds,
            to_local,
            side,
        })
    }
}

fn local_uv(side: u32, texture_side: u32) -> Rect {
    Rect::new(Vec2::ZERO, Vec2::splat(side as f32 / texture_side.max(1) as f32))
}

fn local_quad(side: u32, texture_side: u32) -> [umbra_core::renderer::Vertex2D; 4] {
    quad(
        Rect::new(Vec2::ZERO, Vec2::splat(side as f32)),
        local_uv(side, texture_side),
        LinearRgba::WHITE,
    )
}

/// Clears `pair.current` to white and draws the occluders seen by `ctx`
/// into it. Occluders draw black.
pub(crate) fn render_occluder_mask(
    rec: &mut PassRecorder<'_>,
    pair: &PingPong,
    scene: &dyn SceneRenderable,
    ctx: PassContext,
) -> Result<(), RenderError> {
    let mut pass = rec.begin(ctx.pass.label(), pair.current().id(), Some(LinearRgba::WHITE))?;
    pass.set_transform(ctx.view);
    pass.set_blend_mode(BlendMode::Alpha);
    pass.set_texture(None, FilterMode::Linear);
    scene.render(&ctx, pass.as_mut())
}

/// Grows shadows radially out of the occluder mask in `pair.current`.
///
/// Pass `i` copies the mask into the scratch buffer and multiplies it by
/// the mask scaled about the buffer center by `shadow_pass_scale(i)`,
/// weighted by `shadowSoftening`.
pub(crate) fn cast_soft_shadow(
    rec: &mut PassRecorder<'_>,
    pair: &mut PingPong,
    side: u32,
    config: &LightingConfig,
) -> Result<(), RenderError> {
    let texture_side = pair.current().side();
    let full = Rect::new(Vec2::ZERO, Vec2::splat(texture_side as f32));
    let used = Rect::new(Vec2::ZERO, Vec2::splat(side as f32));
    let uv = local_uv(side, texture_side);
    let softening = config.shadow_softening.clamp(0.0, 1.0);

    for i in 0..config.shadow_pass_count {
        let scale = config.shadow_pass_scale(i);
        {
            let mut pass = rec.begin("shadow_cast", pair.other().id(), None)?;
            pass.set_texture(Some(pair.current().id()), FilterMode::Linear);
            pass.set_blend_mode(BlendMode::Replace);
            pass.draw(
                &quad(full, Rect::new(Vec2::ZERO, Vec2::ONE), LinearRgba::WHITE),
                PrimitiveTopology::TriangleStrip,
            )?;

            pass.set_blend_mode(BlendMode::Multiply);
            pass.set_color(LinearRgba::WHITE.with_alpha(softening));
            pass.draw(
                &quad(used.scale_about_center(scale), uv, LinearRgba::WHITE),
                PrimitiveTopology::TriangleStrip,
            )?;
        }
        pair.swap();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light_at(x: f32) -> Light2D {
        Light2D::point(Vec2::new(x, 0.0), 10.0, LinearRgba::WHITE)
    }

    #[test]
    fn caps_keep_the_nearest_lights() {
        let config = LightingConfig {
            max_simple_lights: 2,
            ..Default::default()
        };
        let lights = [light_at(40.0), light_at(5.0), light_at(-20.0), light_at(1.0)];
        let region = Rect::new(Vec2::splat(-100.0), Vec2::splat(100.0));
        let mut acc = LightAccumulator::new();
        acc.global_update(&lights, region, Vec2::ZERO, &config);

        let kept: Vec<f32> = acc.simple_lights().iter().map(|l| l.position.x).collect();
        assert_eq!(kept, vec![1.0, 5.0]);
        assert_eq!(acc.capped(), 2);
        assert_eq!(acc.culled(), 0);
    }

    #[test]
    fn culling_happens_before_capping() {
        let config = LightingConfig {
            max_simple_lights: 1,
            ..Default::default()
        };
        let lights = [light_at(500.0), light_at(30.0)];
        let region = Rect::new(Vec2::splat(-50.0), Vec2::splat(50.0));
        let mut acc = LightAccumulator::new();
        acc.global_update(&lights, region, Vec2::new(400.0, 0.0), &config);

        assert_eq!(acc.culled(), 1);
        assert_eq!(acc.capped(), 0);
        assert_eq!(acc.simple_lights()[0].position.x, 30.0);
    }

    #[test]
    fn shadow_casters_are_dynamic() {
        let lights = [light_at(0.0).with_shadow(true), light_at(1.0)];
        let region = Rect::new(Vec2::splat(-50.0), Vec2::splat(50.0));
        let mut acc = LightAccumulator::new();
        acc.global_update(&lights, region, Vec2::ZERO, &LightingConfig::default());
        assert_eq!(acc.dynamic_lights().len(), 1);
        assert_eq!(acc.simple_lights().len(), 1);
    }
}
