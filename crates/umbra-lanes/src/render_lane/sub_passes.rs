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

//! Emissive, directional and vision passes.
//!
//! Each one renders the scene once with its pass set, blurs the result
//! through the swap pool and composites it into the accumulator with a
//! pass-specific alpha. A disabled pass is never called, so it costs
//! nothing.

use super::blur::blur;
use super::frame::PassRecorder;
use super::geometry::{content_quad, content_uv, light_fan, quad};
use super::light_accumulator::{cast_soft_shadow, render_occluder_mask, LocalBuffer};
use super::light_space::LightSpace;
use super::swap_pool::PooledTarget;
use umbra_core::math::{Affine2, Extent2D, LinearRgba, Rect, Vec2};
use umbra_core::renderer::{
    BlendMode, FilterMode, LightingConfig, PassContext, PrimitiveTopology, RenderError,
    RenderPass, SceneRenderable,
};

fn composite(
    rec: &mut PassRecorder<'_>,
    label: &'static str,
    source: &PooledTarget,
    accumulator: &PooledTarget,
    space: &LightSpace,
    blend: BlendMode,
    color: LinearRgba,
) -> Result<(), RenderError> {
    let mut pass = rec.begin(label, accumulator.id(), None)?;
    pass.set_blend_mode(blend);
    pass.set_texture(Some(source.id()), FilterMode::Linear);
    pass.set_color(color);
    pass.draw(
        &content_quad(space.content, source.side(), LinearRgba::WHITE),
        PrimitiveTopology::TriangleStrip,
    )
}

/// Emissive surfaces glow: their color is added at `emissiveAlpha`, then
/// a blurred copy is added at `emissiveBloomAlpha`.
pub(crate) fn render_emissive(
    rec: &mut PassRecorder<'_>,
    scene: &dyn SceneRenderable,
    accumulator: &PooledTarget,
    space: &LightSpace,
    config: &LightingConfig,
) -> Result<(), RenderError> {
    let mut pair = rec.acquire_pair(space.class())?;
    {
        let ctx = PassContext::new(RenderPass::Emissive, space.world_to_light, space.region);
        let mut pass = rec.begin(ctx.pass.label(), pair.current().id(), Some(LinearRgba::BLACK))?;
        pass.set_transform(ctx.view);
        pass.set_blend_mode(BlendMode::Alpha);
        pass.set_texture(None, FilterMode::Linear);
        scene.render(&ctx, pass.as_mut())?;
    }
    composite(
        rec,
        "emissive_composite",
        pair.current(),
        accumulator,
        space,
        BlendMode::Additive,
        LinearRgba::WHITE.with_alpha(config.emissive_alpha),
    )?;

    blur(
        rec,
        &mut pair,
        config.emissive_blur_pass_count,
        config.emissive_blur_size,
        space.content,
    )?;
    composite(
        rec,
        "emissive_bloom",
        pair.current(),
        accumulator,
        space,
        BlendMode::Additive,
        LinearRgba::WHITE.with_alpha(config.emissive_bloom_alpha),
    )
}

/// A global light from `directionalLightAngle`.
///
/// Occluders are drawn black into a white mask and smeared along the light
/// direction with offset re-blends whose steps double and sum to
/// `directionalShadowLength`. The blurred mask, tinted by the light color,
/// is added at `directionalLightRedrawAlpha`.
pub(crate) fn render_directional(
    rec: &mut PassRecorder<'_>,
    scene: &dyn SceneRenderable,
    accumulator: &PooledTarget,
    space: &LightSpace,
    config: &LightingConfig,
    occlusion_depth: Option<i32>,
) -> Result<(), RenderError> {
    let mut pair = rec.acquire_pair(space.class())?;
    let ctx = PassContext::new(RenderPass::DirectionalShadow, space.world_to_light, space.region)
        .with_occlusion_depth(occlusion_depth);
    render_occluder_mask(rec, &pair, scene, ctx)?;

    let offset = space.world_to_light.transform_vector(
        Vec2::from_angle(config.directional_light_angle) * config.directional_shadow_length,
    );
    let side = pair.current().side();
    let steps = config.directional_shadow_pass_count.min(16);
    let total = ((1u32 << steps) - 1).max(1) as f32;
    for i in 0..steps {
        let step = offset * ((1u32 << i) as f32 / total);
        {
            let mut pass = rec.begin("directional_shadow_cast", pair.other().id(), None)?;
            pass.set_texture(Some(pair.current().id()), FilterMode::Linear);
            pass.set_blend_mode(BlendMode::Replace);
            let full = Rect::new(Vec2::ZERO, Vec2::splat(side as f32));
            pass.draw(
                &quad(full, Rect::new(Vec2::ZERO, Vec2::ONE), LinearRgba::WHITE),
                PrimitiveTopology::TriangleStrip,
            )?;
            pass.set_blend_mode(BlendMode::Multiply);
            pass.set_transform(Affine2::from_translation(step));
            pass.draw(
                &content_quad(space.content, side, LinearRgba::WHITE),
                PrimitiveTopology::TriangleStrip,
            )?;
        }
        pair.swap();
    }

    blur(
        rec,
        &mut pair,
        config.directional_blur_pass_count,
        1.0,
        space.content,
    )?;
    let tint = config.directional_light_color;
    composite(
        rec,
        "directional_composite",
        pair.current(),
        accumulator,
        space,
        BlendMode::Additive,
        tint.with_alpha(tint.a * config.directional_light_redraw_alpha),
    )
}

/// Darkens everything the viewer cannot see.
///
/// The visibility fan around `viewer` is shadowed by occluders the same way
/// dynamic lights are, blurred, placed in an accumulator-sized buffer that
/// is black elsewhere and multiplied onto the accumulator at `visionAlpha`.
pub(crate) fn render_vision(
    rec: &mut PassRecorder<'_>,
    scene: &dyn SceneRenderable,
    accumulator: &PooledTarget,
    space: &LightSpace,
    config: &LightingConfig,
    viewer: Vec2,
    occlusion_depth: Option<i32>,
) -> Result<(), RenderError> {
    let radius = config.vision_radius.max(1.0);
    let LocalBuffer {
        mut pair,
        bounds,
        to_local,
        side,
    } = LocalBuffer::acquire(rec, viewer, radius, space, config)?;
    let local_content = Extent2D::square(side);

    render_occluder_mask(
        rec,
        &pair,
        scene,
        PassContext::new(RenderPass::Vision, to_local, bounds).with_occlusion_depth(occlusion_depth),
    )?;
    blur(
        rec,
        &mut pair,
        config.vision_pre_blur_pass_count,
        config.vision_blur_size,
        local_content,
    )?;
    cast_soft_shadow(rec, &mut pair, side, config)?;

    {
        let mut pass = rec.begin("vision_fan", pair.other().id(), Some(LinearRgba::BLACK))?;
        pass.set_transform(to_local);
        pass.set_blend_mode(BlendMode::Additive);
        pass.set_texture(None, FilterMode::Linear);
        let fan = light_fan(
            viewer,
            radius,
            LinearRgba::WHITE,
            LinearRgba::WHITE,
            config.light_fan_segments,
            None,
        );
        pass.draw(&fan, PrimitiveTopology::TriangleList)?;

        pass.set_transform(Affine2::IDENTITY);
        pass.set_blend_mode(BlendMode::Multiply);
        pass.set_texture(Some(pair.current().id()), FilterMode::Linear);
        pass.draw(
            &content_quad(local_content, pair.current().side(), LinearRgba::WHITE),
            PrimitiveTopology::TriangleStrip,
        )?;
    }
    pair.swap();
    blur(
        rec,
        &mut pair,
        config.vision_post_blur_pass_count,
        config.vision_blur_size,
        local_content,
    )?;

    let visibility = rec.acquire(space.class())?;
    {
        let mut pass = rec.begin("vision_place", visibility.id(), Some(LinearRgba::BLACK))?;
        pass.set_transform(space.world_to_light);
        pass.set_blend_mode(BlendMode::Replace);
        pass.set_texture(Some(pair.current().id()), FilterMode::Linear);
        pass.draw(
            &quad(
                bounds,
                content_uv(local_content, pair.current().side()),
                LinearRgba::WHITE,
            ),
            PrimitiveTopology::TriangleStrip,
        )?;
    }
    composite(
        rec,
        "vision_composite",
        &visibility,
        accumulator,
        space,
        BlendMode::Multiply,
        LinearRgba::WHITE.with_alpha(config.vision_alpha),
    )
}
