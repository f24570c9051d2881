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

//! The final compositor: one light mask per frame.
//!
//! Every frame starts from an accumulator cleared to the ambient color.
//! Simple lights, dynamic lights, emissive glow, the directional light and
//! the vision mask are rendered into it in that order. The finished
//! accumulator becomes the *final texture*, which the scene pass multiplies
//! onto the surface. A frame whose lighting fails keeps the previous final
//! texture; only a lost device is reported to the caller.

use super::frame::{FrameReport, PassRecorder};
use super::geometry::content_quad;
use super::light_accumulator::LightAccumulator;
use super::light_space::LightSpace;
use super::sub_passes::{render_directional, render_emissive, render_vision};
use super::swap_pool::{PooledTarget, SwapPool, SwapPoolStats};
use std::sync::Arc;
use umbra_core::lane::{Lane, LaneError, LaneKind};
use umbra_core::math::{Affine2, Extent2D, LinearRgba, Vec2};
use umbra_core::renderer::{
    BlendMode, FilterMode, GraphicsDevice, GraphicsResources, Light2D, LightingConfig,
    PassContext, PrimitiveTopology, RenderError, RenderPass, RenderPassEncoder, SceneRenderable,
    SizeClass, TextureId,
};
use umbra_data::Camera2D;

#[derive(Debug)]
struct FinalFrame {
    target: PooledTarget,
    space: LightSpace,
}

/// Deferred 2D lighting lane.
#[derive(Debug)]
pub struct LightingCompositor {
    config: LightingConfig,
    device: Option<Arc<dyn GraphicsDevice>>,
    pool: SwapPool,
    lights: LightAccumulator,
    occlusion_depth: Option<i32>,
    final_frame: Option<FinalFrame>,
}

impl Default for LightingCompositor {
    fn default() -> Self {
        Self::new(LightingConfig::default())
    }
}

impl LightingCompositor {
    /// Creates a compositor. Device objects are created by
    /// [`Lane::on_initialize`].
    pub fn new(config: LightingConfig) -> Self {
        Self {
            config,
            device: None,
            pool: SwapPool::new(),
            lights: LightAccumulator::new(),
            occlusion_depth: None,
            final_frame: None,
        }
    }

    /// The tunables.
    pub fn config(&self) -> &LightingConfig {
        &self.config
    }

    /// The tunables, mutably. Changes apply from the next frame.
    pub fn config_mut(&mut self) -> &mut LightingConfig {
        &mut self.config
    }

    /// Layers below this depth do not occlude light. `None` disables the plane.
    pub fn set_occlusion_depth(&mut self, depth: Option<i32>) {
        self.occlusion_depth = depth;
    }

    /// Returns `true` once device objects exist.
    pub fn is_initialized(&self) -> bool {
        self.device.is_some()
    }

    /// The lights selected by the last [`Self::global_update`].
    pub fn light_accumulator(&self) -> &LightAccumulator {
        &self.lights
    }

    fn max_side(&self) -> u32 {
        let device_max = self
            .device
            .as_ref()
            .map_or(u32::MAX, |d| d.get_adapter_info().max_texture_side);
        let max = self.config.max_texture_size.min(device_max).max(1);
        1 << (31 - max.leading_zeros())
    }

    /// The light-space frame for `camera` under the current configuration.
    pub fn light_space(&self, camera: &Camera2D) -> LightSpace {
        LightSpace::compute(camera, &self.config, self.max_side())
    }

    /// Selects this frame's lights for `camera`.
    pub fn global_update(&mut self, lights: &[Light2D], camera: &Camera2D) {
        let space = self.light_space(camera);
        self.lights
            .global_update(lights, space.region, camera.position, &self.config);
    }

    /// Renders this frame's lighting into a new final texture.
    ///
    /// `viewer` is the eye of the vision pass. Resource failures skip the
    /// rest of the frame and keep the last final texture; they are logged
    /// and recorded in the report. [`RenderError::DeviceLost`] is returned.
    pub fn global_render(
        &mut self,
        scene: &dyn SceneRenderable,
        camera: &Camera2D,
        viewer: Vec2,
    ) -> Result<FrameReport, RenderError> {
        let device = self.device.clone().ok_or(RenderError::NotInitialized)?;
        if device.is_lost() {
            return Err(RenderError::DeviceLost);
        }

        let mut report = FrameReport {
            simple_lights: self.lights.simple_lights().len(),
            dynamic_lights: self.lights.dynamic_lights().len(),
            culled_lights: self.lights.culled(),
            capped_lights: self.lights.capped(),
            ..Default::default()
        };
        if self.config.show_final_accumulator && self.final_frame.is_some() {
            report.frozen = true;
            return Ok(report);
        }

        let max_side = self.max_side();
        let space = LightSpace::compute(camera, &self.config, max_side);
        self.pool.set_max_class(Some(SizeClass::fitting(max_side)));

        let result = {
            let mut rec = PassRecorder::new(&device, &mut self.pool, &mut report.passes);
            build_accumulator(
                &mut rec,
                &self.lights,
                &self.config,
                scene,
                &space,
                viewer,
                self.occlusion_depth,
            )
        };

        match result {
            Ok(target) => {
                self.final_frame = Some(FinalFrame { target, space });
                Ok(report)
            }
            Err(e) if e.is_device_lost() => Err(e),
            Err(e) => {
                log::warn!("Lighting skipped for this frame, keeping the last result: {e}");
                report.skipped = Some(e.to_string());
                Ok(report)
            }
        }
    }

    /// Accumulator pixels to screen pixels for the displayed final texture.
    pub fn get_final_transform(&self, camera: &Camera2D) -> Option<Affine2> {
        self.final_frame
            .as_ref()
            .and_then(|f| f.space.final_transform(camera))
    }

    /// The displayed final texture, if one was produced.
    pub fn final_texture(&self) -> Option<TextureId> {
        self.final_frame.as_ref().map(|f| f.target.id())
    }

    /// Used pixels of the final texture.
    pub fn final_content(&self) -> Option<Extent2D> {
        self.final_frame.as_ref().map(|f| f.space.content)
    }

    /// Reads the used pixels of the final texture (row-major).
    pub fn read_final_accumulator(&self) -> Result<Vec<LinearRgba>, RenderError> {
        let frame = self.final_frame.as_ref().ok_or(RenderError::NotInitialized)?;
        let texels = frame.target.read()?;
        let side = frame.target.side() as usize;
        let content = frame.space.content;
        let mut out = Vec::with_capacity(content.area());
        for row in texels.chunks(side).take(content.height as usize) {
            out.extend_from_slice(&row[..content.width as usize]);
        }
        Ok(out)
    }

    /// Multiplies the final texture onto the pass `encoder` records into.
    ///
    /// Does nothing before the first successful frame.
    pub fn composite(
        &self,
        encoder: &mut dyn RenderPassEncoder,
        camera: &Camera2D,
    ) -> Result<(), RenderError> {
        let Some(frame) = &self.final_frame else {
            return Ok(());
        };
        let Some(transform) = frame.space.final_transform(camera) else {
            return Ok(());
        };
        encoder.set_transform(transform);
        encoder.set_blend_mode(BlendMode::Multiply);
        encoder.set_texture(Some(frame.target.id()), FilterMode::Linear);
        encoder.set_color(LinearRgba::WHITE);
        encoder.draw(
            &content_quad(frame.space.content, frame.target.side(), LinearRgba::WHITE),
            PrimitiveTopology::TriangleStrip,
        )
    }

    /// Renders `pass` (typically Normals or Specular) at screen resolution
    /// into a pooled target, for debug display.
    pub fn capture_pass(
        &mut self,
        pass: RenderPass,
        scene: &dyn SceneRenderable,
        camera: &Camera2D,
    ) -> Result<PooledTarget, RenderError> {
        let device = self.device.clone().ok_or(RenderError::NotInitialized)?;
        let clear = match pass {
            RenderPass::Normals => LinearRgba::FLAT_NORMAL,
            _ => LinearRgba::BLACK,
        };
        let ctx = PassContext::new(pass, camera.world_to_screen(), camera.visible_bounds())
            .with_occlusion_depth(self.occlusion_depth);

        let mut passes = Vec::new();
        let mut rec = PassRecorder::new(&device, &mut self.pool, &mut passes);
        let target = rec.acquire(SizeClass::for_extent(camera.viewport))?;
        {
            let mut encoder = rec.begin(pass.label(), target.id(), Some(clear))?;
            encoder.set_transform(ctx.view);
            encoder.set_blend_mode(BlendMode::Alpha);
            scene.render(&ctx, encoder.as_mut())?;
        }
        Ok(target)
    }

    /// Swap pool statistics.
    pub fn pool_stats(&self) -> SwapPoolStats {
        self.pool.stats()
    }
}

fn build_accumulator(
    rec: &mut PassRecorder<'_>,
    lights: &LightAccumulator,
    config: &LightingConfig,
    scene: &dyn SceneRenderable,
    space: &LightSpace,
    viewer: Vec2,
    occlusion_depth: Option<i32>,
) -> Result<PooledTarget, RenderError> {
    let accumulator = rec.acquire(space.class())?;
    drop(rec.begin(
        "accumulator_clear",
        accumulator.id(),
        Some(config.ambient_color.with_alpha(1.0)),
    )?);

    lights.render_simple(rec, &accumulator, space, config)?;
    lights.render_dynamic(rec, scene, &accumulator, space, config, occlusion_depth)?;
    if config.emissive_light_enable {
        render_emissive(rec, scene, &accumulator, space, config)?;
    }
    if config.directional_light_enable {
        render_directional(rec, scene, &accumulator, space, config, occlusion_depth)?;
    }
    if config.vision_enable {
        render_vision(rec, scene, &accumulator, space, config, viewer, occlusion_depth)?;
    }
    Ok(accumulator)
}

impl Lane for LightingCompositor {
    fn strategy_name(&self) -> &'static str {
        "DeferredLight2D"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Lighting
    }

    fn on_initialize(&mut self, resources: &GraphicsResources) -> Result<(), LaneError> {
        if self.device.is_some() {
            return Ok(());
        }
        self.device = Some(Arc::clone(resources.device()));
        log::info!("Lighting compositor initialized");
        Ok(())
    }

    fn on_shutdown(&mut self) {
        self.final_frame = None;
        self.pool.release_all();
        if self.device.take().is_some() {
            log::info!("Lighting compositor device objects destroyed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_infra::SoftwareDevice;

    struct Nothing;

    impl SceneRenderable for Nothing {
        fn render(&self, _: &PassContext, _: &mut dyn RenderPassEncoder) -> Result<(), RenderError> {
            Ok(())
        }
    }

    fn setup(config: LightingConfig) -> (Arc<SoftwareDevice>, GraphicsResources, LightingCompositor) {
        let software = Arc::new(SoftwareDevice::new(Extent2D::new(64, 32)));
        let device: Arc<dyn GraphicsDevice> = software.clone();
        let resources = GraphicsResources::create(device).unwrap();
        let mut compositor = LightingCompositor::new(config);
        compositor.on_initialize(&resources).unwrap();
        (software, resources, compositor)
    }

    fn flat_config() -> LightingConfig {
        LightingConfig {
            final_texture_size_scale: 1.0,
            final_texture_camera_scale: 1.0,
            emissive_light_enable: false,
            directional_light_enable: false,
            ambient_color: LinearRgba::gray(0.25),
            ..Default::default()
        }
    }

    #[test]
    fn empty_scene_yields_ambient() {
        let (_sw, _res, mut compositor) = setup(flat_config());
        let camera = Camera2D::new(Vec2::ZERO, 1.0, Extent2D::new(64, 32));
        compositor.global_update(&[], &camera);
        let report = compositor.global_render(&Nothing, &camera, camera.position).unwrap();
        assert!(report.skipped.is_none());
        assert_eq!(report.passes, vec!["accumulator_clear"]);
        let pixels = compositor.read_final_accumulator().unwrap();
        assert_eq!(pixels.len(), 64 * 32);
        assert!(pixels.iter().all(|p| *p == LinearRgba::gray(0.25)));
    }

    #[test]
    fn simple_light_brightens_its_center_only() {
        let (_sw, _res, mut compositor) = setup(flat_config());
        let camera = Camera2D::new(Vec2::ZERO, 1.0, Extent2D::new(64, 32));
        let light = Light2D::point(Vec2::new(-16.0, 0.0), 8.0, LinearRgba::WHITE);
        compositor.global_update(&[light], &camera);
        compositor.global_render(&Nothing, &camera, camera.position).unwrap();

        let pixels = compositor.read_final_accumulator().unwrap();
        let at = |x: usize, y: usize| pixels[y * 64 + x];
        assert!(at(16, 16).r > 0.9);
        assert_eq!(at(48, 16), LinearRgba::gray(0.25));
    }

    #[test]
    fn allocation_failure_keeps_the_last_frame() {
        let (software, _res, mut compositor) = setup(flat_config());
        let camera = Camera2D::new(Vec2::ZERO, 1.0, Extent2D::new(64, 32));
        compositor.global_update(&[], &camera);
        compositor.global_render(&Nothing, &camera, camera.position).unwrap();
        let first = compositor.final_texture();

        let stats = software.stats();
        software.set_memory_budget(Some(stats.allocated_bytes));
        compositor.config_mut().ambient_color = LinearRgba::gray(0.5);
        let report = compositor.global_render(&Nothing, &camera, camera.position).unwrap();
        assert!(report.skipped.is_some());
        assert_eq!(compositor.final_texture(), first);
        let pixels = compositor.read_final_accumulator().unwrap();
        assert_eq!(pixels[0], LinearRgba::gray(0.25));
    }

    #[test]
    fn device_loss_is_propagated() {
        let (software, _res, mut compositor) = setup(flat_config());
        let camera = Camera2D::default();
        software.lose_device();
        assert_eq!(
            compositor.global_render(&Nothing, &camera, Vec2::ZERO),
            Err(RenderError::DeviceLost)
        );
    }

    #[test]
    fn frozen_accumulator_is_not_rebuilt() {
        let (_sw, _res, mut compositor) = setup(flat_config());
        let camera = Camera2D::new(Vec2::ZERO, 1.0, Extent2D::new(64, 32));
        compositor.global_render(&Nothing, &camera, Vec2::ZERO).unwrap();
        compositor.config_mut().show_final_accumulator = true;
        compositor.config_mut().ambient_color = LinearRgba::WHITE;
        let report = compositor.global_render(&Nothing, &camera, Vec2::ZERO).unwrap();
        assert!(report.frozen);
        assert!(report.passes.is_empty());
        assert_eq!(compositor.read_final_accumulator().unwrap()[0], LinearRgba::gray(0.25));
    }
}
