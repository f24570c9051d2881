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

//! Defines the RenderAgent, the frame driver of the 2D lighting pipeline.

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use umbra_core::lane::{Lane, LaneError};
use umbra_core::math::{LinearRgba, Vec2};
use umbra_core::renderer::{
    GraphicsDevice, GraphicsResources, Light2D, LightingConfig, PassContext, RenderError,
    RenderPass, RenderPassDescriptor, RenderTarget, SceneRenderable, TerrainRenderConfig,
};
use umbra_core::{ConfigError, DiagnosticBus, NamedOptions};
use umbra_data::{Camera2D, Terrain};
use umbra_lanes::render_lane::{
    FrameReport, LightingCompositor, PooledTarget, RenderWorld, SceneList,
};
use umbra_lanes::terrain_lane::{CacheStats, TerrainDrawStats, TerrainRenderer};

/// What happened during one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSummary {
    /// Index of the frame, starting at 1.
    pub frame: u64,
    /// Lighting passes and light counts.
    pub lighting: FrameReport,
    /// Terrain cache maintenance.
    pub cache: CacheStats,
    /// Terrain drawing, summed over every pass of the frame.
    pub terrain: TerrainDrawStats,
}

/// Result of [`RenderAgent::render_frame`].
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// The frame reached the surface.
    Presented(FrameSummary),
    /// The device was lost. Device objects have been destroyed; reset the
    /// backend and call [`RenderAgent::init_device_objects`] again.
    DeviceLost,
}

fn lane_error(e: LaneError) -> RenderError {
    let LaneError::Render(e) = e;
    e
}

/// The agent responsible for driving the lighting and terrain lanes.
pub struct RenderAgent {
    // Deferred lighting lane.
    compositor: LightingCompositor,
    // Terrain batch cache lane.
    terrain_renderer: TerrainRenderer,
    // Shared device objects; `None` while device objects are destroyed.
    resources: Option<GraphicsResources>,
    // Camera and viewer set by setup_render().
    camera: Camera2D,
    viewer: Option<Vec2>,
    // World position of the terrain's top-left corner.
    terrain_origin: Vec2,
    // Color the surface is cleared to before the scene is drawn.
    clear_color: LinearRgba,
    diagnostics: DiagnosticBus,
    // --- Frame metrics ---
    cache_stats: CacheStats,
    last_frame_time: Duration,
    frame_count: u64,
}

impl Default for RenderAgent {
    fn default() -> Self {
        Self::new(LightingConfig::default(), TerrainRenderConfig::default())
    }
}

impl RenderAgent {
    /// Creates an agent. No device object exists before
    /// [`Self::init_device_objects`].
    pub fn new(lighting: LightingConfig, terrain: TerrainRenderConfig) -> Self {
        let diagnostics = DiagnosticBus::new();
        let mut terrain_renderer = TerrainRenderer::new(terrain);
        terrain_renderer.set_diagnostics(diagnostics.clone());
        let mut compositor = LightingCompositor::new(lighting);
        compositor.set_occlusion_depth(terrain_renderer.config().occlusion_depth());
        Self {
            compositor,
            terrain_renderer,
            resources: None,
            camera: Camera2D::default(),
            viewer: None,
            terrain_origin: Vec2::ZERO,
            clear_color: LinearRgba::BLACK,
            diagnostics,
            cache_stats: CacheStats::default(),
            last_frame_time: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// The user-visible diagnostic channel (malformed data, budget overflows).
    pub fn diagnostics(&self) -> &DiagnosticBus {
        &self.diagnostics
    }

    /// The lighting lane.
    pub fn compositor(&self) -> &LightingCompositor {
        &self.compositor
    }

    /// The terrain lane.
    pub fn terrain_renderer(&self) -> &TerrainRenderer {
        &self.terrain_renderer
    }

    /// The terrain lane, mutably (tile-set registration).
    pub fn terrain_renderer_mut(&mut self) -> &mut TerrainRenderer {
        &mut self.terrain_renderer
    }

    /// Places the terrain's top-left corner in the world.
    pub fn set_terrain_origin(&mut self, origin: Vec2) {
        self.terrain_origin = origin;
    }

    /// Sets the surface clear color.
    pub fn set_clear_color(&mut self, color: LinearRgba) {
        self.clear_color = color;
    }

    /// Frames rendered since the agent was created.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Duration of the last [`Self::render_frame`].
    pub fn last_frame_time(&self) -> Duration {
        self.last_frame_time
    }

    /// Returns `true` while device objects exist.
    pub fn has_device_objects(&self) -> bool {
        self.resources.is_some()
    }

    // --- Device object lifecycle ---

    /// Creates the shared resources and initializes every lane on `device`.
    /// Does nothing when device objects already exist.
    pub fn init_device_objects(&mut self, device: Arc<dyn GraphicsDevice>) -> Result<(), RenderError> {
        if self.resources.is_some() {
            return Ok(());
        }
        if device.is_lost() {
            return Err(RenderError::DeviceLost);
        }
        let resources = GraphicsResources::create(device)?;
        let initialized = self
            .compositor
            .on_initialize(&resources)
            .and_then(|()| self.terrain_renderer.on_initialize(&resources));
        if let Err(e) = initialized {
            log::error!("Failed to initialize render lanes: {e}");
            self.compositor.on_shutdown();
            self.terrain_renderer.on_shutdown();
            return Err(lane_error(e));
        }
        log::info!(
            "RenderAgent: device objects created ({}, {})",
            self.compositor.strategy_name(),
            self.terrain_renderer.strategy_name()
        );
        self.resources = Some(resources);
        Ok(())
    }

    /// Releases every device object. Safe to call repeatedly and after a
    /// device loss.
    pub fn destroy_device_objects(&mut self) {
        self.compositor.on_shutdown();
        self.terrain_renderer.on_shutdown();
        if self.resources.take().is_some() {
            log::info!("RenderAgent: device objects destroyed");
        }
    }

    // --- Configuration ---

    /// Sets a lighting or terrain option by name (`maxSimpleLights`,
    /// `cacheEnable`...).
    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), ConfigError> {
        match self.compositor.config_mut().set_option(name, value) {
            Err(ConfigError::UnknownOption { .. }) => {}
            other => return other,
        }
        let terrain = self.terrain_renderer.config_mut();
        let was_caching = terrain.cache_enable;
        terrain.set_option(name, value)?;
        let (caching, occlusion) = (terrain.cache_enable, terrain.occlusion_depth());
        if caching && !was_caching {
            self.terrain_renderer.clear_cache();
        }
        self.compositor.set_occlusion_depth(occlusion);
        Ok(())
    }

    /// Reads a lighting or terrain option by name.
    pub fn get_option(&self, name: &str) -> Result<serde_json::Value, ConfigError> {
        match self.compositor.config().get_option(name) {
            Err(ConfigError::UnknownOption { .. }) => {
                self.terrain_renderer.config().get_option(name)
            }
            other => other,
        }
    }

    /// Every option name, lighting first.
    pub fn option_names(&self) -> Vec<String> {
        let mut names = self.compositor.config().option_names();
        names.extend(self.terrain_renderer.config().option_names());
        names
    }

    // --- Frame ---

    /// Sets the camera and the vision viewer for the next frame. Without a
    /// viewer the camera position is used.
    pub fn setup_render(&mut self, camera: Camera2D, viewer: Option<Vec2>) {
        self.camera = camera;
        self.viewer = viewer;
    }

    /// Brings the terrain cache up to date and selects this frame's lights.
    pub fn global_update(
        &mut self,
        terrain: &mut Terrain,
        lights: &[Light2D],
    ) -> Result<CacheStats, RenderError> {
        let region = self.compositor.light_space(&self.camera).region;
        let bounds = region.union(&self.camera.visible_bounds());
        self.cache_stats = self
            .terrain_renderer
            .update_cache(terrain, self.terrain_origin, bounds)?;
        self.compositor.global_update(lights, &self.camera);
        Ok(self.cache_stats)
    }

    /// Renders this frame's lighting over terrain and sprites.
    pub fn global_render(
        &mut self,
        terrain: &Terrain,
        world: &RenderWorld,
    ) -> Result<(FrameReport, TerrainDrawStats), RenderError> {
        let terrain_view = self.terrain_renderer.scene_view(terrain, self.terrain_origin);
        let scene = SceneList::new().with(&terrain_view).with(world);
        let viewer = self.viewer.unwrap_or(self.camera.position);
        let report = self.compositor.global_render(&scene, &self.camera, viewer)?;
        Ok((report, terrain_view.stats()))
    }

    /// Draws the diffuse scene on the surface and multiplies the light mask
    /// over it.
    pub fn present(
        &self,
        terrain: &Terrain,
        world: &RenderWorld,
    ) -> Result<TerrainDrawStats, RenderError> {
        let resources = self.resources.as_ref().ok_or(RenderError::NotInitialized)?;
        let terrain_view = self.terrain_renderer.scene_view(terrain, self.terrain_origin);
        let scene = SceneList::new().with(&terrain_view).with(world);
        let ctx = PassContext::new(
            RenderPass::Diffuse,
            self.camera.world_to_screen(),
            self.camera.visible_bounds(),
        );

        let mut pass = resources.device().begin_render_pass(&RenderPassDescriptor::clear(
            "surface",
            RenderTarget::Surface,
            self.clear_color,
        ))?;
        pass.set_transform(ctx.view);
        scene.render(&ctx, pass.as_mut())?;
        self.compositor.composite(pass.as_mut(), &self.camera)?;
        drop(pass);
        Ok(terrain_view.stats())
    }

    /// Renders terrain and sprites in a single `pass` (typically Normals or
    /// Specular) at screen resolution, for debug display.
    pub fn capture_pass(
        &mut self,
        pass: RenderPass,
        terrain: &Terrain,
        world: &RenderWorld,
    ) -> Result<PooledTarget, RenderError> {
        let terrain_view = self.terrain_renderer.scene_view(terrain, self.terrain_origin);
        let scene = SceneList::new().with(&terrain_view).with(world);
        self.compositor.capture_pass(pass, &scene, &self.camera)
    }

    /// Runs one whole frame: cache update, lighting, presentation.
    ///
    /// A lost device tears down every device object and yields
    /// [`FrameOutcome::DeviceLost`]; the frame is abandoned.
    pub fn render_frame(
        &mut self,
        terrain: &mut Terrain,
        world: &RenderWorld,
        lights: &[Light2D],
    ) -> Result<FrameOutcome, RenderError> {
        let frame_start = Instant::now();
        let result = self.run_frame(terrain, world, lights);
        self.last_frame_time = frame_start.elapsed();
        match result {
            Ok(summary) => {
                log::trace!(
                    "RenderAgent: frame {} in {:?} ({} lighting passes)",
                    summary.frame,
                    self.last_frame_time,
                    summary.lighting.passes.len()
                );
                Ok(FrameOutcome::Presented(summary))
            }
            Err(e) if e.is_device_lost() => {
                log::warn!("RenderAgent: device lost, destroying device objects");
                self.destroy_device_objects();
                Ok(FrameOutcome::DeviceLost)
            }
            Err(e) => Err(e),
        }
    }

    fn run_frame(
        &mut self,
        terrain: &mut Terrain,
        world: &RenderWorld,
        lights: &[Light2D],
    ) -> Result<FrameSummary, RenderError> {
        let device = self
            .resources
            .as_ref()
            .map(|r| Arc::clone(r.device()))
            .ok_or(RenderError::NotInitialized)?;
        if device.is_lost() {
            return Err(RenderError::DeviceLost);
        }
        let cache = self.global_update(terrain, lights)?;
        let (lighting, lit) = self.global_render(terrain, world)?;
        let drawn = self.present(terrain, world)?;
        self.frame_count += 1;
        Ok(FrameSummary {
            frame: self.frame_count,
            lighting,
            cache,
            terrain: TerrainDrawStats {
                cached_patches: lit.cached_patches + drawn.cached_patches,
                slow_patches: lit.slow_patches + drawn.slow_patches,
                draw_calls: lit.draw_calls + drawn.draw_calls,
            },
        })
    }

    /// Writes the presented surface to a PNG file.
    pub fn save_surface_png(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let resources = self
            .resources
            .as_ref()
            .context("No device objects to read the surface from")?;
        let device = resources.device();
        let extent = device.surface_extent();
        let texels = device.read_surface().context("Failed to read the surface")?;
        let pixels: Vec<[u8; 4]> = texels.iter().map(|t| t.with_alpha(1.0).to_rgba8()).collect();
        let image = image::RgbaImage::from_raw(
            extent.width,
            extent.height,
            bytemuck::cast_slice(&pixels).to_vec(),
        )
        .context("Surface size does not match its pixels")?;
        image
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("RenderAgent: surface written to {}", path.display());
        Ok(())
    }
}
