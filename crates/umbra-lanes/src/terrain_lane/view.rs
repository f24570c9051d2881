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

//! The terrain renderer lane and its scene adapter.

use super::cache::{CacheSlot, CacheStats, TerrainBatchCache};
use super::mesh::tile_vertices;
use super::tileset::{TileSetImage, TileSetRegistry};
use std::cell::Cell;
use std::sync::Arc;
use umbra_core::lane::{Lane, LaneError, LaneKind};
use umbra_core::math::{Affine2, LinearRgba, Rect, Vec2};
use umbra_core::renderer::{
    BufferId, FilterMode, GraphicsDevice, GraphicsResources, PassContext, PrimitiveTopology,
    RenderError, RenderPass, RenderPassEncoder, SceneRenderable, TerrainRenderConfig, TextureId,
    Vertex2D,
};
use umbra_core::DiagnosticBus;
use umbra_data::{PatchCoord, SurfaceId, SurfaceInfo, Terrain, TerrainLayer, TileSetId};

/// Counters of terrain drawing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerrainDrawStats {
    /// Patches drawn from their cached buffer.
    pub cached_patches: usize,
    /// Patches drawn tile by tile.
    pub slow_patches: usize,
    /// Draw calls issued.
    pub draw_calls: usize,
}

impl TerrainDrawStats {
    fn merge(self, other: Self) -> Self {
        Self {
            cached_patches: self.cached_patches + other.cached_patches,
            slow_patches: self.slow_patches + other.slow_patches,
            draw_calls: self.draw_calls + other.draw_calls,
        }
    }
}

/// Color of a (layer, surface) run in the pass of `ctx`, or `None` when the
/// run does not draw in that pass.
fn surface_color(
    ctx: &PassContext,
    layer: &TerrainLayer,
    surface: &SurfaceInfo,
    alpha: f32,
) -> Option<LinearRgba> {
    let color = match ctx.pass {
        RenderPass::Diffuse => layer.tint,
        RenderPass::Emissive if surface.emissive => surface.emissive_color,
        RenderPass::Emissive => LinearRgba::BLACK,
        RenderPass::LightShadow | RenderPass::DirectionalShadow | RenderPass::Vision => {
            return surface.occluder.then_some(LinearRgba::BLACK);
        }
        RenderPass::Normals => surface.normal_color,
        RenderPass::Specular => surface.specular_color,
    };
    Some(color.with_alpha(color.a * ctx.alpha * alpha))
}

/// Draws terrain layers from the batch cache, falling back to per-tile
/// drawing for patches the cache cannot serve.
#[derive(Debug, Default)]
pub struct TerrainRenderer {
    config: TerrainRenderConfig,
    cache: TerrainBatchCache,
    tile_sets: TileSetRegistry,
    device: Option<Arc<dyn GraphicsDevice>>,
    white: Option<TextureId>,
    last_update: CacheStats,
}

impl TerrainRenderer {
    /// Creates a renderer. Nothing touches the device before
    /// [`Lane::on_initialize`].
    pub fn new(config: TerrainRenderConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// The configuration.
    pub fn config(&self) -> &TerrainRenderConfig {
        &self.config
    }

    /// The configuration, mutably. Takes effect on the next update.
    pub fn config_mut(&mut self) -> &mut TerrainRenderConfig {
        &mut self.config
    }

    /// The batch cache.
    pub fn cache(&self) -> &TerrainBatchCache {
        &self.cache
    }

    /// Counters of the last [`Self::update_cache`].
    pub fn stats(&self) -> CacheStats {
        self.last_update
    }

    /// Routes render-group budget warnings to `bus`.
    pub fn set_diagnostics(&mut self, bus: DiagnosticBus) {
        self.cache.set_diagnostics(bus);
    }

    /// The registered tile sets.
    pub fn tile_sets(&self) -> &TileSetRegistry {
        &self.tile_sets
    }

    /// Registers a tile set, uploading it at once when device objects exist.
    pub fn register_tile_set(
        &mut self,
        id: TileSetId,
        name: impl Into<String>,
        image: TileSetImage,
        columns: u32,
        rows: u32,
    ) -> Result<(), RenderError> {
        self.tile_sets.register(id, name, image, columns, rows);
        self.cache.clear_cache();
        if let Some(device) = &self.device {
            self.tile_sets.upload(device)?;
        }
        Ok(())
    }

    /// Marks every cached patch stale.
    pub fn clear_cache(&mut self) {
        self.cache.clear_cache();
    }

    /// Rebuilds the cache entries of `terrain` placed at `origin` that are
    /// visible in the world rectangle `bounds`.
    pub fn update_cache(
        &mut self,
        terrain: &mut Terrain,
        origin: Vec2,
        bounds: Rect,
    ) -> Result<CacheStats, RenderError> {
        let device = self.device.as_ref().ok_or(RenderError::NotInitialized)?;
        let local = Rect::new(bounds.min - origin, bounds.max - origin);
        let stats = self
            .cache
            .update_cache(device, terrain, local, &self.config, &self.tile_sets)?;
        self.last_update = stats;
        Ok(stats)
    }

    fn white(&self) -> Result<TextureId, RenderError> {
        self.white.ok_or(RenderError::NotInitialized)
    }

    /// Draws one layer of `terrain` placed at `origin`, multiplying every
    /// color by `alpha`.
    ///
    /// The caller has set the encoder transform to `ctx.view`; it is restored
    /// along with color and texture before returning.
    pub fn render(
        &self,
        ctx: &PassContext,
        encoder: &mut dyn RenderPassEncoder,
        terrain: &Terrain,
        origin: Vec2,
        layer_index: usize,
        alpha: f32,
    ) -> Result<TerrainDrawStats, RenderError> {
        let mut stats = TerrainDrawStats::default();
        let Some(layer) = self.drawable_layer(ctx, terrain, layer_index) else {
            return Ok(stats);
        };
        self.white()?;
        let local = Rect::new(
            ctx.visible_bounds.min - origin,
            ctx.visible_bounds.max - origin,
        );

        encoder.set_transform(ctx.view * Affine2::from_translation(origin));
        for coord in terrain.visible_patches(local, 0) {
            let Some(patch) = layer.patch(coord) else {
                continue;
            };
            let slot = self
                .cache
                .slot(layer_index, coord)
                .filter(|slot| self.config.cache_enable && slot.is_valid_for(patch));
            match slot.and_then(|slot| slot.buffer_id().map(|buffer| (slot, buffer))) {
                Some((slot, buffer)) => {
                    stats.draw_calls +=
                        self.render_cached(ctx, encoder, terrain, layer, slot, buffer, alpha)?;
                    stats.cached_patches += 1;
                }
                None if slot.is_some() => stats.cached_patches += 1,
                None => {
                    let (x, y) = (coord.x * terrain.patch_size(), coord.y * terrain.patch_size());
                    let size = terrain.patch_size();
                    stats.draw_calls +=
                        self.render_slow(ctx, encoder, terrain, layer, (x, y), (x + size, y + size), alpha)?;
                    stats.slow_patches += 1;
                }
            }
        }
        restore(ctx, encoder);
        if stats.slow_patches > 0 {
            log::trace!(
                "Terrain layer '{}' drew {} patches slowly",
                layer.name,
                stats.slow_patches
            );
        }
        Ok(stats)
    }

    /// Draws the tiles of one layer in the tile rectangle `[min, max)`
    /// immediately, bypassing the cache.
    #[allow(clippy::too_many_arguments)]
    pub fn render_tiles(
        &self,
        ctx: &PassContext,
        encoder: &mut dyn RenderPassEncoder,
        terrain: &Terrain,
        origin: Vec2,
        layer_index: usize,
        min: (u32, u32),
        max: (u32, u32),
        alpha: f32,
    ) -> Result<TerrainDrawStats, RenderError> {
        let mut stats = TerrainDrawStats::default();
        let Some(layer) = self.drawable_layer(ctx, terrain, layer_index) else {
            return Ok(stats);
        };
        encoder.set_transform(ctx.view * Affine2::from_translation(origin));
        stats.draw_calls = self.render_slow(ctx, encoder, terrain, layer, min, max, alpha)?;
        restore(ctx, encoder);
        Ok(stats)
    }

    fn drawable_layer<'t>(
        &self,
        ctx: &PassContext,
        terrain: &'t Terrain,
        layer_index: usize,
    ) -> Option<&'t TerrainLayer> {
        let layer = terrain.layer(layer_index)?;
        if !layer.visible {
            return None;
        }
        if ctx.pass.is_occluder_pass() && ctx.is_occluded_depth(layer.depth) {
            return None;
        }
        Some(layer)
    }

    /// One draw per render group of a cached slot. Returns the number of
    /// draw calls.
    #[allow(clippy::too_many_arguments)]
    fn render_cached(
        &self,
        ctx: &PassContext,
        encoder: &mut dyn RenderPassEncoder,
        terrain: &Terrain,
        layer: &TerrainLayer,
        slot: &CacheSlot,
        buffer: BufferId,
        alpha: f32,
    ) -> Result<usize, RenderError> {
        let white = self.white()?;
        let mut draws = 0;
        for group in slot.groups() {
            let surface = terrain.surfaces.get(group.surface);
            let Some(color) = surface_color(ctx, layer, surface, alpha) else {
                continue;
            };
            encoder.set_texture(
                Some(self.tile_sets.texture_or(group.tile_set, white)),
                FilterMode::Nearest,
            );
            encoder.set_color(color);
            encoder.draw_buffer(buffer, group.range.clone(), PrimitiveTopology::TriangleStrip)?;
            draws += 1;
        }
        Ok(draws)
    }

    /// Per-tile drawing. Consecutive tiles sharing tile set and surface are
    /// batched into one strip. Returns the number of draw calls.
    #[allow(clippy::too_many_arguments)]
    fn render_slow(
        &self,
        ctx: &PassContext,
        encoder: &mut dyn RenderPassEncoder,
        terrain: &Terrain,
        layer: &TerrainLayer,
        min: (u32, u32),
        max: (u32, u32),
        alpha: f32,
    ) -> Result<usize, RenderError> {
        let white = self.white()?;
        let (width, height) = terrain.tile_grid();
        let (x1, y1) = (max.0.min(width), max.1.min(height));
        let tile_size = terrain.tile_size();

        let mut draws = 0;
        let mut run: Vec<Vertex2D> = Vec::new();
        let mut run_key: Option<(TileSetId, SurfaceId)> = None;
        let mut flush = |run: &mut Vec<Vertex2D>,
                         key: Option<(TileSetId, SurfaceId)>,
                         encoder: &mut dyn RenderPassEncoder|
         -> Result<(), RenderError> {
            let Some((tile_set, surface)) = key else {
                return Ok(());
            };
            if run.is_empty() {
                return Ok(());
            }
            if let Some(color) = surface_color(ctx, layer, terrain.surfaces.get(surface), alpha) {
                encoder.set_texture(
                    Some(self.tile_sets.texture_or(tile_set, white)),
                    FilterMode::Nearest,
                );
                encoder.set_color(color);
                encoder.draw(run, PrimitiveTopology::TriangleStrip)?;
                draws += 1;
            }
            run.clear();
            Ok(())
        };

        for ty in min.1..y1 {
            for tx in min.0..x1 {
                let coord = PatchCoord::new(tx / terrain.patch_size(), ty / terrain.patch_size());
                let Some(tile) = layer.patch(coord).and_then(|p| {
                    p.tile(tx % terrain.patch_size(), ty % terrain.patch_size())
                }) else {
                    continue;
                };
                if tile.is_empty() {
                    continue;
                }
                let key = Some((tile.tile_set, tile.surface));
                if key != run_key {
                    flush(&mut run, run_key, encoder)?;
                    run_key = key;
                }
                let corner = Vec2::new(tx as f32, ty as f32) * tile_size;
                run.extend_from_slice(&tile_vertices(tile, corner, tile_size, &self.tile_sets));
            }
        }
        flush(&mut run, run_key, encoder)?;
        Ok(draws)
    }

    /// A renderable drawing every layer of `terrain` at `origin`.
    pub fn scene_view<'a>(&'a self, terrain: &'a Terrain, origin: Vec2) -> TerrainSceneView<'a> {
        TerrainSceneView {
            renderer: self,
            terrain,
            origin,
            alpha: 1.0,
            stats: Cell::new(TerrainDrawStats::default()),
        }
    }
}

fn restore(ctx: &PassContext, encoder: &mut dyn RenderPassEncoder) {
    encoder.set_transform(ctx.view);
    encoder.set_color(LinearRgba::WHITE);
    encoder.set_texture(None, FilterMode::Linear);
}

impl Lane for TerrainRenderer {
    fn strategy_name(&self) -> &'static str {
        "TerrainBatchCache"
    }

    fn lane_kind(&self) -> LaneKind {
        LaneKind::Terrain
    }

    fn on_initialize(&mut self, resources: &GraphicsResources) -> Result<(), LaneError> {
        if self.device.is_some() {
            return Ok(());
        }
        self.tile_sets
            .upload(resources.device())
            .map_err(RenderError::from)?;
        self.device = Some(Arc::clone(resources.device()));
        self.white = Some(resources.white_texture());
        log::info!(
            "Terrain renderer initialized with {} tile sets",
            self.tile_sets.len()
        );
        Ok(())
    }

    fn on_shutdown(&mut self) {
        self.cache.release_device_objects();
        self.tile_sets.release();
        self.white = None;
        if self.device.take().is_some() {
            log::info!("Terrain renderer device objects destroyed");
        }
    }
}

/// Terrain as a [`SceneRenderable`]: every layer in order.
pub struct TerrainSceneView<'a> {
    renderer: &'a TerrainRenderer,
    terrain: &'a Terrain,
    origin: Vec2,
    alpha: f32,
    stats: Cell<TerrainDrawStats>,
}

impl TerrainSceneView<'_> {
    /// Returns the view with every color multiplied by `alpha`.
    #[must_use]
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Counters summed over every pass drawn through this view.
    pub fn stats(&self) -> TerrainDrawStats {
        self.stats.get()
    }
}

impl SceneRenderable for TerrainSceneView<'_> {
    fn render(
        &self,
        ctx: &PassContext,
        encoder: &mut dyn RenderPassEncoder,
    ) -> Result<(), RenderError> {
        for layer_index in 0..self.terrain.layers().len() {
            let drawn = self.renderer.render(
                ctx,
                encoder,
                self.terrain,
                self.origin,
                layer_index,
                self.alpha,
            )?;
            self.stats.set(self.stats.get().merge(drawn));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::math::Extent2D;
    use umbra_core::renderer::{OwnedTexture, RenderPassDescriptor, RenderTarget, TextureDescriptor};
    use umbra_data::Tile;
    use umbra_infra::SoftwareDevice;

    const SIDE: u32 = 16;

    fn terrain() -> Terrain {
        let mut terrain = Terrain::new(2, 2, 2, 4.0);
        let ground = terrain.add_layer("ground", 0);
        terrain.layer_mut(ground).unwrap().tint = LinearRgba::RED;
        let back = terrain.add_layer("back", -1);
        terrain.layer_mut(back).unwrap().tint = LinearRgba::BLUE;
        terrain.set_tile(ground, 0, 0, Tile::new(TileSetId(0), 0, SurfaceId(0)));
        terrain.set_tile(ground, 3, 3, Tile::new(TileSetId(0), 0, SurfaceId(0)));
        terrain.set_tile(back, 3, 0, Tile::new(TileSetId(0), 0, SurfaceId(0)));
        terrain
    }

    fn setup(config: TerrainRenderConfig) -> (GraphicsResources, TerrainRenderer) {
        let device: Arc<dyn GraphicsDevice> = Arc::new(SoftwareDevice::new(Extent2D::square(SIDE)));
        let resources = GraphicsResources::create(device).unwrap();
        let mut renderer = TerrainRenderer::new(config);
        renderer.on_initialize(&resources).unwrap();
        (resources, renderer)
    }

    fn draw(
        resources: &GraphicsResources,
        renderer: &TerrainRenderer,
        terrain: &Terrain,
        ctx: PassContext,
    ) -> (Vec<LinearRgba>, TerrainDrawStats) {
        let target = OwnedTexture::new(
            resources.device(),
            &TextureDescriptor::render_target("terrain_test", Extent2D::square(SIDE)),
        )
        .unwrap();
        let view = renderer.scene_view(terrain, Vec2::ZERO);
        {
            let mut pass = resources
                .device()
                .begin_render_pass(&RenderPassDescriptor::clear(
                    "terrain_test",
                    RenderTarget::Texture(target.id()),
                    LinearRgba::BLACK,
                ))
                .unwrap();
            pass.set_transform(ctx.view);
            view.render(&ctx, pass.as_mut()).unwrap();
        }
        (target.read().unwrap(), view.stats())
    }

    fn pixel(texels: &[LinearRgba], x: u32, y: u32) -> LinearRgba {
        texels[(y * SIDE + x) as usize]
    }

    fn diffuse() -> PassContext {
        PassContext::new(
            RenderPass::Diffuse,
            Affine2::IDENTITY,
            Rect::new(Vec2::ZERO, Vec2::splat(SIDE as f32)),
        )
    }

    #[test]
    fn cached_and_slow_paths_draw_the_same_pixels() {
        let (resources, mut renderer) = setup(TerrainRenderConfig::default());
        let mut terrain = terrain();
        let ctx = diffuse();

        let (slow, slow_stats) = draw(&resources, &renderer, &terrain, ctx);
        assert_eq!(slow_stats.cached_patches, 0);
        assert_eq!(pixel(&slow, 1, 1), LinearRgba::RED);
        assert_eq!(pixel(&slow, 13, 1), LinearRgba::BLUE);
        assert_eq!(pixel(&slow, 6, 6), LinearRgba::BLACK);

        renderer
            .update_cache(&mut terrain, Vec2::ZERO, ctx.visible_bounds)
            .unwrap();
        let (cached, cached_stats) = draw(&resources, &renderer, &terrain, ctx);
        assert_eq!(cached_stats.slow_patches, 0);
        assert_eq!(cached_stats.cached_patches, 8);
        assert_eq!(cached, slow);
    }

    #[test]
    fn edited_patches_fall_back_until_rebuilt() {
        let (resources, mut renderer) = setup(TerrainRenderConfig::default());
        let mut terrain = terrain();
        let ctx = diffuse();
        renderer
            .update_cache(&mut terrain, Vec2::ZERO, ctx.visible_bounds)
            .unwrap();
        terrain.set_tile(0, 1, 1, Tile::new(TileSetId(0), 0, SurfaceId(0)));

        let (texels, stats) = draw(&resources, &renderer, &terrain, ctx);
        assert_eq!(stats.slow_patches, 1);
        assert_eq!(pixel(&texels, 5, 5), LinearRgba::RED);
    }

    #[test]
    fn occluder_passes_skip_layers_behind_the_plane() {
        let (resources, renderer) = setup(TerrainRenderConfig::default());
        let mut terrain = terrain();
        let glass = terrain.surfaces.push(SurfaceInfo {
            occluder: false,
            ..SurfaceInfo::named("glass")
        });
        terrain.set_tile(0, 0, 3, Tile::new(TileSetId(0), 0, glass));

        let ctx = diffuse()
            .for_pass(RenderPass::LightShadow)
            .with_occlusion_depth(Some(0));
        let target = OwnedTexture::new(
            resources.device(),
            &TextureDescriptor::render_target("mask", Extent2D::square(SIDE)),
        )
        .unwrap();
        {
            let mut pass = resources
                .device()
                .begin_render_pass(&RenderPassDescriptor::clear(
                    "mask",
                    RenderTarget::Texture(target.id()),
                    LinearRgba::WHITE,
                ))
                .unwrap();
            renderer
                .scene_view(&terrain, Vec2::ZERO)
                .render(&ctx, pass.as_mut())
                .unwrap();
        }
        let mask = target.read().unwrap();
        assert_eq!(pixel(&mask, 1, 1), LinearRgba::BLACK);
        assert_eq!(pixel(&mask, 13, 1), LinearRgba::WHITE);
        assert_eq!(pixel(&mask, 1, 13), LinearRgba::WHITE);
    }

    #[test]
    fn render_tiles_draws_only_the_requested_rectangle() {
        let (resources, renderer) = setup(TerrainRenderConfig::default());
        let terrain = terrain();
        let ctx = diffuse();
        let target = OwnedTexture::new(
            resources.device(),
            &TextureDescriptor::render_target("tiles", Extent2D::square(SIDE)),
        )
        .unwrap();
        let stats = {
            let mut pass = resources
                .device()
                .begin_render_pass(&RenderPassDescriptor::clear(
                    "tiles",
                    RenderTarget::Texture(target.id()),
                    LinearRgba::BLACK,
                ))
                .unwrap();
            pass.set_transform(ctx.view);
            renderer
                .render_tiles(&ctx, pass.as_mut(), &terrain, Vec2::ZERO, 0, (2, 2), (8, 8), 1.0)
                .unwrap()
        };
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.cached_patches + stats.slow_patches, 0);

        let texels = target.read().unwrap();
        assert_eq!(pixel(&texels, 13, 13), LinearRgba::RED);
        assert_eq!(pixel(&texels, 1, 1), LinearRgba::BLACK);
        assert_eq!(pixel(&texels, 13, 1), LinearRgba::BLACK);
    }

    #[test]
    fn update_requires_device_objects() {
        let mut renderer = TerrainRenderer::new(TerrainRenderConfig::default());
        let mut terrain = terrain();
        assert_eq!(
            renderer.update_cache(&mut terrain, Vec2::ZERO, Rect::default()),
            Err(RenderError::NotInitialized)
        );
    }

    #[test]
    fn emissive_pass_draws_only_glowing_surfaces() {
        let layer = TerrainLayer::new("l", 0, 1, 1, 1);
        let ctx = diffuse().for_pass(RenderPass::Emissive).with_alpha(0.5);
        let lava = SurfaceInfo {
            emissive: true,
            emissive_color: LinearRgba::GREEN,
            ..SurfaceInfo::named("lava")
        };
        assert_eq!(
            surface_color(&ctx, &layer, &lava, 1.0),
            Some(LinearRgba::GREEN.with_alpha(0.5))
        );
        assert_eq!(
            surface_color(&ctx, &layer, &SurfaceInfo::default(), 1.0),
            Some(LinearRgba::BLACK.with_alpha(0.5))
        );
    }
}
