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

//! Integration tests for the terrain batch cache as driven by the
//! RenderAgent, including device-loss recovery.

use std::sync::Arc;
use umbra_agents::render_agent::{FrameOutcome, FrameSummary, RenderAgent};
use umbra_core::math::{Extent2D, LinearRgba, Rect, Vec2};
use umbra_core::renderer::Vertex2D;
use umbra_core::renderer::{LightingConfig, TerrainRenderConfig};
use umbra_data::{Camera2D, PatchCoord, SurfaceId, SurfaceInfo, Terrain, Tile, TileSetId};
use umbra_infra::SoftwareDevice;
use umbra_lanes::render_lane::RenderWorld;
use umbra_lanes::terrain_lane::{
    build_patch_mesh, PatchMesh, RenderGroup, SlotState, TileSetImage, VERTICES_PER_TILE,
};

const VIEWPORT: Extent2D = Extent2D::new(64, 32);

/// Helper: a 2x1 patch terrain of 4x4 tiles covering the whole view.
fn terrain() -> Terrain {
    let mut terrain = Terrain::new(2, 1, 4, 8.0);
    let lava = terrain.surfaces.push(SurfaceInfo {
        emissive: true,
        emissive_color: LinearRgba::RED,
        ..SurfaceInfo::named("lava")
    });
    let ground = terrain.add_layer("ground", 0);
    for ty in 0..4 {
        for tx in 0..8 {
            let surface = if (tx + ty) % 3 == 0 { lava } else { SurfaceId(0) };
            terrain.set_tile(ground, tx, ty, Tile::new(TileSetId((tx % 2) as u16), 0, surface));
        }
    }
    let back = terrain.add_layer("back", -1);
    terrain.set_tile(back, 2, 2, Tile::new(TileSetId(0), 1, SurfaceId(0)));
    terrain
}

/// Helper: an agent on a fresh software device, camera centered on the terrain.
fn setup() -> (Arc<SoftwareDevice>, RenderAgent) {
    let software = Arc::new(SoftwareDevice::new(VIEWPORT));
    let lighting = LightingConfig {
        final_texture_size_scale: 1.0,
        final_texture_camera_scale: 1.0,
        ..Default::default()
    };
    let mut agent = RenderAgent::new(lighting, TerrainRenderConfig::default());
    agent
        .terrain_renderer_mut()
        .register_tile_set(
            TileSetId(0),
            "stone",
            TileSetImage::solid(Extent2D::new(16, 8), LinearRgba::gray(0.5)),
            2,
            1,
        )
        .unwrap();
    agent.init_device_objects(software.clone()).unwrap();
    agent.set_terrain_origin(Vec2::new(-32.0, -16.0));
    agent.setup_render(Camera2D::new(Vec2::ZERO, 1.0, VIEWPORT), None);
    (software, agent)
}

fn frame(agent: &mut RenderAgent, terrain: &mut Terrain) -> FrameSummary {
    match agent
        .render_frame(terrain, &RenderWorld::new(), &[])
        .unwrap()
    {
        FrameOutcome::Presented(summary) => summary,
        FrameOutcome::DeviceLost => panic!("unexpected device loss"),
    }
}

fn groups(agent: &RenderAgent, layer: usize, coord: PatchCoord) -> Vec<RenderGroup> {
    agent
        .terrain_renderer()
        .cache()
        .slot(layer, coord)
        .map(|slot| slot.groups().to_vec())
        .unwrap_or_default()
}

#[test]
fn test_clean_patches_are_never_rebuilt() {
    let (_software, mut agent) = setup();
    let mut terrain = terrain();

    let first = frame(&mut agent, &mut terrain);
    assert_eq!(first.cache.rebuilds, 4, "2 patches x 2 layers on the first frame");

    for _ in 0..5 {
        let summary = frame(&mut agent, &mut terrain);
        assert_eq!(summary.cache.rebuilds, 0);
        assert_eq!(summary.cache.hits, 4);
        assert_eq!(summary.terrain.slow_patches, 0);
    }
    assert_eq!(agent.terrain_renderer().cache().total_rebuilds(), 4);
}

#[test]
fn test_dirty_patch_is_rebuilt_exactly_once() {
    let (_software, mut agent) = setup();
    let mut terrain = terrain();
    frame(&mut agent, &mut terrain);

    assert!(terrain.set_tile(0, 6, 1, Tile::new(TileSetId(1), 3, SurfaceId(0))));
    let edited = PatchCoord::new(1, 0);
    assert_eq!(terrain.dirty_patches(), vec![(0, edited)]);

    let summary = frame(&mut agent, &mut terrain);
    assert_eq!(summary.cache.rebuilds, 1);
    assert!(terrain.dirty_patches().is_empty());
    let slot = agent.terrain_renderer().cache().slot(0, edited).unwrap();
    assert_eq!(slot.rebuild_count(), 2);
    assert_eq!(slot.state(), SlotState::Cached);

    assert_eq!(frame(&mut agent, &mut terrain).cache.rebuilds, 0);
}

#[test]
fn test_groups_partition_the_non_empty_tiles() {
    let (_software, mut agent) = setup();
    let mut terrain = terrain();
    frame(&mut agent, &mut terrain);

    for (layer_index, layer) in terrain.layers().iter().enumerate() {
        for patch in layer.patches() {
            let slot = agent
                .terrain_renderer()
                .cache()
                .slot(layer_index, patch.coord())
                .expect("visible patches are cached");
            let total: u32 = slot.groups().iter().map(RenderGroup::vertex_count).sum();
            assert_eq!(total, patch.non_empty_count() as u32 * VERTICES_PER_TILE);
            assert_eq!(total, slot.vertex_count());
        }
    }
}

/// Every cached group of every patch, with the vertices its buffer holds.
fn cached_meshes(software: &SoftwareDevice, agent: &RenderAgent) -> Vec<(usize, PatchCoord, PatchMesh)> {
    let mut meshes = Vec::new();
    for layer in 0..2 {
        for coord in [PatchCoord::new(0, 0), PatchCoord::new(1, 0)] {
            let slot = agent
                .terrain_renderer()
                .cache()
                .slot(layer, coord)
                .expect("visible patches are cached");
            let vertices = match slot.buffer_id() {
                Some(buffer) => software
                    .buffer_contents(buffer, 0..slot.vertex_count())
                    .unwrap(),
                None => Vec::new(),
            };
            meshes.push((
                layer,
                coord,
                PatchMesh {
                    vertices,
                    groups: slot.groups().to_vec(),
                },
            ));
        }
    }
    meshes
}

#[test]
fn test_clear_cache_reproduces_the_same_groups() {
    let (software, mut agent) = setup();
    let mut terrain = terrain();
    frame(&mut agent, &mut terrain);
    let before = cached_meshes(&software, &agent);
    assert!(!groups(&agent, 1, PatchCoord::new(0, 0)).is_empty());

    agent.terrain_renderer_mut().clear_cache();
    let summary = frame(&mut agent, &mut terrain);
    assert_eq!(summary.cache.rebuilds, 4);
    assert_eq!(summary.cache.buffer_grows, 0);

    let after = cached_meshes(&software, &agent);
    assert_eq!(before.len(), 4);
    for ((layer, coord, old), (_, _, new)) in before.iter().zip(&after) {
        assert_eq!(old.groups, new.groups, "groups of layer {layer} patch {coord:?}");
        assert_eq!(
            bytemuck::cast_slice::<Vertex2D, u8>(&old.vertices),
            bytemuck::cast_slice::<Vertex2D, u8>(&new.vertices),
            "vertex bytes of layer {layer} patch {coord:?}"
        );

        let patch = terrain.layer(*layer).unwrap().patch(*coord).unwrap();
        let rebuilt = build_patch_mesh(
            patch,
            terrain.patch_world_rect(*coord).min,
            terrain.tile_size(),
            agent.terrain_renderer().tile_sets(),
        );
        assert_eq!(&rebuilt, new);
    }
}

#[test]
fn test_mark_all_dirty_rebuilds_every_patch_once() {
    let (_software, mut agent) = setup();
    let mut terrain = terrain();
    frame(&mut agent, &mut terrain);
    assert_eq!(frame(&mut agent, &mut terrain).cache.rebuilds, 0);

    terrain.mark_all_dirty();
    assert_eq!(terrain.dirty_patches().len(), 4);

    let bounds = Rect::new(Vec2::new(-32.0, -16.0), Vec2::new(32.0, 16.0));
    let stats = agent
        .terrain_renderer_mut()
        .update_cache(&mut terrain, Vec2::new(-32.0, -16.0), bounds)
        .unwrap();
    assert_eq!(stats.rebuilds, 4);
    assert_eq!(stats.hits, 0);
    assert!(terrain.dirty_patches().is_empty());
    for slot in agent.terrain_renderer().cache().slots() {
        if slot.key().is_some() {
            assert_eq!(slot.rebuild_count(), 2);
            assert_eq!(slot.state(), SlotState::Cached);
        }
    }

    assert_eq!(frame(&mut agent, &mut terrain).cache.rebuilds, 0);
}

#[test]
fn test_two_surfaces_on_two_textures_make_two_groups() {
    let (_software, mut agent) = setup();
    let mut terrain = Terrain::new(1, 1, 2, 16.0);
    let b = terrain.surfaces.push(SurfaceInfo::named("b"));
    let layer = terrain.add_layer("tiles", 0);
    terrain.set_tile(layer, 0, 0, Tile::new(TileSetId(1), 0, SurfaceId(0)));
    terrain.set_tile(layer, 1, 1, Tile::new(TileSetId(1), 0, SurfaceId(0)));
    terrain.set_tile(layer, 1, 0, Tile::new(TileSetId(2), 0, b));
    terrain.set_tile(layer, 0, 1, Tile::new(TileSetId(2), 0, b));
    frame(&mut agent, &mut terrain);

    let groups = groups(&agent, layer, PatchCoord::new(0, 0));
    assert_eq!(groups.len(), 2);
    for group in &groups {
        assert_eq!(group.vertex_count(), 2 * VERTICES_PER_TILE);
    }
}

#[test]
fn test_disabled_cache_draws_every_patch_slowly() {
    let (_software, mut agent) = setup();
    let mut terrain = terrain();
    agent.set_option("cacheEnable", "0").unwrap();

    let summary = frame(&mut agent, &mut terrain);
    assert_eq!(summary.cache.rebuilds, 0);
    assert!(summary.terrain.slow_patches > 0);
    assert_eq!(summary.terrain.cached_patches, 0);

    agent.set_option("cacheEnable", "true").unwrap();
    assert_eq!(frame(&mut agent, &mut terrain).cache.rebuilds, 4);
}

#[test]
fn test_device_loss_recovery_rebuilds_everything() {
    let (software, mut agent) = setup();
    let mut terrain = terrain();
    frame(&mut agent, &mut terrain);

    software.lose_device();
    let outcome = agent
        .render_frame(&mut terrain, &RenderWorld::new(), &[])
        .unwrap();
    assert_eq!(outcome, FrameOutcome::DeviceLost);
    assert!(!agent.has_device_objects());
    let stats = software.stats();
    assert_eq!((stats.live_textures, stats.live_buffers), (0, 0));

    // Destroying twice is harmless.
    agent.destroy_device_objects();

    software.reset().unwrap();
    agent.init_device_objects(software.clone()).unwrap();
    let summary = frame(&mut agent, &mut terrain);
    assert_eq!(summary.cache.rebuilds, 4);
    assert!(summary.lighting.skipped.is_none());
    assert!(software.stats().live_buffers > 0);
}
