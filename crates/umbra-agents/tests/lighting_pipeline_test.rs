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

//! Integration tests for the lighting pipeline as driven by the RenderAgent.
//!
//! Every test renders real frames on the software device and inspects the
//! final accumulator or the presented surface.

use approx::assert_relative_eq;
use std::sync::Arc;
use umbra_agents::render_agent::{FrameOutcome, FrameSummary, RenderAgent};
use umbra_core::math::{Extent2D, LinearRgba, Vec2};
use umbra_core::renderer::{
    GraphicsDevice, Light2D, LightingConfig, RenderPass, TerrainRenderConfig,
};
use umbra_core::ConfigError;
use umbra_data::{Camera2D, SurfaceInfo, Terrain, Tile, TileSetId};
use umbra_infra::SoftwareDevice;
use umbra_lanes::render_lane::{RenderWorld, Sprite};

const VIEWPORT: Extent2D = Extent2D::new(64, 32);
const AMBIENT: f32 = 0.25;

/// Helper: a configuration whose accumulator maps 1:1 onto the screen, with
/// every optional sub-pass off.
fn flat_config() -> LightingConfig {
    LightingConfig {
        final_texture_size_scale: 1.0,
        final_texture_camera_scale: 1.0,
        ambient_color: LinearRgba::gray(AMBIENT),
        emissive_light_enable: false,
        directional_light_enable: false,
        vision_enable: false,
        ..Default::default()
    }
}

fn setup(lighting: LightingConfig) -> (Arc<SoftwareDevice>, RenderAgent) {
    let software = Arc::new(SoftwareDevice::new(VIEWPORT));
    let mut agent = RenderAgent::new(lighting, TerrainRenderConfig::default());
    agent.init_device_objects(software.clone()).unwrap();
    agent.setup_render(Camera2D::new(Vec2::ZERO, 1.0, VIEWPORT), None);
    (software, agent)
}

/// A white floor covering the view, a wall right of the origin and a lamp.
fn scene() -> RenderWorld {
    let mut world = RenderWorld::new();
    world.push(Sprite::new(Vec2::ZERO, Vec2::new(64.0, 32.0), LinearRgba::WHITE));
    world.push(Sprite::new(Vec2::new(8.0, 0.0), Vec2::new(2.0, 20.0), LinearRgba::gray(0.4)).occluding());
    world.push(
        Sprite::new(Vec2::new(-20.0, -8.0), Vec2::splat(4.0), LinearRgba::WHITE)
            .glowing(LinearRgba::rgb(1.0, 0.6, 0.2)),
    );
    world
}

fn frame(agent: &mut RenderAgent, world: &RenderWorld, lights: &[Light2D]) -> FrameSummary {
    let mut terrain = Terrain::blank();
    match agent.render_frame(&mut terrain, world, lights).unwrap() {
        FrameOutcome::Presented(summary) => summary,
        FrameOutcome::DeviceLost => panic!("unexpected device loss"),
    }
}

fn accumulator_at(agent: &RenderAgent, x: usize, y: usize) -> LinearRgba {
    let pixels = agent.compositor().read_final_accumulator().unwrap();
    pixels[y * VIEWPORT.width as usize + x]
}

#[test]
fn test_unlit_scene_is_multiplied_by_ambient() {
    let (software, mut agent) = setup(flat_config());
    let summary = frame(&mut agent, &scene(), &[]);
    assert_eq!(summary.frame, 1);
    assert_eq!(summary.lighting.passes, vec!["accumulator_clear"]);

    let surface = software.read_surface().unwrap();
    let floor = surface[4 * VIEWPORT.width as usize + 60];
    assert_relative_eq!(floor.r, AMBIENT);
    assert_relative_eq!(floor.g, AMBIENT);
    assert_relative_eq!(floor.b, AMBIENT);
}

#[test]
fn test_simple_light_cap_keeps_the_nearest() {
    let config = LightingConfig {
        max_simple_lights: 2,
        ..flat_config()
    };
    let (_software, mut agent) = setup(config);
    let light = |x: f32| Light2D::point(Vec2::new(x, 0.0), 6.0, LinearRgba::WHITE);
    let lights = [light(20.0), light(4.0), light(-24.0), light(-10.0), light(28.0)];

    let summary = frame(&mut agent, &RenderWorld::new(), &lights);
    assert_eq!(summary.lighting.simple_lights, 2);
    assert_eq!(summary.lighting.capped_lights, 3);
    assert_eq!(summary.lighting.pass_count("simple_lights"), 1);

    let kept: Vec<f32> = agent
        .compositor()
        .light_accumulator()
        .simple_lights()
        .iter()
        .map(|l| l.position.x)
        .collect();
    assert_eq!(kept, vec![4.0, -10.0]);

    // World x maps to accumulator column x + 32.
    assert!(accumulator_at(&agent, 36, 16).r > 0.5);
    assert!(accumulator_at(&agent, 22, 16).r > 0.5);
    for column in [52, 8, 60] {
        assert_eq!(accumulator_at(&agent, column, 16), LinearRgba::gray(AMBIENT));
    }
}

#[test]
fn test_dynamic_light_is_shadowed_behind_occluders() {
    let (_software, mut agent) = setup(flat_config());
    let light = Light2D::point(Vec2::ZERO, 24.0, LinearRgba::WHITE).with_shadow(true);
    let summary = frame(&mut agent, &scene(), &[light]);
    assert_eq!(summary.lighting.dynamic_lights, 1);
    assert_eq!(summary.lighting.pass_count("shadow_cast"), 4);
    assert!(summary.lighting.ran("light_composite"));

    // Mirror points left and right of the light; the wall sits at x = 8.
    let open = accumulator_at(&agent, 16, 16);
    let shadowed = accumulator_at(&agent, 47, 16);
    assert!(open.r > AMBIENT + 0.2, "open side lit: {open:?}");
    assert!(
        shadowed.r + 0.15 < open.r,
        "shadowed {shadowed:?} vs open {open:?}"
    );
}

#[test]
fn test_dynamic_cone_light_lights_only_its_cone() {
    let (_software, mut agent) = setup(flat_config());
    let spot = Light2D::point(Vec2::ZERO, 24.0, LinearRgba::WHITE)
        .with_shadow(true)
        .with_cone(0.0, std::f32::consts::FRAC_PI_4);
    let summary = frame(&mut agent, &RenderWorld::new(), &[spot]);
    assert_eq!(summary.lighting.dynamic_lights, 1);
    assert!(summary.lighting.ran("light_composite"));

    // The cone opens toward +X from accumulator column 32.
    let ahead = accumulator_at(&agent, 44, 16);
    assert!(ahead.r > AMBIENT + 0.2, "inside the cone: {ahead:?}");
    for (x, y) in [(20, 16), (32, 4), (32, 28)] {
        let outside = accumulator_at(&agent, x, y);
        assert_relative_eq!(outside.r, AMBIENT, epsilon = 1e-4);
        assert_relative_eq!(outside.b, AMBIENT, epsilon = 1e-4);
    }
}

#[test]
fn test_captured_normals_and_specular_use_material_colors() {
    let (_software, mut agent) = setup(flat_config());
    let bumpy = LinearRgba::rgb(0.2, 0.8, 0.6);
    let shiny = LinearRgba::gray(0.7);
    let mut world = RenderWorld::new();
    world.push(Sprite {
        normal_color: bumpy,
        specular_color: shiny,
        ..Sprite::new(Vec2::new(-16.0, 0.0), Vec2::splat(16.0), LinearRgba::WHITE)
    });

    let mut terrain = Terrain::new(1, 1, 2, 8.0);
    let metal = terrain.surfaces.push(SurfaceInfo {
        normal_color: LinearRgba::rgb(0.9, 0.1, 0.5),
        specular_color: LinearRgba::gray(0.3),
        ..SurfaceInfo::named("metal")
    });
    let ground = terrain.add_layer("ground", 0);
    for (tx, ty) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
        terrain.set_tile(ground, tx, ty, Tile::new(TileSetId(0), 0, metal));
    }

    // The sprite covers screen pixels 8..24, the terrain 32..48 by 16..32.
    let cases = [
        (RenderPass::Normals, bumpy, LinearRgba::rgb(0.9, 0.1, 0.5), LinearRgba::FLAT_NORMAL),
        (RenderPass::Specular, shiny, LinearRgba::gray(0.3), LinearRgba::BLACK),
    ];
    for (pass, sprite_color, terrain_color, clear) in cases {
        let target = agent.capture_pass(pass, &terrain, &world).unwrap();
        let side = target.side() as usize;
        let texels = target.read().unwrap();
        let at = |x: usize, y: usize| texels[y * side + x];
        assert_eq!(at(16, 16), sprite_color, "{pass:?} sprite");
        assert_eq!(at(40, 24), terrain_color, "{pass:?} terrain");
        assert_eq!(at(56, 4), clear, "{pass:?} background");
    }
}

/// Renders the scene once with `disabled` and once with `zero_alpha` and
/// compares the accumulators and the presented surfaces.
fn assert_disabled_matches_zero_alpha(disabled: LightingConfig, zero_alpha: LightingConfig) {
    let lights = [
        Light2D::point(Vec2::ZERO, 24.0, LinearRgba::WHITE).with_shadow(true),
        Light2D::point(Vec2::new(-20.0, 5.0), 10.0, LinearRgba::rgb(0.2, 0.4, 1.0)),
    ];
    let render = |config: LightingConfig| {
        let (software, mut agent) = setup(config);
        let summary = frame(&mut agent, &scene(), &lights);
        assert!(summary.lighting.skipped.is_none());
        (
            summary.lighting.passes.len(),
            agent.compositor().read_final_accumulator().unwrap(),
            software.read_surface().unwrap(),
        )
    };
    let (disabled_passes, disabled_acc, disabled_surface) = render(disabled);
    let (zero_passes, zero_acc, zero_surface) = render(zero_alpha);
    assert!(zero_passes > disabled_passes, "the sub-pass must run at alpha 0");
    assert!(disabled_acc == zero_acc, "accumulators differ");
    assert!(disabled_surface == zero_surface, "surfaces differ");
}

#[test]
fn test_disabling_emissive_equals_zero_alpha() {
    assert_disabled_matches_zero_alpha(
        flat_config(),
        LightingConfig {
            emissive_light_enable: true,
            emissive_alpha: 0.0,
            emissive_bloom_alpha: 0.0,
            ..flat_config()
        },
    );
}

#[test]
fn test_disabling_directional_equals_zero_alpha() {
    assert_disabled_matches_zero_alpha(
        flat_config(),
        LightingConfig {
            directional_light_enable: true,
            directional_light_redraw_alpha: 0.0,
            ..flat_config()
        },
    );
}

#[test]
fn test_disabling_vision_equals_zero_alpha() {
    let base = LightingConfig {
        vision_radius: 20.0,
        ..flat_config()
    };
    assert_disabled_matches_zero_alpha(
        base.clone(),
        LightingConfig {
            vision_enable: true,
            vision_alpha: 0.0,
            ..base
        },
    );
}

#[test]
fn test_vision_darkens_outside_the_field_of_view() {
    let config = LightingConfig {
        vision_enable: true,
        vision_radius: 12.0,
        ambient_color: LinearRgba::WHITE,
        ..flat_config()
    };
    let (_software, mut agent) = setup(config);
    agent.setup_render(Camera2D::new(Vec2::ZERO, 1.0, VIEWPORT), Some(Vec2::new(-20.0, 0.0)));
    let summary = frame(&mut agent, &RenderWorld::new(), &[]);
    assert!(summary.lighting.ran("vision_composite"));

    // Viewer at accumulator column 12; column 60 is far outside its radius.
    assert!(accumulator_at(&agent, 12, 16).r > 0.5);
    assert!(accumulator_at(&agent, 60, 16).r < 0.01);
}

#[test]
fn test_allocation_failure_keeps_the_last_frame() {
    let (software, mut agent) = setup(flat_config());
    frame(&mut agent, &scene(), &[]);
    let first = agent.compositor().final_texture();

    software.set_memory_budget(Some(software.stats().allocated_bytes));
    agent
        .set_option("ambientColor", r#"{"r":0.5,"g":0.5,"b":0.5}"#)
        .unwrap();
    let summary = frame(&mut agent, &scene(), &[]);
    assert!(summary.lighting.skipped.is_some());
    assert_eq!(agent.compositor().final_texture(), first);
    assert_eq!(accumulator_at(&agent, 0, 0), LinearRgba::gray(AMBIENT));

    software.set_memory_budget(None);
    let summary = frame(&mut agent, &scene(), &[]);
    assert!(summary.lighting.skipped.is_none());
    assert_eq!(accumulator_at(&agent, 0, 0), LinearRgba::gray(0.5));
}

#[test]
fn test_show_final_accumulator_freezes_the_result() {
    let (_software, mut agent) = setup(flat_config());
    frame(&mut agent, &scene(), &[]);
    agent.set_option("showFinalAccumulator", "1").unwrap();
    agent
        .set_option("ambientColor", r#"{"r":1.0,"g":1.0,"b":1.0}"#)
        .unwrap();

    let summary = frame(&mut agent, &scene(), &[]);
    assert!(summary.lighting.frozen);
    assert_eq!(accumulator_at(&agent, 5, 5), LinearRgba::gray(AMBIENT));
}

#[test]
fn test_options_span_lighting_and_terrain() {
    let (_software, mut agent) = setup(flat_config());
    let names = agent.option_names();
    assert!(names.iter().any(|n| n == "maxSimpleLights"));
    assert!(names.iter().any(|n| n == "limitCacheUpdate"));

    agent.set_option("maxSimpleLights", "3").unwrap();
    assert_eq!(agent.get_option("maxSimpleLights").unwrap(), serde_json::json!(3));
    agent.set_option("foregroundLayerOcculsion", "0").unwrap();
    assert_eq!(
        agent.get_option("foregroundLayerOcclusion").unwrap(),
        serde_json::json!(false)
    );
    assert!(matches!(
        agent.set_option("noSuchOption", "1"),
        Err(ConfigError::UnknownOption { .. })
    ));
}

#[test]
fn test_surface_is_written_as_png() {
    let (_software, mut agent) = setup(flat_config());
    frame(&mut agent, &scene(), &[]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.png");
    agent.save_surface_png(&path).unwrap();

    let image = image::open(&path).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (64, 32));
    assert_eq!(image.get_pixel(60, 4).0, [64, 64, 64, 255]);
}
