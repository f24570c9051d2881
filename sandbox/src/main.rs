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

// Umbra Sandbox
// Renders a lit terrain scene headlessly and writes the last frame to a PNG.
// Uses the GPU when an adapter is available, the software rasterizer otherwise.
//
// Usage: sandbox [terrain.json|terrain.ron] [output.png]

use std::f32::consts::TAU;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use umbra_agents::render_agent::{FrameOutcome, RenderAgent};
use umbra_core::math::{Extent2D, LinearRgba, Vec2};
use umbra_core::renderer::{GraphicsDevice, Light2D, LightingConfig, TerrainRenderConfig};
use umbra_data::terrain::io::load_terrain_or_blank;
use umbra_data::{Camera2D, SurfaceId, SurfaceInfo, Terrain, Tile, TileSetId};
use umbra_infra::{SoftwareDevice, WgpuDevice};
use umbra_lanes::render_lane::{RenderWorld, Sprite};
use umbra_lanes::terrain_lane::TileSetImage;

const VIEWPORT: Extent2D = Extent2D::new(320, 180);
const FRAMES: u32 = 120;

/// A 4×3 patch map with a lava river, a stone floor and a background wall.
fn demo_terrain() -> Terrain {
    let mut terrain = Terrain::new(4, 3, 8, 8.0);
    let lava = terrain.surfaces.push(SurfaceInfo {
        emissive: true,
        emissive_color: LinearRgba::rgb(1.0, 0.45, 0.1),
        ..SurfaceInfo::named("lava")
    });
    let glass = terrain.surfaces.push(SurfaceInfo {
        occluder: false,
        ..SurfaceInfo::named("glass")
    });

    let (width, height) = terrain.tile_grid();
    let back = terrain.add_layer("background", -1);
    let ground = terrain.add_layer("ground", 0);
    for ty in 0..height {
        for tx in 0..width {
            terrain.set_tile(back, tx, ty, Tile::new(TileSetId(1), (tx % 2) as u16, SurfaceId(0)));
            let river = (ty as i32 - 12 - ((tx as f32 * 0.3).sin() * 3.0) as i32).abs() < 2;
            let wall = tx % 9 == 0 && ty > 4 && ty < 10;
            if river {
                terrain.set_tile(ground, tx, ty, Tile::new(TileSetId(0), 1, lava));
            } else if wall {
                terrain.set_tile(ground, tx, ty, Tile::new(TileSetId(0), 0, SurfaceId(0)));
            } else if ty == 20 && tx % 5 == 0 {
                terrain.set_tile(ground, tx, ty, Tile::new(TileSetId(0), 0, glass));
            }
        }
    }
    terrain
}

fn lights(t: f32) -> Vec<Light2D> {
    let orbit = Vec2::new((t * TAU).cos(), (t * TAU).sin()) * 60.0;
    vec![
        Light2D::point(orbit, 90.0, LinearRgba::rgb(1.0, 0.9, 0.7)).with_shadow(true),
        Light2D::point(Vec2::new(-100.0, -40.0), 50.0, LinearRgba::rgb(0.3, 0.5, 1.0)),
        Light2D::point(Vec2::new(110.0, 50.0), 40.0, LinearRgba::rgb(0.4, 1.0, 0.4)),
    ]
}

fn actors() -> RenderWorld {
    let mut world = RenderWorld::new();
    world.push(Sprite::new(Vec2::new(-30.0, 10.0), Vec2::new(6.0, 14.0), LinearRgba::rgb(0.8, 0.3, 0.3)).occluding());
    world.push(
        Sprite::new(Vec2::new(40.0, -20.0), Vec2::splat(5.0), LinearRgba::WHITE)
            .glowing(LinearRgba::rgb(0.6, 0.8, 1.0)),
    );
    world
}

/// The device the demo renders on.
enum Backend {
    Gpu(Arc<WgpuDevice>),
    Software(Arc<SoftwareDevice>),
}

impl Backend {
    fn select() -> Self {
        match WgpuDevice::new_headless(VIEWPORT) {
            Ok(device) => Self::Gpu(Arc::new(device)),
            Err(e) => {
                log::warn!("No usable GPU adapter ({e}), falling back to the software device");
                Self::Software(Arc::new(SoftwareDevice::new(VIEWPORT)))
            }
        }
    }

    fn device(&self) -> Arc<dyn GraphicsDevice> {
        match self {
            Self::Gpu(device) => device.clone(),
            Self::Software(device) => device.clone(),
        }
    }

    /// Only the software device can be told to lose itself.
    fn simulate_loss(&self) {
        if let Self::Software(device) = self {
            log::info!("Simulating a device loss");
            device.lose_device();
        }
    }

    fn recover(&mut self) -> Result<()> {
        match self {
            Self::Gpu(device) => {
                *device = Arc::new(WgpuDevice::new_headless(VIEWPORT).context("Failed to reopen the GPU device")?);
            }
            Self::Software(device) => device.reset()?,
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mut args = std::env::args().skip(1);
    let terrain_path = args.next().map(PathBuf::from);
    let output = args.next().map_or_else(|| PathBuf::from("umbra_frame.png"), PathBuf::from);

    let lighting = LightingConfig {
        ambient_color: LinearRgba::rgb(0.12, 0.12, 0.18),
        vision_enable: true,
        vision_radius: 140.0,
        ..Default::default()
    };
    let mut agent = RenderAgent::new(lighting, TerrainRenderConfig::default());
    agent.set_option("limitCacheUpdate", "6")?;

    let mut terrain = match &terrain_path {
        Some(path) => load_terrain_or_blank(path, agent.diagnostics()),
        None => demo_terrain(),
    };
    let extent = terrain.world_size();
    agent.set_terrain_origin(extent * -0.5);

    let renderer = agent.terrain_renderer_mut();
    renderer.register_tile_set(
        TileSetId(0),
        "rock",
        TileSetImage::solid(Extent2D::new(32, 16), LinearRgba::gray(0.55)),
        2,
        1,
    )?;
    renderer.register_tile_set(
        TileSetId(1),
        "backdrop",
        TileSetImage::solid(Extent2D::new(32, 16), LinearRgba::rgb(0.25, 0.22, 0.3)),
        2,
        1,
    )?;

    let mut backend = Backend::select();
    log::info!("Rendering on {}", backend.device().get_adapter_info().name);
    agent
        .init_device_objects(backend.device())
        .context("Failed to create device objects")?;

    let world = actors();
    for frame in 0..FRAMES {
        let t = frame as f32 / FRAMES as f32;
        let camera = Camera2D::new(Vec2::new((t * TAU).sin() * 20.0, 0.0), 1.0, VIEWPORT);
        agent.setup_render(camera, Some(Vec2::new(-20.0, 0.0)));

        if frame == FRAMES / 3 {
            let ground = terrain.layers().len().saturating_sub(1);
            terrain.set_tile(ground, 3, 3, Tile::new(TileSetId(0), 0, SurfaceId(0)));
        }
        if frame == FRAMES / 2 {
            backend.simulate_loss();
        }

        match agent.render_frame(&mut terrain, &world, &lights(t))? {
            FrameOutcome::Presented(summary) => {
                log::debug!(
                    "Frame {}: {} passes, {} rebuilds, {} cached / {} slow patches",
                    summary.frame,
                    summary.lighting.passes.len(),
                    summary.cache.rebuilds,
                    summary.terrain.cached_patches,
                    summary.terrain.slow_patches
                );
            }
            FrameOutcome::DeviceLost => {
                backend.recover()?;
                agent.init_device_objects(backend.device())?;
            }
        }
        for diagnostic in agent.diagnostics().drain() {
            log::info!("[{}] {}", diagnostic.source, diagnostic.message);
        }
    }

    agent.save_surface_png(&output)?;
    log::info!(
        "Rendered {} frames ({:.2} ms last)",
        agent.frame_count(),
        agent.last_frame_time().as_secs_f64() * 1000.0
    );
    if let Backend::Software(device) = &backend {
        log::info!("Software device stats: {:?}", device.stats());
    }
    Ok(())
}
