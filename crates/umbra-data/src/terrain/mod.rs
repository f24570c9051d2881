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

//! CPU-side terrain: layers of patches of tiles, plus the surface table.
//!
//! The terrain is the external collaborator of the terrain batch cache. It
//! answers three questions: what tile is at a position, which patches are
//! dirty, and which patches are near a given world rectangle.

pub mod io;
mod layer;
mod patch;
mod surface;
mod tile;

pub use self::layer::TerrainLayer;
pub use self::patch::{PatchCoord, PatchId, TerrainPatch};
pub use self::surface::{SurfaceInfo, SurfaceTable};
pub use self::tile::{SurfaceId, Tile, TileFlags, TileSetId};

use umbra_core::math::{Rect, Vec2};

/// Default number of tiles per patch side.
pub const DEFAULT_PATCH_SIZE: u32 = 16;

/// A tile terrain.
#[derive(Debug, Clone)]
pub struct Terrain {
    tile_size: f32,
    patch_size: u32,
    patches_x: u32,
    patches_y: u32,
    layers: Vec<TerrainLayer>,
    /// Surface materials referenced by tiles.
    pub surfaces: SurfaceTable,
}

impl Default for Terrain {
    fn default() -> Self {
        Self::blank()
    }
}

impl Terrain {
    /// Creates a terrain of `patches_x` × `patches_y` patches without layers.
    pub fn new(patches_x: u32, patches_y: u32, patch_size: u32, tile_size: f32) -> Self {
        Self {
            tile_size,
            patch_size: patch_size.max(1),
            patches_x,
            patches_y,
            layers: Vec::new(),
            surfaces: SurfaceTable::default(),
        }
    }

    /// An empty terrain, the fallback when loading fails.
    pub fn blank() -> Self {
        Self::new(0, 0, DEFAULT_PATCH_SIZE, 16.0)
    }

    /// World size of one tile.
    #[inline]
    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    /// Tiles per patch side.
    #[inline]
    pub fn patch_size(&self) -> u32 {
        self.patch_size
    }

    /// Patch grid size.
    #[inline]
    pub fn patch_grid(&self) -> (u32, u32) {
        (self.patches_x, self.patches_y)
    }

    /// Size in tiles.
    #[inline]
    pub fn tile_grid(&self) -> (u32, u32) {
        (self.patches_x * self.patch_size, self.patches_y * self.patch_size)
    }

    /// World-space size.
    pub fn world_size(&self) -> Vec2 {
        let (w, h) = self.tile_grid();
        Vec2::new(w as f32, h as f32) * self.tile_size
    }

    /// Returns `true` if the terrain holds no tiles at all.
    pub fn is_blank(&self) -> bool {
        self.layers.is_empty() || self.patches_x == 0 || self.patches_y == 0
    }

    /// Appends an empty layer and returns its index.
    pub fn add_layer(&mut self, name: impl Into<String>, depth: i32) -> usize {
        self.layers.push(TerrainLayer::new(
            name,
            depth,
            self.patches_x,
            self.patches_y,
            self.patch_size,
        ));
        self.layers.len() - 1
    }

    /// Layers in draw order.
    pub fn layers(&self) -> &[TerrainLayer] {
        &self.layers
    }

    /// A layer by index.
    pub fn layer(&self, index: usize) -> Option<&TerrainLayer> {
        self.layers.get(index)
    }

    /// A layer by index, mutably.
    pub fn layer_mut(&mut self, index: usize) -> Option<&mut TerrainLayer> {
        self.layers.get_mut(index)
    }

    fn split(&self, tx: u32, ty: u32) -> Option<(PatchCoord, u32, u32)> {
        let (w, h) = self.tile_grid();
        if tx >= w || ty >= h {
            return None;
        }
        let ps = self.patch_size;
        Some((PatchCoord::new(tx / ps, ty / ps), tx % ps, ty % ps))
    }

    /// The tile at terrain tile coordinates.
    pub fn tile(&self, layer: usize, tx: u32, ty: u32) -> Option<&Tile> {
        let (coord, lx, ly) = self.split(tx, ty)?;
        self.layers.get(layer)?.patch(coord)?.tile(lx, ly)
    }

    /// Edits a tile. The owning patch is marked dirty if the tile changed.
    pub fn set_tile(&mut self, layer: usize, tx: u32, ty: u32, tile: Tile) -> bool {
        let Some((coord, lx, ly)) = self.split(tx, ty) else {
            return false;
        };
        self.layers
            .get_mut(layer)
            .and_then(|l| l.patch_mut(coord))
            .is_some_and(|p| p.set_tile(lx, ly, tile))
    }

    /// World rectangle covered by a patch.
    pub fn patch_world_rect(&self, coord: PatchCoord) -> Rect {
        let side = self.patch_size as f32 * self.tile_size;
        let min = Vec2::new(coord.x as f32, coord.y as f32) * side;
        Rect::new(min, min + Vec2::splat(side))
    }

    /// Patches overlapping `bounds`, grown by `margin` patches, row-major.
    pub fn visible_patches(&self, bounds: Rect, margin: u32) -> Vec<PatchCoord> {
        if self.patches_x == 0 || self.patches_y == 0 {
            return Vec::new();
        }
        let side = self.patch_size as f32 * self.tile_size;
        if side <= 0.0 {
            return Vec::new();
        }
        let to_index = |v: f32, max: u32| -> i64 { ((v / side).floor() as i64).clamp(-1, i64::from(max)) };
        let margin = i64::from(margin);
        let x0 = (to_index(bounds.min.x, self.patches_x) - margin).max(0);
        let y0 = (to_index(bounds.min.y, self.patches_y) - margin).max(0);
        let x1 = (to_index(bounds.max.x, self.patches_x) + margin).min(i64::from(self.patches_x) - 1);
        let y1 = (to_index(bounds.max.y, self.patches_y) + margin).min(i64::from(self.patches_y) - 1);

        let mut out = Vec::new();
        for y in y0..=y1 {
            for x in x0..=x1 {
                out.push(PatchCoord::new(x as u32, y as u32));
            }
        }
        out
    }

    /// `(layer, coord)` of every dirty patch.
    pub fn dirty_patches(&self) -> Vec<(usize, PatchCoord)> {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(li, layer)| {
                layer
                    .patches()
                    .iter()
                    .filter(|p| p.is_dirty())
                    .map(move |p| (li, p.coord()))
            })
            .collect()
    }

    /// Marks every patch dirty (world reset).
    pub fn mark_all_dirty(&mut self) {
        for layer in &mut self.layers {
            layer.patches_mut().iter_mut().for_each(TerrainPatch::mark_dirty);
        }
    }
}
