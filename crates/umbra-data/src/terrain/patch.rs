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

//! Terrain patches: the unit of caching and dirty tracking.

use super::tile::Tile;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PATCH_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one patch instance.
///
/// Ids are never reused, so a cache entry built from a patch that was
/// replaced (terrain reloaded, layer rebuilt) can never match its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatchId(pub u64);

impl PatchId {
    fn next() -> Self {
        PatchId(NEXT_PATCH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Position of a patch in the patch grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct PatchCoord {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl PatchCoord {
    /// Creates a coordinate.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// A fixed-size square grid of tiles.
#[derive(Debug, Clone)]
pub struct TerrainPatch {
    id: PatchId,
    coord: PatchCoord,
    size: u32,
    tiles: Vec<Tile>,
    dirty: bool,
    revision: u64,
}

impl TerrainPatch {
    /// Creates an empty patch. New patches start dirty.
    pub fn new(coord: PatchCoord, size: u32) -> Self {
        Self {
            id: PatchId::next(),
            coord,
            size,
            tiles: vec![Tile::EMPTY; (size * size) as usize],
            dirty: true,
            revision: 0,
        }
    }

    /// The patch identity.
    #[inline]
    pub fn id(&self) -> PatchId {
        self.id
    }

    /// The grid coordinate.
    #[inline]
    pub fn coord(&self) -> PatchCoord {
        self.coord
    }

    /// Tiles per side.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Incremented on every effective edit.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns `true` if the tiles changed since the last [`TerrainPatch::clear_dirty`].
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Forces the next cache update to rebuild this patch.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Called by the cache once the patch geometry was rebuilt.
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Tile at patch-local `(x, y)`, or `None` out of range.
    pub fn tile(&self, x: u32, y: u32) -> Option<&Tile> {
        if x >= self.size || y >= self.size {
            return None;
        }
        self.tiles.get((y * self.size + x) as usize)
    }

    /// Replaces a tile. Returns `true` and marks the patch dirty only if the
    /// tile actually changed.
    pub fn set_tile(&mut self, x: u32, y: u32, tile: Tile) -> bool {
        if x >= self.size || y >= self.size {
            return false;
        }
        let idx = (y * self.size + x) as usize;
        if self.tiles[idx] == tile {
            return false;
        }
        self.tiles[idx] = tile;
        self.dirty = true;
        self.revision += 1;
        true
    }

    /// Sets every tile to `tile`.
    pub fn fill(&mut self, tile: Tile) {
        if self.tiles.iter().any(|t| *t != tile) {
            self.tiles.iter_mut().for_each(|t| *t = tile);
            self.dirty = true;
            self.revision += 1;
        }
    }

    /// All tiles, row-major.
    #[inline]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Iterates `(x, y, tile)` over non-empty tiles, row-major.
    pub fn iter_tiles(&self) -> impl Iterator<Item = (u32, u32, &Tile)> + '_ {
        let size = self.size;
        self.tiles
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.is_empty())
            .map(move |(i, t)| (i as u32 % size, i as u32 / size, t))
    }

    /// Number of non-empty tiles.
    pub fn non_empty_count(&self) -> usize {
        self.tiles.iter().filter(|t| !t.is_empty()).count()
    }
}
