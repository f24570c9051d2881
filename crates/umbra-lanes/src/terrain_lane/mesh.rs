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

//! Builds the retained geometry of one terrain patch.
//!
//! Every tile is six strip vertices, `[TL, TL, BL, TR, BR, BR]`: the two
//! duplicates make the joins with the previous and next tile degenerate, so
//! a whole group draws as one triangle strip.

use super::tileset::TileSetRegistry;
use std::collections::BTreeMap;
use std::ops::Range;
use umbra_core::math::{LinearRgba, Vec2};
use umbra_core::renderer::Vertex2D;
use umbra_data::{SurfaceId, TerrainPatch, Tile, TileSetId};

/// Strip vertices emitted per tile.
pub const VERTICES_PER_TILE: u32 = 6;

/// A run of vertices sharing one surface and one tile-set texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderGroup {
    /// Vertex range in the patch buffer.
    pub range: Range<u32>,
    /// Surface of every tile in the group.
    pub surface: SurfaceId,
    /// Tile set (texture) of every tile in the group.
    pub tile_set: TileSetId,
}

impl RenderGroup {
    /// Number of vertices.
    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.range.end - self.range.start
    }

    /// Number of tiles.
    #[inline]
    pub fn tile_count(&self) -> u32 {
        self.vertex_count() / VERTICES_PER_TILE
    }
}

/// Vertices and groups of one patch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchMesh {
    /// All vertices, group after group.
    pub vertices: Vec<Vertex2D>,
    /// Groups ordered by tile set, then surface.
    pub groups: Vec<RenderGroup>,
}

/// The six strip vertices of a tile whose top-left corner is `min`.
pub fn tile_vertices(
    tile: &Tile,
    min: Vec2,
    tile_size: f32,
    tile_sets: &TileSetRegistry,
) -> [Vertex2D; VERTICES_PER_TILE as usize] {
    let cell = tile_sets.cell_uv(tile.tile_set, tile.index);
    let [tl, tr, br, bl] = tile
        .oriented_uvs()
        .map(|uv| cell.min + (cell.max - cell.min) * uv);
    let max = min + Vec2::splat(tile_size);
    let v = |pos: Vec2, uv: Vec2| Vertex2D::new(pos, uv, LinearRgba::WHITE);

    let top_left = v(min, tl);
    let bottom_left = v(Vec2::new(min.x, max.y), bl);
    let top_right = v(Vec2::new(max.x, min.y), tr);
    let bottom_right = v(max, br);
    [top_left, top_left, bottom_left, top_right, bottom_right, bottom_right]
}

/// Scans every tile of `patch` and groups the non-empty ones by
/// (tile set, surface). `origin` is the world position of the patch's
/// top-left corner.
pub fn build_patch_mesh(
    patch: &TerrainPatch,
    origin: Vec2,
    tile_size: f32,
    tile_sets: &TileSetRegistry,
) -> PatchMesh {
    let mut buckets: BTreeMap<(TileSetId, SurfaceId), Vec<Vertex2D>> = BTreeMap::new();
    for (x, y, tile) in patch.iter_tiles() {
        let min = origin + Vec2::new(x as f32, y as f32) * tile_size;
        buckets
            .entry((tile.tile_set, tile.surface))
            .or_default()
            .extend_from_slice(&tile_vertices(tile, min, tile_size, tile_sets));
    }

    let mut mesh = PatchMesh::default();
    for ((tile_set, surface), vertices) in buckets {
        let start = mesh.vertices.len() as u32;
        mesh.vertices.extend(vertices);
        mesh.groups.push(RenderGroup {
            range: start..mesh.vertices.len() as u32,
            surface,
            tile_set,
        });
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_data::PatchCoord;

    fn tile(set: u16, surface: u16) -> Tile {
        Tile::new(TileSetId(set), 0, SurfaceId(surface))
    }

    #[test]
    fn two_surfaces_two_textures_make_two_groups() {
        let mut patch = TerrainPatch::new(PatchCoord::new(0, 0), 2);
        patch.set_tile(0, 0, tile(1, 0));
        patch.set_tile(1, 0, tile(2, 1));
        patch.set_tile(0, 1, tile(2, 1));
        patch.set_tile(1, 1, tile(1, 0));

        let mesh = build_patch_mesh(&patch, Vec2::ZERO, 8.0, &TileSetRegistry::new());
        assert_eq!(mesh.groups.len(), 2);
        for group in &mesh.groups {
            assert_eq!(group.vertex_count(), 2 * VERTICES_PER_TILE);
        }
        assert_eq!(mesh.groups[0].tile_set, TileSetId(1));
        assert_eq!(mesh.groups[1].range.start, mesh.groups[0].range.end);
    }

    #[test]
    fn empty_tiles_produce_nothing() {
        let mut patch = TerrainPatch::new(PatchCoord::new(0, 0), 4);
        patch.set_tile(3, 3, tile(0, 0));
        let mesh = build_patch_mesh(&patch, Vec2::new(32.0, 0.0), 8.0, &TileSetRegistry::new());
        assert_eq!(mesh.vertices.len(), VERTICES_PER_TILE as usize);
        assert_eq!(mesh.vertices[0].position(), Vec2::new(56.0, 24.0));
        assert_eq!(mesh.vertices[5].position(), Vec2::new(64.0, 32.0));
    }

    #[test]
    fn strip_joins_are_degenerate() {
        let t = tile(0, 0);
        let v = tile_vertices(&t, Vec2::ZERO, 1.0, &TileSetRegistry::new());
        assert_eq!(v[0], v[1]);
        assert_eq!(v[4], v[5]);
        assert_eq!(v[2].position(), Vec2::new(0.0, 1.0));
        assert_eq!(v[3].position(), Vec2::new(1.0, 0.0));
    }
}
