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

use super::patch::{PatchCoord, TerrainPatch};
use umbra_core::math::LinearRgba;

/// One drawable layer of terrain: a full grid of patches.
///
/// `depth` orders layers relative to the occlusion plane. Layers below the
/// plane are background and do not block light when foreground occlusion is
/// enabled.
#[derive(Debug, Clone)]
pub struct TerrainLayer {
    /// Display name.
    pub name: String,
    /// Depth relative to the occlusion plane.
    pub depth: i32,
    /// Color multiplied into every tile in the diffuse pass.
    pub tint: LinearRgba,
    /// Hidden layers produce no geometry.
    pub visible: bool,
    patches_x: u32,
    patches: Vec<TerrainPatch>,
}

impl TerrainLayer {
    /// Creates an empty layer of `patches_x` × `patches_y` patches.
    pub fn new(name: impl Into<String>, depth: i32, patches_x: u32, patches_y: u32, patch_size: u32) -> Self {
        let patches = (0..patches_y)
            .flat_map(|y| (0..patches_x).map(move |x| PatchCoord::new(x, y)))
            .map(|coord| TerrainPatch::new(coord, patch_size))
            .collect();
        Self {
            name: name.into(),
            depth,
            tint: LinearRgba::WHITE,
            visible: true,
            patches_x,
            patches,
        }
    }

    fn index(&self, coord: PatchCoord) -> Option<usize> {
        if coord.x >= self.patches_x {
            return None;
        }
        let idx = (coord.y * self.patches_x + coord.x) as usize;
        (idx < self.patches.len()).then_some(idx)
    }

    /// The patch at `coord`.
    pub fn patch(&self, coord: PatchCoord) -> Option<&TerrainPatch> {
        self.index(coord).map(|i| &self.patches[i])
    }

    /// The patch at `coord`, mutably.
    pub fn patch_mut(&mut self, coord: PatchCoord) -> Option<&mut TerrainPatch> {
        self.index(coord).map(move |i| &mut self.patches[i])
    }

    /// All patches, row-major.
    pub fn patches(&self) -> &[TerrainPatch] {
        &self.patches
    }

    /// All patches, mutably.
    pub fn patches_mut(&mut self) -> &mut [TerrainPatch] {
        &mut self.patches
    }
}
