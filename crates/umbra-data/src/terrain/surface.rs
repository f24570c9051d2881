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

//! Surface materials: per-surface properties deciding how each render pass
//! draws a tile.

use super::tile::SurfaceId;
use serde::{Deserialize, Serialize};
use umbra_core::math::LinearRgba;

/// Properties of one surface material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SurfaceInfo {
    /// Display name.
    pub name: String,
    /// Draws in the emissive pass.
    pub emissive: bool,
    /// Emissive color, multiplied with the tile image.
    pub emissive_color: LinearRgba,
    /// Blocks light: draws black in the occluder passes.
    pub occluder: bool,
    /// Color written by the normals pass.
    pub normal_color: LinearRgba,
    /// Color written by the specular pass.
    pub specular_color: LinearRgba,
}

impl Default for SurfaceInfo {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            emissive: false,
            emissive_color: LinearRgba::WHITE,
            occluder: true,
            normal_color: LinearRgba::FLAT_NORMAL,
            specular_color: LinearRgba::BLACK,
        }
    }
}

impl SurfaceInfo {
    /// A named surface with default properties.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// All surface materials of a terrain, indexed by [`SurfaceId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<SurfaceInfo>", into = "Vec<SurfaceInfo>")]
pub struct SurfaceTable {
    surfaces: Vec<SurfaceInfo>,
}

impl Default for SurfaceTable {
    fn default() -> Self {
        Self {
            surfaces: vec![SurfaceInfo::default()],
        }
    }
}

impl From<Vec<SurfaceInfo>> for SurfaceTable {
    fn from(surfaces: Vec<SurfaceInfo>) -> Self {
        Self::new(surfaces)
    }
}

impl From<SurfaceTable> for Vec<SurfaceInfo> {
    fn from(table: SurfaceTable) -> Self {
        table.surfaces
    }
}

impl SurfaceTable {
    /// Builds a table. An empty list yields the single default surface.
    pub fn new(surfaces: Vec<SurfaceInfo>) -> Self {
        if surfaces.is_empty() {
            Self::default()
        } else {
            Self { surfaces }
        }
    }

    /// Adds a surface and returns its id.
    pub fn push(&mut self, info: SurfaceInfo) -> SurfaceId {
        self.surfaces.push(info);
        SurfaceId((self.surfaces.len() - 1) as u16)
    }

    /// The surface for `id`; unknown ids resolve to surface 0.
    pub fn get(&self, id: SurfaceId) -> &SurfaceInfo {
        self.surfaces
            .get(id.0 as usize)
            .unwrap_or(&self.surfaces[0])
    }

    /// Returns `true` if `id` names a real surface.
    pub fn contains(&self, id: SurfaceId) -> bool {
        (id.0 as usize) < self.surfaces.len()
    }

    /// Number of surfaces.
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    /// Always `false`: a table holds at least the default surface.
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_ids_fall_back_to_the_first_surface() {
        let mut table = SurfaceTable::default();
        let lava = table.push(SurfaceInfo {
            emissive: true,
            ..SurfaceInfo::named("lava")
        });
        assert_eq!(lava, SurfaceId(1));
        assert!(table.get(lava).emissive);
        assert_eq!(table.get(SurfaceId(9)).name, "default");
    }

    #[test]
    fn empty_documents_keep_the_default_surface() {
        let table: SurfaceTable = serde_json::from_str("[]").unwrap();
        assert_eq!(table.len(), 1);
    }
}
