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

//! Terrain persistence (JSON and RON).
//!
//! Loading never crashes the caller: [`load_terrain_or_blank`] reports
//! malformed input on the diagnostic bus and returns a blank terrain.

use super::{PatchCoord, SurfaceInfo, SurfaceTable, Terrain, Tile};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use umbra_core::math::LinearRgba;
use umbra_core::{Diagnostic, DiagnosticBus};

/// On-disk encoding of a terrain document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerrainFormat {
    /// `serde_json`.
    Json,
    /// Rusty Object Notation.
    Ron,
}

impl TerrainFormat {
    /// Picks the format from a file extension; anything but `.ron` is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("ron") => TerrainFormat::Ron,
            _ => TerrainFormat::Json,
        }
    }
}

/// Why a terrain document could not be loaded.
#[derive(Debug)]
pub enum TerrainLoadError {
    /// The file could not be read or written.
    Io(std::io::Error),
    /// The JSON document is malformed.
    Json(serde_json::Error),
    /// The RON document is malformed.
    Ron(String),
    /// The document parsed but describes an impossible terrain.
    Invalid(String),
}

impl fmt::Display for TerrainLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerrainLoadError::Io(e) => write!(f, "Terrain I/O error: {e}"),
            TerrainLoadError::Json(e) => write!(f, "Malformed terrain JSON: {e}"),
            TerrainLoadError::Ron(msg) => write!(f, "Malformed terrain RON: {msg}"),
            TerrainLoadError::Invalid(msg) => write!(f, "Invalid terrain: {msg}"),
        }
    }
}

impl std::error::Error for TerrainLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TerrainLoadError::Io(e) => Some(e),
            TerrainLoadError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TerrainLoadError {
    fn from(e: std::io::Error) -> Self {
        TerrainLoadError::Io(e)
    }
}

/// Largest number of tiles a loaded document may allocate, summed over
/// every layer.
pub const MAX_DOCUMENT_TILES: u64 = 1 << 24;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TerrainDocument {
    tile_size: f32,
    patch_size: u32,
    patches_x: u32,
    patches_y: u32,
    #[serde(default)]
    surfaces: Vec<SurfaceInfo>,
    #[serde(default)]
    layers: Vec<LayerDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LayerDocument {
    name: String,
    #[serde(default)]
    depth: i32,
    #[serde(default)]
    tint: LinearRgba,
    #[serde(default = "default_visible")]
    visible: bool,
    #[serde(default)]
    patches: Vec<PatchDocument>,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
struct PatchDocument {
    x: u32,
    y: u32,
    tiles: Vec<Tile>,
}

impl TerrainDocument {
    fn from_terrain(terrain: &Terrain) -> Self {
        let (patches_x, patches_y) = terrain.patch_grid();
        let layers = terrain
            .layers()
            .iter()
            .map(|layer| LayerDocument {
                name: layer.name.clone(),
                depth: layer.depth,
                tint: layer.tint,
                visible: layer.visible,
                patches: layer
                    .patches()
                    .iter()
                    .filter(|p| p.non_empty_count() > 0)
                    .map(|p| PatchDocument {
                        x: p.coord().x,
                        y: p.coord().y,
                        tiles: p.tiles().to_vec(),
                    })
                    .collect(),
            })
            .collect();
        Self {
            tile_size: terrain.tile_size(),
            patch_size: terrain.patch_size(),
            patches_x,
            patches_y,
            surfaces: (0..terrain.surfaces.len())
                .map(|i| terrain.surfaces.get(super::SurfaceId(i as u16)).clone())
                .collect(),
            layers,
        }
    }

    /// Checks the grid against [`MAX_DOCUMENT_TILES`] before anything is
    /// allocated. Returns the tile count of one patch.
    fn checked_tile_budget(&self) -> Result<usize, TerrainLoadError> {
        let too_large = || {
            TerrainLoadError::Invalid(format!(
                "{}x{} patches of {}x{} tiles in {} layers exceed {MAX_DOCUMENT_TILES} tiles",
                self.patches_x,
                self.patches_y,
                self.patch_size,
                self.patch_size,
                self.layers.len()
            ))
        };
        let size = u64::from(self.patch_size);
        let per_patch = size.checked_mul(size).ok_or_else(too_large)?;
        let total = u64::from(self.patches_x)
            .checked_mul(u64::from(self.patches_y))
            .and_then(|patches| patches.checked_mul(per_patch))
            .and_then(|tiles| tiles.checked_mul(self.layers.len().max(1) as u64))
            .ok_or_else(too_large)?;
        if per_patch > MAX_DOCUMENT_TILES || total > MAX_DOCUMENT_TILES {
            return Err(too_large());
        }
        Ok(per_patch as usize)
    }

    fn into_terrain(self) -> Result<Terrain, TerrainLoadError> {
        if !(self.tile_size.is_finite() && self.tile_size > 0.0) {
            return Err(TerrainLoadError::Invalid(format!(
                "tile size {} must be positive",
                self.tile_size
            )));
        }
        if self.patch_size == 0 {
            return Err(TerrainLoadError::Invalid("patch size is zero".into()));
        }
        let expected = self.checked_tile_budget()?;
        let mut terrain = Terrain::new(self.patches_x, self.patches_y, self.patch_size, self.tile_size);
        terrain.surfaces = SurfaceTable::new(self.surfaces);

        for layer_doc in self.layers {
            let index = terrain.add_layer(layer_doc.name, layer_doc.depth);
            let Some(layer) = terrain.layer_mut(index) else {
                continue;
            };
            layer.tint = layer_doc.tint;
            layer.visible = layer_doc.visible;
            for patch_doc in layer_doc.patches {
                if patch_doc.tiles.len() != expected {
                    return Err(TerrainLoadError::Invalid(format!(
                        "patch ({}, {}) of layer '{}' holds {} tiles, expected {expected}",
                        patch_doc.x,
                        patch_doc.y,
                        layer.name,
                        patch_doc.tiles.len()
                    )));
                }
                let coord = PatchCoord::new(patch_doc.x, patch_doc.y);
                let name = layer.name.clone();
                let patch = layer.patch_mut(coord).ok_or_else(|| {
                    TerrainLoadError::Invalid(format!(
                        "patch ({}, {}) of layer '{name}' is outside the grid",
                        coord.x, coord.y
                    ))
                })?;
                let size = patch.size();
                for (i, tile) in patch_doc.tiles.into_iter().enumerate() {
                    patch.set_tile(i as u32 % size, i as u32 / size, tile);
                }
            }
        }
        Ok(terrain)
    }
}

/// Parses a terrain document.
pub fn load_terrain_str(source: &str, format: TerrainFormat) -> Result<Terrain, TerrainLoadError> {
    let doc: TerrainDocument = match format {
        TerrainFormat::Json => serde_json::from_str(source).map_err(TerrainLoadError::Json)?,
        TerrainFormat::Ron => {
            ron::from_str(source).map_err(|e| TerrainLoadError::Ron(e.to_string()))?
        }
    };
    doc.into_terrain()
}

/// Serializes a terrain document. Empty patches are omitted.
pub fn save_terrain_str(terrain: &Terrain, format: TerrainFormat) -> Result<String, TerrainLoadError> {
    let doc = TerrainDocument::from_terrain(terrain);
    match format {
        TerrainFormat::Json => serde_json::to_string_pretty(&doc).map_err(TerrainLoadError::Json),
        TerrainFormat::Ron => ron::ser::to_string_pretty(&doc, ron::ser::PrettyConfig::default())
            .map_err(|e| TerrainLoadError::Ron(e.to_string())),
    }
}

/// Reads a terrain file; the format follows the extension.
pub fn load_terrain(path: &Path) -> Result<Terrain, TerrainLoadError> {
    let source = std::fs::read_to_string(path)?;
    load_terrain_str(&source, TerrainFormat::from_path(path))
}

/// Writes a terrain file; the format follows the extension.
pub fn save_terrain(terrain: &Terrain, path: &Path) -> Result<(), TerrainLoadError> {
    let text = save_terrain_str(terrain, TerrainFormat::from_path(path))?;
    std::fs::write(path, text)?;
    log::info!("Saved terrain to '{}'", path.display());
    Ok(())
}

/// Reads a terrain file, falling back to a blank terrain.
///
/// Failures are published on `diagnostics` so the user sees them.
pub fn load_terrain_or_blank(path: &Path, diagnostics: &DiagnosticBus) -> Terrain {
    match load_terrain(path) {
        Ok(terrain) => {
            log::info!(
                "Loaded terrain '{}' ({} layers)",
                path.display(),
                terrain.layers().len()
            );
            terrain
        }
        Err(e) => {
            diagnostics.publish(Diagnostic::error(
                "terrain",
                format!("Failed to load '{}': {e}. Using a blank terrain.", path.display()),
            ));
            Terrain::blank()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{SurfaceId, TileSetId};

    fn sample() -> Terrain {
        let mut t = Terrain::new(2, 1, 2, 8.0);
        t.surfaces.push(SurfaceInfo::named("rock"));
        let layer = t.add_layer("ground", 0);
        t.set_tile(layer, 0, 0, Tile::new(TileSetId(0), 1, SurfaceId(1)));
        t.set_tile(layer, 3, 1, Tile::new(TileSetId(1), 2, SurfaceId(0)));
        t
    }

    #[test]
    fn json_and_ron_round_trip() {
        for format in [TerrainFormat::Json, TerrainFormat::Ron] {
            let text = save_terrain_str(&sample(), format).unwrap();
            let back = load_terrain_str(&text, format).unwrap();
            assert_eq!(back.patch_grid(), (2, 1));
            assert_eq!(back.surfaces.get(SurfaceId(1)).name, "rock");
            assert_eq!(back.tile(0, 3, 1), sample().tile(0, 3, 1));
            assert!(back.tile(0, 1, 1).is_some_and(Tile::is_empty));
        }
    }

    #[test]
    fn wrong_tile_count_is_rejected() {
        let json = r#"{ "tileSize": 8, "patchSize": 2, "patchesX": 1, "patchesY": 1,
            "layers": [ { "name": "a", "patches": [ { "x": 0, "y": 0, "tiles": [] } ] } ] }"#;
        assert!(matches!(
            load_terrain_str(json, TerrainFormat::Json),
            Err(TerrainLoadError::Invalid(_))
        ));
    }

    #[test]
    fn oversized_grid_is_rejected_before_allocation() {
        let huge_patch = r#"{ "tileSize": 8, "patchSize": 70000, "patchesX": 1, "patchesY": 1, "layers": [] }"#;
        let huge_grid = r#"{ "tileSize": 8, "patchSize": 64, "patchesX": 4294967295, "patchesY": 4294967295,
            "layers": [ { "name": "a" } ] }"#;
        for json in [huge_patch, huge_grid] {
            assert!(matches!(
                load_terrain_str(json, TerrainFormat::Json),
                Err(TerrainLoadError::Invalid(_))
            ));
        }
    }

    #[test]
    fn oversized_file_falls_back_to_blank_with_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.json");
        std::fs::write(
            &path,
            r#"{ "tileSize": 8, "patchSize": 70000, "patchesX": 1, "patchesY": 1, "layers": [] }"#,
        )
        .unwrap();

        let bus = DiagnosticBus::new();
        let terrain = load_terrain_or_blank(&path, &bus);
        assert!(terrain.is_blank());
        assert_eq!(bus.drain().len(), 1);
    }

    #[test]
    fn malformed_file_falls_back_to_blank_with_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let bus = DiagnosticBus::new();
        let terrain = load_terrain_or_blank(&path, &bus);
        assert!(terrain.is_blank());
        let messages = bus.drain();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].source, "terrain");
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(TerrainFormat::from_path(Path::new("a/b.RON")), TerrainFormat::Ron);
        assert_eq!(TerrainFormat::from_path(Path::new("a/b.json")), TerrainFormat::Json);
    }
}
