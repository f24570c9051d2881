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

//! Tile-set atlases.
//!
//! A tile set is a grid of equally sized tile images in one texture. Tiles
//! reference an image by its row-major index in the grid.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use umbra_core::math::{Extent2D, LinearRgba, Rect, Vec2};
use umbra_core::renderer::{GraphicsDevice, OwnedTexture, ResourceError, TextureDescriptor, TextureId};
use umbra_data::TileSetId;

/// CPU pixels of a tile-set atlas.
#[derive(Debug, Clone, PartialEq)]
pub struct TileSetImage {
    /// Size in pixels.
    pub extent: Extent2D,
    /// Row-major texels.
    pub texels: Vec<LinearRgba>,
}

impl TileSetImage {
    /// An image filled with one color.
    pub fn solid(extent: Extent2D, color: LinearRgba) -> Self {
        Self {
            extent,
            texels: vec![color; extent.area()],
        }
    }

    /// Decodes an encoded image (PNG, ...).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).context("Failed to decode tile-set image")?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let pixels: &[[u8; 4]] = bytemuck::cast_slice(rgba.as_raw());
        Ok(Self {
            extent: Extent2D::new(width, height),
            texels: pixels.iter().map(|p| LinearRgba::from_rgba8(*p)).collect(),
        })
    }
}

/// One registered tile set.
#[derive(Debug)]
pub struct TileSet {
    /// Display name.
    pub name: String,
    /// Tiles per row.
    pub columns: u32,
    /// Tiles per column.
    pub rows: u32,
    image: TileSetImage,
    texture: Option<OwnedTexture>,
}

impl TileSet {
    /// Texture coordinates of image `index`. Out-of-range indices map to the
    /// whole atlas.
    pub fn cell_uv(&self, index: u16) -> Rect {
        let (columns, rows) = (self.columns.max(1), self.rows.max(1));
        let index = u32::from(index);
        if index >= columns * rows {
            return Rect::new(Vec2::ZERO, Vec2::ONE);
        }
        let cell = Vec2::new(1.0 / columns as f32, 1.0 / rows as f32);
        let min = Vec2::new((index % columns) as f32 * cell.x, (index / columns) as f32 * cell.y);
        Rect::new(min, min + cell)
    }
}

/// The tile sets known to the terrain renderer.
#[derive(Debug, Default)]
pub struct TileSetRegistry {
    sets: BTreeMap<TileSetId, TileSet>,
}

impl TileSetRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a tile set. Its texture is created on the next
    /// [`Self::upload`].
    pub fn register(
        &mut self,
        id: TileSetId,
        name: impl Into<String>,
        image: TileSetImage,
        columns: u32,
        rows: u32,
    ) {
        let name = name.into();
        log::debug!("Registered tile set {id:?} '{name}' ({columns}x{rows})");
        self.sets.insert(
            id,
            TileSet {
                name,
                columns,
                rows,
                image,
                texture: None,
            },
        );
    }

    /// A tile set by id.
    pub fn get(&self, id: TileSetId) -> Option<&TileSet> {
        self.sets.get(&id)
    }

    /// Number of registered sets.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Returns `true` if no set is registered.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Texture coordinates of a tile image; unknown sets use the whole texture.
    pub fn cell_uv(&self, id: TileSetId, index: u16) -> Rect {
        self.sets
            .get(&id)
            .map_or(Rect::new(Vec2::ZERO, Vec2::ONE), |set| set.cell_uv(index))
    }

    /// Creates the textures of every set that has none yet.
    pub fn upload(&mut self, device: &Arc<dyn GraphicsDevice>) -> Result<(), ResourceError> {
        for set in self.sets.values_mut().filter(|s| s.texture.is_none()) {
            if set.image.extent.is_empty() {
                continue;
            }
            let texture = OwnedTexture::with_texels(
                device,
                &TextureDescriptor::sampled(&set.name, set.image.extent),
                &set.image.texels,
            )?;
            set.texture = Some(texture);
        }
        Ok(())
    }

    /// Drops every texture. CPU images are kept for the next upload.
    pub fn release(&mut self) {
        for set in self.sets.values_mut() {
            set.texture = None;
        }
    }

    /// The texture of a set, or `fallback` when it has none.
    pub fn texture_or(&self, id: TileSetId, fallback: TextureId) -> TextureId {
        self.sets
            .get(&id)
            .and_then(|s| s.texture.as_ref())
            .map_or(fallback, OwnedTexture::id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use umbra_infra::SoftwareDevice;

    #[test]
    fn cells_are_row_major() {
        let mut registry = TileSetRegistry::new();
        registry.register(
            TileSetId(0),
            "ground",
            TileSetImage::solid(Extent2D::new(64, 32), LinearRgba::WHITE),
            4,
            2,
        );
        let uv = registry.cell_uv(TileSetId(0), 5);
        assert_relative_eq!(uv.min.x, 0.25);
        assert_relative_eq!(uv.min.y, 0.5);
        assert_relative_eq!(uv.max.x, 0.5);
        assert_eq!(registry.cell_uv(TileSetId(9), 5), Rect::new(Vec2::ZERO, Vec2::ONE));
    }

    #[test]
    fn missing_textures_fall_back() {
        let device: Arc<dyn GraphicsDevice> = Arc::new(SoftwareDevice::new(Extent2D::square(4)));
        let mut registry = TileSetRegistry::new();
        registry.register(
            TileSetId(1),
            "rock",
            TileSetImage::solid(Extent2D::square(2), LinearRgba::RED),
            1,
            1,
        );
        let fallback = TextureId(usize::MAX);
        assert_eq!(registry.texture_or(TileSetId(1), fallback), fallback);
        registry.upload(&device).unwrap();
        assert_ne!(registry.texture_or(TileSetId(1), fallback), fallback);
        assert_eq!(registry.texture_or(TileSetId(2), fallback), fallback);
        registry.release();
        assert_eq!(registry.texture_or(TileSetId(1), fallback), fallback);
    }

    #[test]
    fn decodes_png_bytes() {
        let mut png = Vec::new();
        image::RgbaImage::from_pixel(2, 1, image::Rgba([255, 0, 0, 255]))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let decoded = TileSetImage::decode(&png).unwrap();
        assert_eq!(decoded.extent, Extent2D::new(2, 1));
        assert_eq!(decoded.texels[1], LinearRgba::RED);
    }
}
