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

//! A single terrain tile and its orientation flags.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use umbra_core::math::Vec2;
use umbra_core::umbra_bitflags;

/// Identifies a tile-set texture (an atlas grid of tiles).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileSetId(pub u16);

/// Identifies a surface material in the [`SurfaceTable`](super::SurfaceTable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurfaceId(pub u16);

umbra_bitflags! {
    /// Orientation applied to a tile's image. Rotation happens before flips.
    pub struct TileFlags: u8 {
        /// Rotate the image a quarter turn clockwise.
        const ROTATE_90 = 1 << 0;
        /// Rotate the image a half turn.
        const ROTATE_180 = 1 << 1;
        /// Mirror horizontally.
        const FLIP_X = 1 << 2;
        /// Mirror vertically.
        const FLIP_Y = 1 << 3;
    }
}

impl Serialize for TileFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}

impl<'de> Deserialize<'de> for TileFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u8::deserialize(deserializer).map(TileFlags::from_bits_truncate)
    }
}

/// One cell of a terrain patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    /// The tile-set the image comes from.
    #[serde(rename = "set", default)]
    pub tile_set: TileSetId,
    /// Index of the image in the tile-set, row-major. [`Tile::EMPTY_INDEX`] marks an empty cell.
    #[serde(rename = "i")]
    pub index: u16,
    /// Surface material.
    #[serde(rename = "s", default)]
    pub surface: SurfaceId,
    /// Orientation.
    #[serde(rename = "f", default, skip_serializing_if = "TileFlags::is_empty")]
    pub flags: TileFlags,
}

impl Default for Tile {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Tile {
    /// The index stored in empty cells.
    pub const EMPTY_INDEX: u16 = u16::MAX;

    /// An empty cell. Empty cells produce no geometry.
    pub const EMPTY: Tile = Tile {
        tile_set: TileSetId(0),
        index: Self::EMPTY_INDEX,
        surface: SurfaceId(0),
        flags: TileFlags::EMPTY,
    };

    /// Creates an unrotated tile.
    pub const fn new(tile_set: TileSetId, index: u16, surface: SurfaceId) -> Self {
        Self {
            tile_set,
            index,
            surface,
            flags: TileFlags::EMPTY,
        }
    }

    /// Returns a copy with the given orientation.
    #[must_use]
    pub const fn with_flags(mut self, flags: TileFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Returns `true` for an empty cell.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.index == Self::EMPTY_INDEX
    }

    /// Cell-local texture coordinates for the corners top-left, top-right,
    /// bottom-right and bottom-left, with the orientation applied.
    pub fn oriented_uvs(&self) -> [Vec2; 4] {
        const BASE: [Vec2; 4] = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        let mut turns = 0;
        if self.flags.contains(TileFlags::ROTATE_90) {
            turns += 1;
        }
        if self.flags.contains(TileFlags::ROTATE_180) {
            turns += 2;
        }
        let flip_x = self.flags.contains(TileFlags::FLIP_X);
        let flip_y = self.flags.contains(TileFlags::FLIP_Y);
        std::array::from_fn(|corner| {
            let uv = BASE[(corner + 4 - turns) % 4];
            Vec2::new(
                if flip_x { 1.0 - uv.x } else { uv.x },
                if flip_y { 1.0 - uv.y } else { uv.y },
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_turn_moves_bottom_left_to_top_left() {
        let tile = Tile::new(TileSetId(0), 0, SurfaceId(0)).with_flags(TileFlags::ROTATE_90);
        let uvs = tile.oriented_uvs();
        assert_eq!(uvs[0], Vec2::new(0.0, 1.0));
        assert_eq!(uvs[1], Vec2::new(0.0, 0.0));
    }

    #[test]
    fn flips_mirror_coordinates() {
        let tile = Tile::new(TileSetId(0), 0, SurfaceId(0)).with_flags(TileFlags::FLIP_X);
        assert_eq!(tile.oriented_uvs()[0], Vec2::new(1.0, 0.0));
    }

    #[test]
    fn compact_serialization() {
        let tile = Tile::new(TileSetId(1), 7, SurfaceId(2)).with_flags(TileFlags::FLIP_Y);
        let json = serde_json::to_string(&tile).unwrap();
        assert_eq!(json, r#"{"set":1,"i":7,"s":2,"f":8}"#);
        let back: Tile = serde_json::from_str(r#"{"i":7}"#).unwrap();
        assert_eq!(back.surface, SurfaceId(0));
        assert!(back.flags.is_empty());
    }

    #[test]
    fn empty_tile() {
        assert!(Tile::default().is_empty());
        assert!(!Tile::new(TileSetId(0), 0, SurfaceId(0)).is_empty());
    }
}
