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

//! Defines data structures related to texture resources.
//!
//! Every texture holds linear RGBA `f32` texels. There is no format
//! negotiation: light accumulation needs values above `1.0` and the pipeline
//! never samples anything else.

use crate::math::{next_power_of_two, Extent2D};
use crate::umbra_bitflags;
use std::borrow::Cow;

/// An opaque handle to a texture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub usize);

/// Defines the filtering mode for texture sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Point sampling. Returns the value of the nearest texel.
    Nearest,
    /// Linear interpolation. Returns a weighted average of the four nearest texels.
    #[default]
    Linear,
}

umbra_bitflags! {
    /// A set of flags describing the allowed usages of a texture.
    pub struct TextureUsage: u8 {
        /// The texture can be sampled while drawing.
        const TEXTURE_BINDING = 1 << 0;
        /// The texture can be the target of a render pass.
        const RENDER_ATTACHMENT = 1 << 1;
        /// The texture contents can be read back to the CPU.
        const COPY_SRC = 1 << 2;
        /// The texture contents can be written from the CPU.
        const COPY_DST = 1 << 3;
    }
}

impl TextureUsage {
    /// Usage of a scratch render target: drawn into, sampled, read back.
    pub const RENDER_TARGET: Self = Self::from_bits_truncate(
        Self::TEXTURE_BINDING.bits() | Self::RENDER_ATTACHMENT.bits() | Self::COPY_SRC.bits(),
    );
    /// Usage of an uploaded image.
    pub const SAMPLED: Self =
        Self::from_bits_truncate(Self::TEXTURE_BINDING.bits() | Self::COPY_DST.bits());
}

/// A descriptor used to create a [`TextureId`].
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The dimensions of the texture.
    pub size: Extent2D,
    /// How the texture will be used.
    pub usage: TextureUsage,
}

impl<'a> TextureDescriptor<'a> {
    /// A render target descriptor.
    pub fn render_target(label: &'a str, size: Extent2D) -> Self {
        Self {
            label: Some(Cow::Borrowed(label)),
            size,
            usage: TextureUsage::RENDER_TARGET,
        }
    }

    /// A sampled, CPU-uploaded texture descriptor.
    pub fn sampled(label: &'a str, size: Extent2D) -> Self {
        Self {
            label: Some(Cow::Borrowed(label)),
            size,
            usage: TextureUsage::SAMPLED,
        }
    }

    /// Size of the texture storage in bytes.
    pub fn byte_size(&self) -> usize {
        self.size.area() * std::mem::size_of::<[f32; 4]>()
    }
}

/// A power-of-two size class for square scratch targets: side = `1 << n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SizeClass(pub u8);

impl SizeClass {
    /// The largest supported size class (32768 texels per side).
    pub const MAX: SizeClass = SizeClass(15);

    /// Smallest class whose side is at least `side` texels.
    pub fn fitting(side: u32) -> Self {
        let class = next_power_of_two(side).trailing_zeros() as u8;
        SizeClass(class.min(Self::MAX.0))
    }

    /// Smallest class whose square covers `extent`.
    pub fn for_extent(extent: Extent2D) -> Self {
        Self::fitting(extent.max_side())
    }

    /// Side length in texels.
    #[inline]
    pub fn side(&self) -> u32 {
        1u32 << self.0
    }

    /// The square extent of this class.
    #[inline]
    pub fn extent(&self) -> Extent2D {
        Extent2D::square(self.side())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_class_fits_requested_side() {
        assert_eq!(SizeClass::fitting(1).side(), 1);
        assert_eq!(SizeClass::fitting(100).side(), 128);
        assert_eq!(SizeClass::fitting(128).side(), 128);
        assert_eq!(SizeClass::for_extent(Extent2D::new(300, 40)).side(), 512);
    }

    #[test]
    fn render_target_usage() {
        let desc = TextureDescriptor::render_target("rt", Extent2D::square(4));
        assert!(desc.usage.contains(TextureUsage::RENDER_ATTACHMENT));
        assert!(!desc.usage.contains(TextureUsage::COPY_DST));
        assert_eq!(desc.byte_size(), 16 * 16);
    }
}
