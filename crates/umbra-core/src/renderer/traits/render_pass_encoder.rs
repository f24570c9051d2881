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

use crate::math::{Affine2, Extent2D, LinearRgba};
use crate::renderer::api::{BlendMode, BufferId, FilterMode, PrimitiveTopology, TextureId, Vertex2D};
use crate::renderer::error::RenderError;
use std::ops::Range;

/// Records draws into an open render pass.
///
/// State set on the encoder (blend mode, texture, transform, color) applies
/// to every following draw until changed. A fresh encoder starts with
/// [`BlendMode::Alpha`], no texture (white), the identity transform and a
/// white color.
pub trait RenderPassEncoder {
    /// Sets the blend mode for subsequent draws.
    fn set_blend_mode(&mut self, mode: BlendMode);

    /// Binds a texture (or none, sampling opaque white) for subsequent draws.
    fn set_texture(&mut self, texture: Option<TextureId>, filter: FilterMode);

    /// Sets the transform from vertex positions to target pixels.
    fn set_transform(&mut self, transform: Affine2);

    /// Sets a color multiplied into every fragment.
    fn set_color(&mut self, color: LinearRgba);

    /// Draws immediate vertices.
    fn draw(&mut self, vertices: &[Vertex2D], topology: PrimitiveTopology)
        -> Result<(), RenderError>;

    /// Draws a vertex range out of a retained buffer.
    fn draw_buffer(
        &mut self,
        buffer: BufferId,
        range: Range<u32>,
        topology: PrimitiveTopology,
    ) -> Result<(), RenderError>;

    /// Size of the pass target in pixels.
    fn target_extent(&self) -> Extent2D;
}
