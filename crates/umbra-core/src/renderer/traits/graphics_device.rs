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

use crate::math::{Extent2D, LinearRgba};
use crate::renderer::api::{
    BufferDescriptor, BufferId, RenderPassDescriptor, RendererAdapterInfo, TextureDescriptor,
    TextureId, Vertex2D, WriteMode,
};
use crate::renderer::error::{RenderError, ResourceError};
use crate::renderer::traits::RenderPassEncoder;
use std::fmt::Debug;

/// Defines the contract for a graphics device.
///
/// This trait is the central point of interaction with the backend for
/// creating and managing textures and vertex buffers and for opening render
/// passes. It is object-safe and shared as `Arc<dyn GraphicsDevice>`.
///
/// Every method takes `&self`: implementations use interior mutability for
/// their resource tables. Destroying a resource must succeed even after the
/// device was lost, so teardown paths never fail.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Creates a new texture. Texels start as transparent black.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Replaces the full content of a texture with row-major `texels`.
    fn write_texture(&self, id: TextureId, texels: &[LinearRgba]) -> Result<(), ResourceError>;

    /// Reads back the full content of a texture, row-major.
    fn read_texture(&self, id: TextureId) -> Result<Vec<LinearRgba>, ResourceError>;

    /// Returns the size of a texture.
    fn texture_extent(&self, id: TextureId) -> Result<Extent2D, ResourceError>;

    /// Destroys a texture, releasing its memory.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Creates a new vertex buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Writes vertices into a buffer, starting at vertex `offset`.
    fn write_buffer(
        &self,
        id: BufferId,
        offset: u32,
        vertices: &[Vertex2D],
        mode: WriteMode,
    ) -> Result<(), ResourceError>;

    /// Destroys a vertex buffer.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Opens a render pass. The pass ends when the returned encoder is dropped.
    fn begin_render_pass<'a>(
        &'a self,
        descriptor: &RenderPassDescriptor,
    ) -> Result<Box<dyn RenderPassEncoder + 'a>, RenderError>;

    /// Size of the presentable surface.
    fn surface_extent(&self) -> Extent2D;

    /// Reads back the presentable surface, row-major.
    fn read_surface(&self) -> Result<Vec<LinearRgba>, RenderError>;

    /// Returns `true` once the device was lost and before it was reset.
    fn is_lost(&self) -> bool;

    /// Gets information about the adapter behind the device.
    fn get_adapter_info(&self) -> RendererAdapterInfo;
}
