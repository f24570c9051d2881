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

//! Scoped ownership of device resources.
//!
//! [`OwnedTexture`] and [`OwnedBuffer`] release their handle when dropped, so
//! every exit path (early `?`, a lost device, a lane being torn down) returns
//! the resource to the device.

use super::buffer::{BufferDescriptor, BufferId, Vertex2D, WriteMode};
use super::texture::{TextureDescriptor, TextureId};
use crate::math::{Extent2D, LinearRgba};
use crate::renderer::error::ResourceError;
use crate::renderer::traits::GraphicsDevice;
use std::sync::Arc;

/// A texture destroyed on drop.
#[derive(Debug)]
pub struct OwnedTexture {
    id: TextureId,
    size: Extent2D,
    device: Arc<dyn GraphicsDevice>,
}

impl OwnedTexture {
    /// Creates a texture on `device`.
    pub fn new(
        device: &Arc<dyn GraphicsDevice>,
        descriptor: &TextureDescriptor,
    ) -> Result<Self, ResourceError> {
        let id = device.create_texture(descriptor)?;
        Ok(Self {
            id,
            size: descriptor.size,
            device: Arc::clone(device),
        })
    }

    /// Creates a sampled texture and uploads `texels` (row-major).
    pub fn with_texels(
        device: &Arc<dyn GraphicsDevice>,
        descriptor: &TextureDescriptor,
        texels: &[LinearRgba],
    ) -> Result<Self, ResourceError> {
        let texture = Self::new(device, descriptor)?;
        device.write_texture(texture.id, texels)?;
        Ok(texture)
    }

    /// The device handle.
    #[inline]
    pub fn id(&self) -> TextureId {
        self.id
    }

    /// The texture size.
    #[inline]
    pub fn size(&self) -> Extent2D {
        self.size
    }

    /// Reads the texels back (row-major).
    pub fn read(&self) -> Result<Vec<LinearRgba>, ResourceError> {
        self.device.read_texture(self.id)
    }
}

impl Drop for OwnedTexture {
    fn drop(&mut self) {
        if let Err(e) = self.device.destroy_texture(self.id) {
            log::error!("Failed to destroy texture {:?}: {e}", self.id);
        }
    }
}

/// A vertex buffer destroyed on drop.
#[derive(Debug)]
pub struct OwnedBuffer {
    id: BufferId,
    capacity: u32,
    device: Arc<dyn GraphicsDevice>,
}

impl OwnedBuffer {
    /// Creates a buffer on `device`.
    pub fn new(
        device: &Arc<dyn GraphicsDevice>,
        descriptor: &BufferDescriptor,
    ) -> Result<Self, ResourceError> {
        let id = device.create_buffer(descriptor)?;
        Ok(Self {
            id,
            capacity: descriptor.capacity,
            device: Arc::clone(device),
        })
    }

    /// The device handle.
    #[inline]
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Capacity in vertices.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Writes vertices starting at vertex `offset`.
    pub fn write(
        &self,
        offset: u32,
        vertices: &[Vertex2D],
        mode: WriteMode,
    ) -> Result<(), ResourceError> {
        if offset as usize + vertices.len() > self.capacity as usize {
            return Err(ResourceError::OutOfBounds);
        }
        self.device.write_buffer(self.id, offset, vertices, mode)
    }
}

impl Drop for OwnedBuffer {
    fn drop(&mut self) {
        if let Err(e) = self.device.destroy_buffer(self.id) {
            log::error!("Failed to destroy buffer {:?}: {e}", self.id);
        }
    }
}
