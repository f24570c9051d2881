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

//! Defines data structures related to vertex buffer resources.

use crate::math::{LinearRgba, Vec2};
use crate::umbra_bitflags;
use std::borrow::Cow;

umbra_bitflags! {
    /// A set of flags describing the allowed usages of a [`BufferId`].
    pub struct BufferUsage: u8 {
        /// The buffer can be bound as a vertex buffer.
        const VERTEX = 1 << 0;
        /// The buffer can be written from the CPU.
        const COPY_DST = 1 << 1;
        /// The buffer is rewritten often; the backend should favor discard writes.
        const DYNAMIC = 1 << 2;
    }
}

/// The vertex layout shared by every draw in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Vertex2D {
    /// Position, in the space selected by the encoder transform.
    pub pos: [f32; 2],
    /// Normalized texture coordinates.
    pub uv: [f32; 2],
    /// Per-vertex color, multiplied with the sampled texel.
    pub color: [f32; 4],
}

impl Vertex2D {
    /// Creates a vertex.
    #[inline]
    pub fn new(pos: Vec2, uv: Vec2, color: LinearRgba) -> Self {
        Self {
            pos: [pos.x, pos.y],
            uv: [uv.x, uv.y],
            color: [color.r, color.g, color.b, color.a],
        }
    }

    /// The position as a vector.
    #[inline]
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.pos[0], self.pos[1])
    }

    /// The texture coordinates as a vector.
    #[inline]
    pub fn tex_coords(&self) -> Vec2 {
        Vec2::new(self.uv[0], self.uv[1])
    }

    /// The vertex color.
    #[inline]
    pub fn rgba(&self) -> LinearRgba {
        LinearRgba::new(self.color[0], self.color[1], self.color[2], self.color[3])
    }
}

/// A descriptor used to create a [`BufferId`].
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// An optional debug label for the buffer.
    pub label: Option<Cow<'a, str>>,
    /// Capacity of the buffer, in vertices.
    pub capacity: u32,
    /// A bitmask of [`BufferUsage`] flags describing how the buffer will be used.
    pub usage: BufferUsage,
}

impl BufferDescriptor<'_> {
    /// Size of the buffer storage in bytes.
    pub fn byte_size(&self) -> usize {
        self.capacity as usize * std::mem::size_of::<Vertex2D>()
    }
}

/// How a CPU write interacts with the previous buffer contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteMode {
    /// The whole previous content is abandoned. The backend may hand out a
    /// fresh backing store instead of waiting for in-flight reads.
    Discard,
    /// Only the written range changes; the caller promises not to touch
    /// vertices still in use.
    NoOverwrite,
}

/// An opaque handle to a vertex buffer resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub usize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex2D>(), 32);
        let v = Vertex2D::new(Vec2::new(1.0, 2.0), Vec2::ONE, LinearRgba::RED);
        let bytes: &[u8] = bytemuck::bytes_of(&v);
        assert_eq!(bytes.len(), 32);
        assert_eq!(v.rgba(), LinearRgba::RED);
    }
}
