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

//! Backend-agnostic rendering API.
//!
//! - **[`texture`]** and **[`buffer`]**: handles and their descriptors.
//! - **[`draw`]**: blend state, topology and render pass descriptors.
//! - **[`owned`]**: RAII wrappers releasing handles on drop.
//! - **[`resources`]**: the [`GraphicsResources`] owner passed to lanes.

pub mod buffer;
pub mod common;
pub mod draw;
pub mod owned;
pub mod resources;
pub mod texture;

pub use self::buffer::{BufferDescriptor, BufferId, BufferUsage, Vertex2D, WriteMode};
pub use self::common::{GraphicsBackendType, RendererAdapterInfo};
pub use self::draw::{BlendMode, LoadOp, PrimitiveTopology, RenderPassDescriptor, RenderTarget};
pub use self::owned::{OwnedBuffer, OwnedTexture};
pub use self::resources::GraphicsResources;
pub use self::texture::{FilterMode, SizeClass, TextureDescriptor, TextureId, TextureUsage};
