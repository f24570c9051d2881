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

//! Adapter and device information.

/// The kind of backend behind a [`GraphicsDevice`](crate::renderer::GraphicsDevice).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GraphicsBackendType {
    /// A CPU implementation.
    Software,
    /// A hardware-accelerated implementation.
    Hardware,
    /// Unknown or not yet determined.
    #[default]
    Unknown,
}

/// Provides backend-agnostic information about a graphics adapter.
#[derive(Debug, Clone, Default)]
pub struct RendererAdapterInfo {
    /// The name of the adapter.
    pub name: String,
    /// The backend type.
    pub backend_type: GraphicsBackendType,
    /// Largest texture side the device accepts.
    pub max_texture_side: u32,
}
