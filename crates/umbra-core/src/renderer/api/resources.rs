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

//! The explicit owner of shared device objects.

use super::owned::OwnedTexture;
use super::texture::{TextureDescriptor, TextureId};
use crate::math::{Extent2D, LinearRgba};
use crate::renderer::error::ResourceError;
use crate::renderer::traits::GraphicsDevice;
use std::sync::Arc;

/// Shared device objects every lane may use.
///
/// Created by the render agent when device objects are initialized and
/// dropped when they are destroyed. Lanes receive it by reference; nothing
/// in the pipeline reaches a device through a global.
#[derive(Debug)]
pub struct GraphicsResources {
    device: Arc<dyn GraphicsDevice>,
    white: OwnedTexture,
}

impl GraphicsResources {
    /// Creates the shared objects on `device`.
    pub fn create(device: Arc<dyn GraphicsDevice>) -> Result<Self, ResourceError> {
        let white = OwnedTexture::with_texels(
            &device,
            &TextureDescriptor::sampled("white", Extent2D::square(1)),
            &[LinearRgba::WHITE],
        )?;
        log::debug!("Graphics resources created on '{}'", device.get_adapter_info().name);
        Ok(Self { device, white })
    }

    /// The device.
    #[inline]
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.device
    }

    /// A 1×1 opaque white texture, the fallback for missing images.
    #[inline]
    pub fn white_texture(&self) -> TextureId {
        self.white.id()
    }
}
