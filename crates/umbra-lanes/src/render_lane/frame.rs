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

//! Per-frame bookkeeping shared by the lighting passes.

use super::swap_pool::{PingPong, PooledTarget, SwapPool};
use std::sync::Arc;
use umbra_core::math::LinearRgba;
use umbra_core::renderer::{
    GraphicsDevice, LoadOp, RenderError, RenderPassDescriptor, RenderPassEncoder, RenderTarget,
    SizeClass, TextureId,
};

/// What the lighting compositor did during one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Simple lights drawn.
    pub simple_lights: usize,
    /// Dynamic (shadow casting) lights drawn.
    pub dynamic_lights: usize,
    /// Lights dropped because they miss the light-space region.
    pub culled_lights: usize,
    /// Lights dropped by `maxSimpleLights` / `maxDynamicLights`.
    pub capped_lights: usize,
    /// Labels of the render passes issued, in order.
    pub passes: Vec<&'static str>,
    /// Set when the frame's lighting was abandoned and the previous
    /// result kept.
    pub skipped: Option<String>,
    /// `true` when `showFinalAccumulator` froze the displayed result.
    pub frozen: bool,
}

impl FrameReport {
    /// Number of passes with the given label.
    pub fn pass_count(&self, label: &str) -> usize {
        self.passes.iter().filter(|p| **p == label).count()
    }

    /// Returns `true` if a pass with the given label ran.
    pub fn ran(&self, label: &str) -> bool {
        self.passes.iter().any(|p| *p == label)
    }
}

/// Opens render passes and borrows pool targets for one frame.
pub(crate) struct PassRecorder<'a> {
    device: &'a Arc<dyn GraphicsDevice>,
    pool: &'a mut SwapPool,
    passes: &'a mut Vec<&'static str>,
}

impl<'a> PassRecorder<'a> {
    pub(crate) fn new(
        device: &'a Arc<dyn GraphicsDevice>,
        pool: &'a mut SwapPool,
        passes: &'a mut Vec<&'static str>,
    ) -> Self {
        Self {
            device,
            pool,
            passes,
        }
    }

    pub(crate) fn acquire(&mut self, class: SizeClass) -> Result<PooledTarget, RenderError> {
        Ok(self.pool.acquire(self.device, class)?)
    }

    pub(crate) fn acquire_pair(&mut self, class: SizeClass) -> Result<PingPong, RenderError> {
        Ok(self.pool.acquire_pair(self.device, class)?)
    }

    /// Begins a pass on `target`, clearing it to `clear` if given.
    pub(crate) fn begin(
        &mut self,
        label: &'static str,
        target: TextureId,
        clear: Option<LinearRgba>,
    ) -> Result<Box<dyn RenderPassEncoder + 'a>, RenderError> {
        self.passes.push(label);
        let device: &'a Arc<dyn GraphicsDevice> = self.device;
        let descriptor = RenderPassDescriptor {
            label: Some(label.into()),
            target: RenderTarget::Texture(target),
            load: clear.map_or(LoadOp::Load, LoadOp::Clear),
        };
        device.begin_render_pass(&descriptor)
    }
}
