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

use crate::renderer::error::RenderError;
use crate::renderer::pass::PassContext;
use crate::renderer::traits::RenderPassEncoder;

/// Anything that draws itself into the scene.
///
/// The pass context says which pass is running; an implementor decides from
/// it whether and how to draw (occluders only, emissive only, tinted...).
/// Nothing else carries the current pass.
pub trait SceneRenderable {
    /// Draws into `encoder` for the pass described by `ctx`.
    fn render(
        &self,
        ctx: &PassContext,
        encoder: &mut dyn RenderPassEncoder,
    ) -> Result<(), RenderError>;
}

impl<T: SceneRenderable + ?Sized> SceneRenderable for &T {
    fn render(
        &self,
        ctx: &PassContext,
        encoder: &mut dyn RenderPassEncoder,
    ) -> Result<(), RenderError> {
        (**self).render(ctx, encoder)
    }
}
