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

//! The render pass a draw belongs to, and the immutable context carrying it.
//!
//! Every draw-capable component receives a [`PassContext`] by reference. The
//! context is built by the pass block that opens a render pass and dies with
//! it, so a pass can never leak into draws outside its block.

use crate::math::{Affine2, Rect};
use std::fmt;

/// One complete traversal of the scene for a specific output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderPass {
    /// Regular colored drawing.
    Diffuse,
    /// Only light-emitting things draw, in their emissive color.
    Emissive,
    /// Occluders draw black into a dynamic light's shadow mask.
    LightShadow,
    /// Occluders draw black into the directional light's shadow mask.
    DirectionalShadow,
    /// Occluders draw black into the viewer's visibility mask.
    Vision,
    /// Surfaces draw their normal color.
    Normals,
    /// Surfaces draw their specular color.
    Specular,
}

impl RenderPass {
    /// Returns `true` for the passes in which only occluders draw.
    #[inline]
    pub fn is_occluder_pass(&self) -> bool {
        matches!(
            self,
            RenderPass::LightShadow | RenderPass::DirectionalShadow | RenderPass::Vision
        )
    }

    /// A short label used for pass logs and debug names.
    pub fn label(&self) -> &'static str {
        match self {
            RenderPass::Diffuse => "diffuse",
            RenderPass::Emissive => "emissive",
            RenderPass::LightShadow => "light_shadow",
            RenderPass::DirectionalShadow => "directional_shadow",
            RenderPass::Vision => "vision",
            RenderPass::Normals => "normals",
            RenderPass::Specular => "specular",
        }
    }
}

impl fmt::Display for RenderPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Immutable per-pass drawing context.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassContext {
    /// The pass being rendered.
    pub pass: RenderPass,
    /// Maps world coordinates to pixels of the pass target.
    pub view: Affine2,
    /// World-space region covered by the target, for culling.
    pub visible_bounds: Rect,
    /// Opacity multiplier applied to everything drawn.
    pub alpha: f32,
    /// Camera zoom, in target pixels per world unit.
    pub zoom: f32,
    /// Layers with a depth below this value lie behind the occlusion plane.
    /// `None` disables depth-based occlusion culling.
    pub occlusion_depth: Option<i32>,
}

impl PassContext {
    /// Creates a context with full opacity and no occlusion plane.
    pub fn new(pass: RenderPass, view: Affine2, visible_bounds: Rect) -> Self {
        Self {
            pass,
            view,
            visible_bounds,
            alpha: 1.0,
            zoom: view.uniform_scale(),
            occlusion_depth: None,
        }
    }

    /// Returns a copy with another opacity.
    #[must_use]
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Returns a copy with an occlusion plane.
    #[must_use]
    pub fn with_occlusion_depth(mut self, depth: Option<i32>) -> Self {
        self.occlusion_depth = depth;
        self
    }

    /// Returns a copy for another pass, keeping view and bounds.
    #[must_use]
    pub fn for_pass(mut self, pass: RenderPass) -> Self {
        self.pass = pass;
        self
    }

    /// Returns `true` if a layer at `depth` is behind the occlusion plane.
    #[inline]
    pub fn is_occluded_depth(&self, depth: i32) -> bool {
        self.occlusion_depth.is_some_and(|plane| depth < plane)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;

    #[test]
    fn occluder_passes() {
        for pass in [RenderPass::LightShadow, RenderPass::DirectionalShadow, RenderPass::Vision] {
            assert!(pass.is_occluder_pass());
        }
        for pass in [RenderPass::Diffuse, RenderPass::Emissive, RenderPass::Normals, RenderPass::Specular] {
            assert!(!pass.is_occluder_pass());
        }
    }

    #[test]
    fn occlusion_plane() {
        let ctx = PassContext::new(
            RenderPass::LightShadow,
            Affine2::from_scale(Vec2::splat(2.0)),
            Rect::default(),
        );
        assert_eq!(ctx.zoom, 2.0);
        assert!(!ctx.is_occluded_depth(-5));
        let ctx = ctx.with_occlusion_depth(Some(0));
        assert!(ctx.is_occluded_depth(-1));
        assert!(!ctx.is_occluded_depth(0));
    }
}
