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

//! Fixed-function draw state and render pass descriptors.

use super::texture::TextureId;
use crate::math::LinearRgba;
use std::borrow::Cow;

/// How a fragment combines with the pixel already in the target.
///
/// `src` is the sampled texel modulated by vertex and encoder color, `dst` the
/// current target pixel. `a` is `src.a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// `dst = src`.
    Replace,
    /// Classic over: `dst.rgb = src.rgb * a + dst.rgb * (1 - a)`.
    #[default]
    Alpha,
    /// `dst.rgb += src.rgb * a`. Alpha is left untouched.
    Additive,
    /// `dst.rgb *= lerp(1, src.rgb, a)`. Alpha is left untouched.
    Multiply,
}

/// How vertices are assembled into triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    /// Every three vertices form a triangle.
    TriangleList,
    /// Every vertex after the second forms a triangle with the two before it.
    TriangleStrip,
}

/// What a render pass draws into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTarget {
    /// The presentable surface.
    Surface,
    /// An offscreen texture created with `RENDER_ATTACHMENT` usage.
    Texture(TextureId),
}

/// What happens to the target at the start of a pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp<T> {
    /// Keep the current content.
    Load,
    /// Clear to the given value.
    Clear(T),
}

/// Describes a render pass.
#[derive(Debug, Clone)]
pub struct RenderPassDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The target of the pass.
    pub target: RenderTarget,
    /// The load operation on the target.
    pub load: LoadOp<LinearRgba>,
}

impl<'a> RenderPassDescriptor<'a> {
    /// A pass that clears `target` to `color` first.
    pub fn clear(label: &'a str, target: RenderTarget, color: LinearRgba) -> Self {
        Self {
            label: Some(Cow::Borrowed(label)),
            target,
            load: LoadOp::Clear(color),
        }
    }

    /// A pass that keeps the current content of `target`.
    pub fn load(label: &'a str, target: RenderTarget) -> Self {
        Self {
            label: Some(Cow::Borrowed(label)),
            target,
            load: LoadOp::Load,
        }
    }

    /// The label, or `"unnamed"`.
    pub fn label_or_default(&self) -> &str {
        self.label.as_deref().unwrap_or("unnamed")
    }
}
