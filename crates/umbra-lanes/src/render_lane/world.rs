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

//! Defines the `RenderWorld` of loose sprites and the `SceneList` that
//! combines renderables.
//!
//! Every renderable honors the pass in its [`PassContext`]: diffuse draws
//! colors, emissive draws glow (black for non-emissive things), occluder
//! passes draw occluders in black and nothing else.

use super::geometry::quad;
use umbra_core::math::{LinearRgba, Rect, Vec2};
use umbra_core::renderer::{
    FilterMode, PassContext, PrimitiveTopology, RenderError, RenderPass, RenderPassEncoder,
    SceneRenderable, TextureId,
};

/// A textured, axis-aligned rectangle in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sprite {
    /// Center in world space.
    pub position: Vec2,
    /// Size in world units.
    pub size: Vec2,
    /// Diffuse color, multiplied with the texture.
    pub color: LinearRgba,
    /// Texture, or `None` for a plain colored rectangle.
    pub texture: Option<TextureId>,
    /// Glow color in the emissive pass.
    pub emissive: Option<LinearRgba>,
    /// Whether the sprite blocks light and vision.
    pub occluder: bool,
    /// Depth relative to the occlusion plane.
    pub depth: i32,
    /// Color in the normals pass.
    pub normal_color: LinearRgba,
    /// Color in the specular pass.
    pub specular_color: LinearRgba,
}

impl Sprite {
    /// A plain colored sprite that neither glows nor occludes.
    pub fn new(position: Vec2, size: Vec2, color: LinearRgba) -> Self {
        Self {
            position,
            size,
            color,
            texture: None,
            emissive: None,
            occluder: false,
            depth: 0,
            normal_color: LinearRgba::FLAT_NORMAL,
            specular_color: LinearRgba::BLACK,
        }
    }

    /// Marks the sprite as a light occluder.
    #[must_use]
    pub fn occluding(mut self) -> Self {
        self.occluder = true;
        self
    }

    /// Makes the sprite glow.
    #[must_use]
    pub fn glowing(mut self, color: LinearRgba) -> Self {
        self.emissive = Some(color);
        self
    }

    /// Uses a texture.
    #[must_use]
    pub fn with_texture(mut self, texture: TextureId) -> Self {
        self.texture = Some(texture);
        self
    }

    /// World rectangle.
    pub fn bounds(&self) -> Rect {
        Rect::from_center_size(self.position, self.size)
    }

    /// Color for `ctx`, or `None` if the sprite is invisible in that pass.
    fn pass_color(&self, ctx: &PassContext) -> Option<LinearRgba> {
        let color = match ctx.pass {
            RenderPass::Diffuse => self.color,
            RenderPass::Emissive => self.emissive.unwrap_or(LinearRgba::BLACK),
            RenderPass::LightShadow | RenderPass::DirectionalShadow | RenderPass::Vision => {
                if !self.occluder || ctx.is_occluded_depth(self.depth) {
                    return None;
                }
                return Some(LinearRgba::BLACK);
            }
            RenderPass::Normals => self.normal_color,
            RenderPass::Specular => self.specular_color,
        };
        Some(color.with_alpha(color.a * ctx.alpha))
    }
}

/// The sprites drawn this frame.
#[derive(Debug, Default, Clone)]
pub struct RenderWorld {
    /// Sprites in draw order.
    pub sprites: Vec<Sprite>,
}

impl RenderWorld {
    /// Creates a new, empty `RenderWorld`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sprite.
    pub fn push(&mut self, sprite: Sprite) {
        self.sprites.push(sprite);
    }

    /// Clears all the data in the `RenderWorld`, preparing it for the next frame.
    pub fn clear(&mut self) {
        self.sprites.clear();
    }
}

impl SceneRenderable for RenderWorld {
    fn render(
        &self,
        ctx: &PassContext,
        encoder: &mut dyn RenderPassEncoder,
    ) -> Result<(), RenderError> {
        let full = Rect::new(Vec2::ZERO, Vec2::ONE);
        for sprite in &self.sprites {
            let bounds = sprite.bounds();
            if !bounds.intersects(&ctx.visible_bounds) {
                continue;
            }
            let Some(color) = sprite.pass_color(ctx) else {
                continue;
            };
            encoder.set_texture(sprite.texture, FilterMode::Linear);
            encoder.draw(&quad(bounds, full, color), PrimitiveTopology::TriangleStrip)?;
        }
        encoder.set_texture(None, FilterMode::Linear);
        Ok(())
    }
}

/// Renders several renderables in order.
#[derive(Default)]
pub struct SceneList<'a> {
    items: Vec<&'a dyn SceneRenderable>,
}

impl<'a> SceneList<'a> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Appends a renderable.
    #[must_use]
    pub fn with(mut self, item: &'a dyn SceneRenderable) -> Self {
        self.items.push(item);
        self
    }

    /// Appends a renderable.
    pub fn push(&mut self, item: &'a dyn SceneRenderable) {
        self.items.push(item);
    }
}

impl SceneRenderable for SceneList<'_> {
    fn render(
        &self,
        ctx: &PassContext,
        encoder: &mut dyn RenderPassEncoder,
    ) -> Result<(), RenderError> {
        self.items.iter().try_for_each(|item| item.render(ctx, encoder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::math::Affine2;

    #[test]
    fn occluder_passes_only_see_occluders() {
        let ctx = PassContext::new(RenderPass::LightShadow, Affine2::IDENTITY, Rect::default());
        let plain = Sprite::new(Vec2::ZERO, Vec2::ONE, LinearRgba::RED);
        let wall = plain.occluding();
        assert_eq!(plain.pass_color(&ctx), None);
        assert_eq!(wall.pass_color(&ctx), Some(LinearRgba::BLACK));

        let behind = Sprite { depth: -1, ..wall };
        assert_eq!(behind.pass_color(&ctx.with_occlusion_depth(Some(0))), None);
    }

    #[test]
    fn emissive_pass_blacks_out_non_glowing_sprites() {
        let ctx = PassContext::new(RenderPass::Emissive, Affine2::IDENTITY, Rect::default());
        let plain = Sprite::new(Vec2::ZERO, Vec2::ONE, LinearRgba::RED);
        assert_eq!(plain.pass_color(&ctx), Some(LinearRgba::BLACK));
        let lamp = plain.glowing(LinearRgba::GREEN);
        assert_eq!(lamp.pass_color(&ctx.with_alpha(0.5)), Some(LinearRgba::GREEN.with_alpha(0.5)));
    }
}
