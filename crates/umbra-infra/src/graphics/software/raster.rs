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

//! Scanline-free half-space rasterizer used by the software device.
//!
//! Pixel centers sit at `(x + 0.5, y + 0.5)`. A pixel is covered when its
//! center is strictly inside the triangle, or exactly on a top or left edge,
//! so triangles sharing an edge never touch a pixel twice. This matters for
//! additive light fans, which would otherwise double their seams.

use umbra_core::math::{Affine2, Extent2D, LinearRgba, Vec2};
use umbra_core::renderer::{BlendMode, FilterMode, PrimitiveTopology, Vertex2D};

/// A CPU image of linear RGBA texels, row-major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TexelImage {
    /// Size in texels.
    pub extent: Extent2D,
    /// Row-major texels.
    pub texels: Vec<LinearRgba>,
}

impl TexelImage {
    /// Creates an image filled with `fill`.
    pub fn new(extent: Extent2D, fill: LinearRgba) -> Self {
        Self {
            extent,
            texels: vec![fill; extent.area()],
        }
    }

    /// Overwrites every texel with `color`.
    pub fn fill(&mut self, color: LinearRgba) {
        self.texels.iter_mut().for_each(|t| *t = color);
    }

    #[inline]
    fn texel_clamped(&self, x: i64, y: i64) -> LinearRgba {
        let w = i64::from(self.extent.width);
        let h = i64::from(self.extent.height);
        let x = x.clamp(0, w - 1) as usize;
        let y = y.clamp(0, h - 1) as usize;
        self.texels[y * self.extent.width as usize + x]
    }

    /// Samples at normalized coordinates with clamp-to-edge addressing.
    pub fn sample(&self, uv: Vec2, filter: FilterMode) -> LinearRgba {
        if self.extent.is_empty() {
            return LinearRgba::TRANSPARENT;
        }
        let x = uv.x * self.extent.width as f32;
        let y = uv.y * self.extent.height as f32;
        match filter {
            FilterMode::Nearest => self.texel_clamped(x.floor() as i64, y.floor() as i64),
            FilterMode::Linear => {
                let x = x - 0.5;
                let y = y - 0.5;
                let x0 = x.floor();
                let y0 = y.floor();
                let fx = x - x0;
                let fy = y - y0;
                let (x0, y0) = (x0 as i64, y0 as i64);
                let top = LinearRgba::lerp(
                    self.texel_clamped(x0, y0),
                    self.texel_clamped(x0 + 1, y0),
                    fx,
                );
                let bottom = LinearRgba::lerp(
                    self.texel_clamped(x0, y0 + 1),
                    self.texel_clamped(x0 + 1, y0 + 1),
                    fx,
                );
                LinearRgba::lerp(top, bottom, fy)
            }
        }
    }
}

/// Fixed-function state applied to a draw.
#[derive(Debug, Clone, Copy)]
pub struct RasterState {
    /// Blend equation.
    pub blend: BlendMode,
    /// Sampling filter for the bound texture.
    pub filter: FilterMode,
    /// Vertex position to target pixel transform.
    pub transform: Affine2,
    /// Color multiplied into every fragment.
    pub color: LinearRgba,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            blend: BlendMode::Alpha,
            filter: FilterMode::Linear,
            transform: Affine2::IDENTITY,
            color: LinearRgba::WHITE,
        }
    }
}

/// Combines a fragment with the target pixel.
#[inline]
pub fn blend(dst: LinearRgba, src: LinearRgba, mode: BlendMode) -> LinearRgba {
    let a = src.a;
    match mode {
        BlendMode::Replace => src,
        BlendMode::Alpha => LinearRgba::new(
            src.r * a + dst.r * (1.0 - a),
            src.g * a + dst.g * (1.0 - a),
            src.b * a + dst.b * (1.0 - a),
            a + dst.a * (1.0 - a),
        ),
        BlendMode::Additive => LinearRgba::new(
            dst.r + src.r * a,
            dst.g + src.g * a,
            dst.b + src.b * a,
            dst.a,
        ),
        BlendMode::Multiply => LinearRgba::new(
            dst.r * (src.r * a + (1.0 - a)),
            dst.g * (src.g * a + (1.0 - a)),
            dst.b * (src.b * a + (1.0 - a)),
            dst.a,
        ),
    }
}

/// Splits a vertex stream into triangles.
pub fn triangles(
    vertices: &[Vertex2D],
    topology: PrimitiveTopology,
) -> impl Iterator<Item = [Vertex2D; 3]> + '_ {
    let (step, count) = match topology {
        PrimitiveTopology::TriangleList => (3, vertices.len() / 3),
        PrimitiveTopology::TriangleStrip => (1, vertices.len().saturating_sub(2)),
    };
    (0..count).map(move |i| {
        let base = i * step;
        [vertices[base], vertices[base + 1], vertices[base + 2]]
    })
}

#[inline]
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

#[inline]
fn is_top_left(a: Vec2, b: Vec2) -> bool {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    (dy == 0.0 && dx > 0.0) || dy < 0.0
}

#[inline]
fn covers(w: f32, top_left: bool) -> bool {
    w > 0.0 || (w == 0.0 && top_left)
}

/// Rasterizes a vertex stream into `target`.
///
/// `texture` is `None` for untextured draws, which sample opaque white.
/// Returns the number of fragments written.
pub fn draw_vertices(
    target: &mut TexelImage,
    vertices: &[Vertex2D],
    topology: PrimitiveTopology,
    state: &RasterState,
    texture: Option<&TexelImage>,
) -> usize {
    triangles(vertices, topology)
        .map(|tri| draw_triangle(target, tri, state, texture))
        .sum()
}

fn draw_triangle(
    target: &mut TexelImage,
    tri: [Vertex2D; 3],
    state: &RasterState,
    texture: Option<&TexelImage>,
) -> usize {
    let mut p = tri.map(|v| state.transform.transform_point(v.position()));
    let mut attrs = tri;
    let area = edge(p[0], p[1], p[2]);
    if area == 0.0 || !area.is_finite() {
        return 0;
    }
    if area < 0.0 {
        p.swap(1, 2);
        attrs.swap(1, 2);
    }
    let area = area.abs();

    let width = target.extent.width as f32;
    let height = target.extent.height as f32;
    let min_x = p.iter().fold(f32::MAX, |m, v| m.min(v.x)).floor().max(0.0);
    let min_y = p.iter().fold(f32::MAX, |m, v| m.min(v.y)).floor().max(0.0);
    let max_x = p.iter().fold(f32::MIN, |m, v| m.max(v.x)).ceil().min(width);
    let max_y = p.iter().fold(f32::MIN, |m, v| m.max(v.y)).ceil().min(height);
    if min_x >= max_x || min_y >= max_y {
        return 0;
    }

    let tl = [
        is_top_left(p[1], p[2]),
        is_top_left(p[2], p[0]),
        is_top_left(p[0], p[1]),
    ];
    let row = target.extent.width as usize;
    let flat_color = (attrs[0].color == attrs[1].color && attrs[1].color == attrs[2].color)
        .then(|| attrs[0].rgba());
    let mut written = 0;

    for y in (min_y as u32)..(max_y as u32) {
        for x in (min_x as u32)..(max_x as u32) {
            let c = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w0 = edge(p[1], p[2], c);
            let w1 = edge(p[2], p[0], c);
            let w2 = edge(p[0], p[1], c);
            if !(covers(w0, tl[0]) && covers(w1, tl[1]) && covers(w2, tl[2])) {
                continue;
            }
            let (b0, b1, b2) = (w0 / area, w1 / area, w2 / area);

            let uv = attrs[0].tex_coords() * b0
                + attrs[1].tex_coords() * b1
                + attrs[2].tex_coords() * b2;
            let vc = flat_color.unwrap_or_else(|| {
                attrs[0].rgba() * b0 + attrs[1].rgba() * b1 + attrs[2].rgba() * b2
            });
            let texel = texture.map_or(LinearRgba::WHITE, |t| t.sample(uv, state.filter));
            let src = texel * vc * state.color;

            let idx = y as usize * row + x as usize;
            target.texels[idx] = blend(target.texels[idx], src, state.blend);
            written += 1;
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(min: Vec2, max: Vec2, color: LinearRgba) -> [Vertex2D; 6] {
        let v = |x: f32, y: f32, u: f32, w: f32| Vertex2D::new(Vec2::new(x, y), Vec2::new(u, w), color);
        [
            v(min.x, min.y, 0.0, 0.0),
            v(max.x, min.y, 1.0, 0.0),
            v(min.x, max.y, 0.0, 1.0),
            v(max.x, min.y, 1.0, 0.0),
            v(max.x, max.y, 1.0, 1.0),
            v(min.x, max.y, 0.0, 1.0),
        ]
    }

    #[test]
    fn shared_edges_are_covered_once() {
        let mut target = TexelImage::new(Extent2D::square(8), LinearRgba::BLACK);
        let state = RasterState {
            blend: BlendMode::Additive,
            ..Default::default()
        };
        let verts = quad(Vec2::ZERO, Vec2::splat(8.0), LinearRgba::gray(0.25));
        let written = draw_vertices(&mut target, &verts, PrimitiveTopology::TriangleList, &state, None);
        assert_eq!(written, 64);
        assert!(target.texels.iter().all(|t| t.r == 0.25));
    }

    #[test]
    fn degenerate_strip_triangles_draw_nothing() {
        let mut target = TexelImage::new(Extent2D::square(4), LinearRgba::BLACK);
        let a = Vertex2D::new(Vec2::ZERO, Vec2::ZERO, LinearRgba::WHITE);
        let b = Vertex2D::new(Vec2::new(4.0, 0.0), Vec2::ZERO, LinearRgba::WHITE);
        let verts = [a, a, b, b];
        let written = draw_vertices(
            &mut target,
            &verts,
            PrimitiveTopology::TriangleStrip,
            &RasterState::default(),
            None,
        );
        assert_eq!(written, 0);
    }

    #[test]
    fn zero_alpha_additive_and_multiply_are_exact_no_ops() {
        let dst = LinearRgba::new(0.3, 0.7, 0.11, 1.0);
        let src = LinearRgba::new(5.0, 0.2, 0.9, 0.0);
        assert_eq!(blend(dst, src, BlendMode::Additive), dst);
        assert_eq!(blend(dst, src, BlendMode::Multiply), dst);
    }

    #[test]
    fn linear_sampling_at_texel_centers_is_exact() {
        let mut img = TexelImage::new(Extent2D::square(4), LinearRgba::BLACK);
        img.texels[5] = LinearRgba::RED;
        let uv = Vec2::new(1.5 / 4.0, 1.5 / 4.0);
        assert_eq!(img.sample(uv, FilterMode::Linear), LinearRgba::RED);
        assert_eq!(img.sample(uv, FilterMode::Nearest), LinearRgba::RED);
    }

    #[test]
    fn textured_quad_copies_texels() {
        let mut src = TexelImage::new(Extent2D::square(2), LinearRgba::BLACK);
        src.texels[3] = LinearRgba::BLUE;
        let mut target = TexelImage::new(Extent2D::square(2), LinearRgba::WHITE);
        let state = RasterState {
            blend: BlendMode::Replace,
            filter: FilterMode::Nearest,
            ..Default::default()
        };
        let verts = quad(Vec2::ZERO, Vec2::splat(2.0), LinearRgba::WHITE);
        draw_vertices(&mut target, &verts, PrimitiveTopology::TriangleList, &state, Some(&src));
        assert_eq!(target.texels, src.texels);
    }
}
