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

//! Vertex generation for quads and light fans.

use umbra_core::math::{Extent2D, LinearRgba, Rect, Vec2, TAU};
use umbra_core::renderer::{LightCone, Vertex2D};

/// A quad as a 4-vertex triangle strip in the order top-left, top-right,
/// bottom-left, bottom-right.
pub fn quad(rect: Rect, uv: Rect, color: LinearRgba) -> [Vertex2D; 4] {
    [
        Vertex2D::new(rect.min, uv.min, color),
        Vertex2D::new(Vec2::new(rect.max.x, rect.min.y), Vec2::new(uv.max.x, uv.min.y), color),
        Vertex2D::new(Vec2::new(rect.min.x, rect.max.y), Vec2::new(uv.min.x, uv.max.y), color),
        Vertex2D::new(rect.max, uv.max, color),
    ]
}

/// The texture coordinates of the top-left `content` pixels of a square
/// texture of side `side`.
pub fn content_uv(content: Extent2D, side: u32) -> Rect {
    let side = side.max(1) as f32;
    Rect::new(
        Vec2::ZERO,
        Vec2::new(content.width as f32 / side, content.height as f32 / side),
    )
}

/// The pixel rectangle of `content`.
pub fn content_rect(content: Extent2D) -> Rect {
    Rect::new(
        Vec2::ZERO,
        Vec2::new(content.width as f32, content.height as f32),
    )
}

/// A quad covering `content` pixels and sampling the same pixels of a
/// square texture of side `side`.
pub fn content_quad(content: Extent2D, side: u32, color: LinearRgba) -> [Vertex2D; 4] {
    quad(content_rect(content), content_uv(content, side), color)
}

/// A radial light shape as a triangle list.
///
/// The center vertex carries `inner`, the rim `outer`; interpolation gives a
/// linear falloff. A cone restricts the fan to `direction ± half_angle`.
pub fn light_fan(
    center: Vec2,
    radius: f32,
    inner: LinearRgba,
    outer: LinearRgba,
    segments: u32,
    cone: Option<LightCone>,
) -> Vec<Vertex2D> {
    let segments = segments.max(3);
    let (start, sweep) = match cone {
        Some(cone) => {
            let half = cone.half_angle.clamp(0.0, TAU * 0.5);
            (cone.direction - half, half * 2.0)
        }
        None => (0.0, TAU),
    };
    if sweep <= 0.0 || radius <= 0.0 {
        return Vec::new();
    }

    let rim = |i: u32| {
        let angle = if i == segments && cone.is_none() {
            start
        } else {
            start + sweep * i as f32 / segments as f32
        };
        Vertex2D::new(center + Vec2::from_angle(angle) * radius, Vec2::ZERO, outer)
    };
    let hub = Vertex2D::new(center, Vec2::ZERO, inner);

    let mut vertices = Vec::with_capacity(segments as usize * 3);
    let mut previous = rim(0);
    for i in 1..=segments {
        let next = rim(i);
        vertices.extend_from_slice(&[hub, previous, next]);
        previous = next;
    }
    vertices
}
