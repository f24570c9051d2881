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

//! Five-tap cross blur through a ping-pong pair.

use super::frame::PassRecorder;
use super::geometry::{content_rect, content_uv, quad};
use super::swap_pool::PingPong;
use umbra_core::math::{Affine2, Extent2D, LinearRgba, Vec2};
use umbra_core::renderer::{BlendMode, FilterMode, PrimitiveTopology, RenderError};

/// Weight of each of the five taps. The taps sum to one.
pub const BLUR_TAP_WEIGHT: f32 = 0.2;

/// Clear color of a blur target: black, opaque.
pub const BLUR_CLEAR: LinearRgba = LinearRgba::new(0.0, 0.0, 0.0, 1.0);

/// Offsets of the cross-shaped kernel, in pixels.
pub fn blur_taps(size: f32) -> [Vec2; 5] {
    [
        Vec2::ZERO,
        Vec2::new(size, 0.0),
        Vec2::new(-size, 0.0),
        Vec2::new(0.0, size),
        Vec2::new(0.0, -size),
    ]
}

/// Runs `passes` blur passes over the `content` pixels of `pair`.
///
/// Each pass renders the current buffer five times, shifted by the taps,
/// into the cleared scratch buffer, then swaps.
pub(crate) fn blur(
    rec: &mut PassRecorder<'_>,
    pair: &mut PingPong,
    passes: u32,
    size: f32,
    content: Extent2D,
) -> Result<(), RenderError> {
    let side = pair.current().side();
    let uv = content_uv(content, side);
    let rect = content_rect(content);
    let color = LinearRgba::WHITE.with_alpha(BLUR_TAP_WEIGHT);

    for _ in 0..passes {
        {
            let mut pass = rec.begin("blur", pair.other().id(), Some(BLUR_CLEAR))?;
            pass.set_blend_mode(BlendMode::Additive);
            pass.set_texture(Some(pair.current().id()), FilterMode::Linear);
            pass.set_color(color);
            let vertices = quad(rect, uv, LinearRgba::WHITE);
            for tap in blur_taps(size) {
                pass.set_transform(Affine2::from_translation(tap));
                pass.draw(&vertices, PrimitiveTopology::TriangleStrip)?;
            }
        }
        pair.swap();
    }
    Ok(())
}
