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

use super::device::{lock, WgpuDevice};
use super::pipeline::DrawUniforms;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use umbra_core::math::{Affine2, Extent2D, LinearRgba};
use umbra_core::renderer::{
    BlendMode, BufferId, FilterMode, LoadOp, PrimitiveTopology, RenderError,
    RenderPassEncoder, ResourceError, TextureId, Vertex2D,
};
use wgpu::util::DeviceExt;

#[derive(Debug)]
enum VertexSource {
    /// A range of the pass's own immediate vertices.
    Immediate,
    /// A range of a device buffer, pinned to the storage current at record time.
    Buffer(Arc<wgpu::Buffer>),
}

#[derive(Debug)]
struct RecordedDraw {
    blend: BlendMode,
    topology: PrimitiveTopology,
    texture: Option<(TextureId, Arc<wgpu::TextureView>)>,
    filter: FilterMode,
    uniforms: DrawUniforms,
    source: VertexSource,
    range: Range<u32>,
}

/// A render pass on the wgpu device.
///
/// Draws are recorded with the state current at call time. The whole pass is
/// encoded and submitted when the encoder is dropped, so passes reach the
/// queue in the order they end.
pub(super) struct WgpuPassEncoder<'a> {
    device: &'a WgpuDevice,
    label: String,
    target_id: Option<TextureId>,
    target_view: Arc<wgpu::TextureView>,
    extent: Extent2D,
    load: LoadOp<LinearRgba>,

    blend: BlendMode,
    texture: Option<TextureId>,
    filter: FilterMode,
    transform: Affine2,
    color: LinearRgba,

    vertices: Vec<Vertex2D>,
    draws: Vec<RecordedDraw>,
}

impl<'a> WgpuPassEncoder<'a> {
    pub(super) fn new(
        device: &'a WgpuDevice,
        label: String,
        target_id: Option<TextureId>,
        target_view: Arc<wgpu::TextureView>,
        extent: Extent2D,
        load: LoadOp<LinearRgba>,
    ) -> Self {
        Self {
            device,
            label,
            target_id,
            target_view,
            extent,
            load,
            blend: BlendMode::default(),
            texture: None,
            filter: FilterMode::default(),
            transform: Affine2::IDENTITY,
            color: LinearRgba::WHITE,
            vertices: Vec::new(),
            draws: Vec::new(),
        }
    }

    fn record(&mut self, source: VertexSource, range: Range<u32>, topology: PrimitiveTopology) -> Result<(), RenderError> {
        self.device.check_lost()?;
        if let (Some(bound), Some(target)) = (self.texture, self.target_id) {
            if bound == target {
                return Err(RenderError::RenderingFailed(format!(
                    "texture {bound:?} is sampled while being the target of pass '{}'",
                    self.label
                )));
            }
        }
        let texture = match self.texture {
            Some(id) => {
                let textures = lock(&self.device.internal.textures, "textures")?;
                let entry = textures.get(&id).ok_or(ResourceError::NotFound)?;
                Some((id, Arc::clone(&entry.view)))
            }
            None => None,
        };
        self.draws.push(RecordedDraw {
            blend: self.blend,
            topology,
            texture,
            filter: self.filter,
            uniforms: DrawUniforms::new(self.transform, self.color, self.extent, self.blend),
            source,
            range,
        });
        Ok(())
    }

    /// Encodes every recorded draw into one render pass and submits it.
    fn submit(&mut self) -> Result<(), ResourceError> {
        self.device.check_lost()?;
        let internal = &self.device.internal;
        let device = &internal.context.device;
        let pipelines = &internal.pipelines;

        let immediate = (!self.vertices.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("immediate-vertices"),
                contents: bytemuck::cast_slice(&self.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });

        let stride = internal.uniform_stride as usize;
        let uniform_size = std::mem::size_of::<DrawUniforms>();
        let mut uniform_bytes = vec![0u8; stride * self.draws.len().max(1)];
        for (i, draw) in self.draws.iter().enumerate() {
            uniform_bytes[i * stride..i * stride + uniform_size]
                .copy_from_slice(bytemuck::bytes_of(&draw.uniforms));
        }
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("draw-uniforms"),
            contents: &uniform_bytes,
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let mut bind_groups: HashMap<(Option<TextureId>, FilterMode), wgpu::BindGroup> = HashMap::new();
        for draw in &self.draws {
            let key = (draw.texture.as_ref().map(|(id, _)| *id), draw.filter);
            bind_groups.entry(key).or_insert_with(|| {
                let view = draw
                    .texture
                    .as_ref()
                    .map_or(internal.white.view.as_ref(), |(_, view)| view.as_ref());
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("sprite2d-bind-group"),
                    layout: &pipelines.bind_group_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                                buffer: &uniforms,
                                offset: 0,
                                size: wgpu::BufferSize::new(uniform_size as u64),
                            }),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::Sampler(pipelines.sampler(draw.filter)),
                        },
                    ],
                })
            });
        }

        let load = match self.load {
            LoadOp::Load => wgpu::LoadOp::Load,
            LoadOp::Clear(c) => wgpu::LoadOp::Clear(wgpu::Color {
                r: f64::from(c.r),
                g: f64::from(c.g),
                b: f64::from(c.b),
                a: f64::from(c.a),
            }),
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(self.label.as_str()),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(self.label.as_str()),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            for (i, draw) in self.draws.iter().enumerate() {
                let pipeline = pipelines.get(draw.blend, draw.topology).ok_or_else(|| {
                    ResourceError::BackendError(format!(
                        "WgpuDevice: no pipeline for {:?}/{:?}",
                        draw.blend, draw.topology
                    ))
                })?;
                let key = (draw.texture.as_ref().map(|(id, _)| *id), draw.filter);
                let Some(bind_group) = bind_groups.get(&key) else {
                    continue;
                };
                let buffer = match (&draw.source, &immediate) {
                    (VertexSource::Immediate, Some(buffer)) => buffer,
                    (VertexSource::Buffer(buffer), _) => buffer.as_ref(),
                    (VertexSource::Immediate, None) => continue,
                };
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, bind_group, &[(i * stride) as u32]);
                pass.set_vertex_buffer(0, buffer.slice(..));
                pass.draw(draw.range.clone(), 0..1);
            }
        }
        internal.context.queue.submit(std::iter::once(encoder.finish()));
        log::trace!(
            "WgpuDevice: submitted pass '{}' with {} draws",
            self.label,
            self.draws.len()
        );
        Ok(())
    }
}

impl RenderPassEncoder for WgpuPassEncoder<'_> {
    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.blend = mode;
    }

    fn set_texture(&mut self, texture: Option<TextureId>, filter: FilterMode) {
        self.texture = texture;
        self.filter = filter;
    }

    fn set_transform(&mut self, transform: Affine2) {
        self.transform = transform;
    }

    fn set_color(&mut self, color: LinearRgba) {
        self.color = color;
    }

    fn draw(
        &mut self,
        vertices: &[Vertex2D],
        topology: PrimitiveTopology,
    ) -> Result<(), RenderError> {
        let start = self.vertices.len() as u32;
        self.record(VertexSource::Immediate, start..start + vertices.len() as u32, topology)?;
        self.vertices.extend_from_slice(vertices);
        Ok(())
    }

    fn draw_buffer(
        &mut self,
        buffer: BufferId,
        range: Range<u32>,
        topology: PrimitiveTopology,
    ) -> Result<(), RenderError> {
        let storage = {
            let buffers = lock(&self.device.internal.buffers, "buffers")?;
            let entry = buffers.get(&buffer).ok_or(ResourceError::NotFound)?;
            if range.start > range.end || range.end > entry.capacity {
                return Err(ResourceError::OutOfBounds.into());
            }
            Arc::clone(&entry.buffer)
        };
        self.record(VertexSource::Buffer(storage), range, topology)
    }

    fn target_extent(&self) -> Extent2D {
        self.extent
    }
}

impl Drop for WgpuPassEncoder<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.submit() {
            log::error!("WgpuDevice: failed to submit pass '{}': {e}", self.label);
        }
    }
}
