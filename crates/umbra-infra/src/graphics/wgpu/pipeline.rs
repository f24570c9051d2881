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

//! The single shader program behind every draw, and one pipeline per
//! blend mode and topology.

use std::collections::HashMap;
use umbra_core::math::{Affine2, Extent2D, LinearRgba};
use umbra_core::renderer::{BlendMode, FilterMode, PrimitiveTopology, Vertex2D};

/// Color format of every texture and of the surface. Unclamped, so light
/// can accumulate above 1.
pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Bytes per texel of [`TEXTURE_FORMAT`].
pub const BYTES_PER_TEXEL: u32 = 16;

const SPRITE2D_WGSL: &str = include_str!("sprite2d.wgsl");

const BLEND_MODES: [BlendMode; 4] = [
    BlendMode::Replace,
    BlendMode::Alpha,
    BlendMode::Additive,
    BlendMode::Multiply,
];

const TOPOLOGIES: [PrimitiveTopology; 2] =
    [PrimitiveTopology::TriangleList, PrimitiveTopology::TriangleStrip];

/// Per-draw uniforms, laid out as `DrawUniforms` in `sprite2d.wgsl`.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct DrawUniforms {
    row_x: [f32; 4],
    row_y: [f32; 4],
    color: [f32; 4],
    target_size: [f32; 2],
    multiply: f32,
    _pad: f32,
}

impl DrawUniforms {
    /// Uniforms of a draw through `transform` into a target of `extent`.
    pub fn new(transform: Affine2, color: LinearRgba, extent: Extent2D, blend: BlendMode) -> Self {
        let Affine2 {
            x_axis,
            y_axis,
            translation,
        } = transform;
        Self {
            row_x: [x_axis.x, y_axis.x, translation.x, 0.0],
            row_y: [x_axis.y, y_axis.y, translation.y, 0.0],
            color: [color.r, color.g, color.b, color.a],
            target_size: [extent.width.max(1) as f32, extent.height.max(1) as f32],
            multiply: if blend == BlendMode::Multiply { 1.0 } else { 0.0 },
            _pad: 0.0,
        }
    }
}

/// Blend state realizing `mode` with the fragment shader output.
///
/// Multiply relies on the shader writing `mix(1, rgb, a)`, which the
/// hardware then multiplies into the target.
pub fn blend_state(mode: BlendMode) -> Option<wgpu::BlendState> {
    use wgpu::{BlendComponent, BlendFactor, BlendOperation};
    let keep_alpha = BlendComponent {
        src_factor: BlendFactor::Zero,
        dst_factor: BlendFactor::One,
        operation: BlendOperation::Add,
    };
    match mode {
        BlendMode::Replace => None,
        BlendMode::Alpha => Some(wgpu::BlendState {
            color: BlendComponent {
                src_factor: BlendFactor::SrcAlpha,
                dst_factor: BlendFactor::OneMinusSrcAlpha,
                operation: BlendOperation::Add,
            },
            alpha: BlendComponent {
                src_factor: BlendFactor::One,
                dst_factor: BlendFactor::OneMinusSrcAlpha,
                operation: BlendOperation::Add,
            },
        }),
        BlendMode::Additive => Some(wgpu::BlendState {
            color: BlendComponent {
                src_factor: BlendFactor::SrcAlpha,
                dst_factor: BlendFactor::One,
                operation: BlendOperation::Add,
            },
            alpha: keep_alpha,
        }),
        BlendMode::Multiply => Some(wgpu::BlendState {
            color: BlendComponent {
                src_factor: BlendFactor::Zero,
                dst_factor: BlendFactor::Src,
                operation: BlendOperation::Add,
            },
            alpha: keep_alpha,
        }),
    }
}

fn topology(topology: PrimitiveTopology) -> wgpu::PrimitiveTopology {
    match topology {
        PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

/// Compiled pipelines, their bind group layout and the two samplers.
#[derive(Debug)]
pub struct SpritePipelines {
    /// Layout of group 0: uniforms (dynamic offset), texture, sampler.
    pub bind_group_layout: wgpu::BindGroupLayout,
    pipelines: HashMap<(BlendMode, PrimitiveTopology), wgpu::RenderPipeline>,
    nearest: wgpu::Sampler,
    linear: wgpu::Sampler,
}

impl SpritePipelines {
    /// Compiles the shader and every pipeline variant.
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sprite2d-shader"),
            source: wgpu::ShaderSource::Wgsl(SPRITE2D_WGSL.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sprite2d-bind-group-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<DrawUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sprite2d-pipeline-layout"),
            bind_group_layouts: &[Some(&bind_group_layout)],
            immediate_size: 0,
        });

        let attributes = wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Float32x4];
        let mut pipelines = HashMap::new();
        for mode in BLEND_MODES {
            for topo in TOPOLOGIES {
                let label = format!("sprite2d-{mode:?}-{topo:?}");
                let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(label.as_str()),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &shader,
                        entry_point: Some("vs_main"),
                        buffers: &[wgpu::VertexBufferLayout {
                            array_stride: std::mem::size_of::<Vertex2D>() as wgpu::BufferAddress,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &attributes,
                        }],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &shader,
                        entry_point: Some("fs_main"),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: TEXTURE_FORMAT,
                            blend: blend_state(mode),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: topology(topo),
                        strip_index_format: None,
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode: None,
                        unclipped_depth: false,
                        polygon_mode: wgpu::PolygonMode::Fill,
                        conservative: false,
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    multiview_mask: None,
                    cache: None,
                });
                pipelines.insert((mode, topo), pipeline);
            }
        }
        log::debug!("WgpuDevice: compiled {} sprite pipelines", pipelines.len());

        let sampler = |label: &str, filter: wgpu::FilterMode| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: filter,
                ..Default::default()
            })
        };

        Self {
            bind_group_layout,
            pipelines,
            nearest: sampler("sprite2d-nearest", wgpu::FilterMode::Nearest),
            linear: sampler("sprite2d-linear", wgpu::FilterMode::Linear),
        }
    }

    /// The pipeline for a blend mode and topology.
    pub fn get(&self, blend: BlendMode, topology: PrimitiveTopology) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(&(blend, topology))
    }

    /// The sampler for a filter mode.
    pub fn sampler(&self, filter: FilterMode) -> &wgpu::Sampler {
        match filter {
            FilterMode::Nearest => &self.nearest,
            FilterMode::Linear => &self.linear,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::math::Vec2;

    #[test]
    fn uniforms_match_the_shader_layout() {
        assert_eq!(std::mem::size_of::<DrawUniforms>(), 64);
    }

    #[test]
    fn uniform_rows_reproduce_the_transform() {
        let transform = Affine2::from_translation(Vec2::new(3.0, -2.0));
        let u = DrawUniforms::new(transform, LinearRgba::WHITE, Extent2D::new(8, 4), BlendMode::Alpha);
        let p = [5.0, 7.0, 1.0];
        let dot = |row: [f32; 4]| row[0] * p[0] + row[1] * p[1] + row[2] * p[2];
        assert_eq!(
            Vec2::new(dot(u.row_x), dot(u.row_y)),
            transform.transform_point(Vec2::new(5.0, 7.0))
        );
        assert_eq!(u.target_size, [8.0, 4.0]);
        assert_eq!(u.multiply, 0.0);
    }

    #[test]
    fn additive_and_multiply_leave_alpha_untouched() {
        for mode in [BlendMode::Additive, BlendMode::Multiply] {
            let state = blend_state(mode).unwrap();
            assert_eq!(state.alpha.src_factor, wgpu::BlendFactor::Zero);
            assert_eq!(state.alpha.dst_factor, wgpu::BlendFactor::One);
        }
        assert!(blend_state(BlendMode::Replace).is_none());
    }
}
