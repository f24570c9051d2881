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

use super::command::WgpuPassEncoder;
use super::context::WgpuGraphicsContext;
use super::pipeline::{SpritePipelines, DrawUniforms, BYTES_PER_TEXEL, TEXTURE_FORMAT};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use umbra_core::math::{Extent2D, LinearRgba};
use umbra_core::renderer::{
    BufferDescriptor, BufferId, GraphicsBackendType, GraphicsDevice, RenderError,
    RenderPassDescriptor, RenderPassEncoder, RenderTarget, RendererAdapterInfo, ResourceError,
    TextureDescriptor, TextureId, TextureUsage, Vertex2D, WriteMode,
};

const VERTEX_SIZE: u64 = std::mem::size_of::<Vertex2D>() as u64;

#[derive(Debug)]
pub(super) struct WgpuTextureEntry {
    pub(super) texture: Arc<wgpu::Texture>,
    pub(super) view: Arc<wgpu::TextureView>,
    pub(super) extent: Extent2D,
    pub(super) label: String,
    pub(super) usage: TextureUsage,
}

#[derive(Debug)]
pub(super) struct WgpuBufferEntry {
    pub(super) buffer: Arc<wgpu::Buffer>,
    pub(super) capacity: u32,
    pub(super) label: String,
}

#[derive(Debug)]
pub(super) struct WgpuDeviceInternal {
    pub(super) context: WgpuGraphicsContext,
    pub(super) pipelines: SpritePipelines,

    /// Offscreen texture standing in for the presentable surface.
    pub(super) surface: WgpuTextureEntry,
    /// 1x1 opaque white, bound when a draw has no texture.
    pub(super) white: WgpuTextureEntry,

    pub(super) textures: Mutex<HashMap<TextureId, WgpuTextureEntry>>,
    pub(super) buffers: Mutex<HashMap<BufferId, WgpuBufferEntry>>,

    next_texture_id: AtomicUsize,
    next_buffer_id: AtomicUsize,

    /// Distance between two draws' uniforms in the per-pass uniform buffer.
    pub(super) uniform_stride: u32,
}

/// A clonable, thread-safe handle to a headless GPU device.
///
/// Every texture is an `Rgba32Float` texture usable as render target,
/// sampled texture and copy source, so any of them can be read back. The
/// surface is an offscreen texture of the same format. Passes record their
/// draws and are submitted in one command buffer when the encoder is
/// dropped.
#[derive(Clone, Debug)]
pub struct WgpuDevice {
    pub(super) internal: Arc<WgpuDeviceInternal>,
}

pub(super) fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, ResourceError> {
    mutex
        .lock()
        .map_err(|_| ResourceError::BackendError(format!("WgpuDevice: {what} mutex poisoned")))
}

fn extent3d(extent: Extent2D) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: extent.width,
        height: extent.height,
        depth_or_array_layers: 1,
    }
}

fn texel_copy(texture: &wgpu::Texture) -> wgpu::TexelCopyTextureInfo<'_> {
    wgpu::TexelCopyTextureInfo {
        texture,
        mip_level: 0,
        origin: wgpu::Origin3d::ZERO,
        aspect: wgpu::TextureAspect::All,
    }
}

fn allocate_texture(
    device: &wgpu::Device,
    label: &str,
    extent: Extent2D,
    usage: TextureUsage,
) -> WgpuTextureEntry {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: extent3d(extent),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    WgpuTextureEntry {
        texture: Arc::new(texture),
        view: Arc::new(view),
        extent,
        label: label.to_string(),
        usage,
    }
}

fn allocate_vertex_buffer(device: &wgpu::Device, label: &str, capacity: u32) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: u64::from(capacity.max(1)) * VERTEX_SIZE,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl WgpuDevice {
    /// Opens the default adapter without a window and creates an offscreen
    /// surface of the given size.
    pub fn new_headless(surface: Extent2D) -> Result<Self, ResourceError> {
        let context = pollster::block_on(WgpuGraphicsContext::new_headless())?;
        Ok(Self::from_context(context, surface))
    }

    /// Wraps an already opened context.
    pub fn from_context(context: WgpuGraphicsContext, surface: Extent2D) -> Self {
        let surface_extent = Extent2D::new(surface.width.max(1), surface.height.max(1));
        let pipelines = SpritePipelines::new(&context.device);
        let surface = allocate_texture(
            &context.device,
            "surface",
            surface_extent,
            TextureUsage::RENDER_TARGET,
        );
        let white = allocate_texture(&context.device, "white", Extent2D::square(1), TextureUsage::SAMPLED);
        context.queue.write_texture(
            texel_copy(&white.texture),
            bytemuck::bytes_of(&LinearRgba::WHITE),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(BYTES_PER_TEXEL),
                rows_per_image: Some(1),
            },
            extent3d(white.extent),
        );

        let alignment = context.device_limits.min_uniform_buffer_offset_alignment.max(1);
        let uniform_size = std::mem::size_of::<DrawUniforms>() as u32;
        let uniform_stride = uniform_size.div_ceil(alignment) * alignment;

        log::info!(
            "WgpuDevice: created on \"{}\" with a {}x{} surface",
            context.adapter_name,
            surface_extent.width,
            surface_extent.height
        );
        Self {
            internal: Arc::new(WgpuDeviceInternal {
                context,
                pipelines,
                surface,
                white,
                textures: Mutex::new(HashMap::new()),
                buffers: Mutex::new(HashMap::new()),
                next_texture_id: AtomicUsize::new(0),
                next_buffer_id: AtomicUsize::new(0),
                uniform_stride,
            }),
        }
    }

    // --- ID Generation Helpers ---

    fn generate_texture_id(&self) -> TextureId {
        TextureId(self.internal.next_texture_id.fetch_add(1, Ordering::Relaxed))
    }

    fn generate_buffer_id(&self) -> BufferId {
        BufferId(self.internal.next_buffer_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(super) fn check_lost(&self) -> Result<(), ResourceError> {
        if self.internal.context.is_lost() {
            Err(ResourceError::DeviceLost)
        } else {
            Ok(())
        }
    }

    fn max_texture_side(&self) -> u32 {
        self.internal.context.device_limits.max_texture_dimension_2d
    }

    /// Copies a texture into a staging buffer and blocks until it is mapped.
    fn read_back(&self, texture: &wgpu::Texture, extent: Extent2D) -> Result<Vec<LinearRgba>, ResourceError> {
        let ctx = &self.internal.context;
        let unpadded = extent.width * BYTES_PER_TEXEL;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = unpadded.div_ceil(align) * align;

        let staging = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback-staging"),
            size: u64::from(padded) * u64::from(extent.height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback-encoder"),
            });
        encoder.copy_texture_to_buffer(
            texel_copy(texture),
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(extent.height),
                },
            },
            extent3d(extent),
        );
        ctx.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        ctx.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map_err(|e| ResourceError::BackendError(format!("WgpuDevice: poll failed: {e}")))?;
        rx.recv()
            .map_err(|_| ResourceError::BackendError("WgpuDevice: readback callback dropped".into()))?
            .map_err(|e| ResourceError::BackendError(format!("WgpuDevice: readback map failed: {e}")))?;

        let texels = {
            let data = slice.get_mapped_range();
            let mut texels = Vec::with_capacity(extent.area());
            for row in data.chunks_exact(padded as usize) {
                texels.extend(bytemuck::pod_collect_to_vec::<u8, LinearRgba>(
                    &row[..unpadded as usize],
                ));
            }
            texels
        };
        staging.unmap();
        log::trace!("WgpuDevice: read back {} texels", texels.len());
        Ok(texels)
    }
}

impl GraphicsDevice for WgpuDevice {
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        self.check_lost()?;
        let label = descriptor.label.as_deref().unwrap_or("texture").to_string();
        let size = descriptor.size;
        if size.is_empty() || size.max_side() > self.max_texture_side() {
            return Err(ResourceError::AllocationFailed {
                label,
                bytes: descriptor.byte_size(),
            });
        }
        let id = self.generate_texture_id();
        let entry = allocate_texture(&self.internal.context.device, &label, size, descriptor.usage);
        log::trace!(
            "WgpuDevice: created texture '{}' {:?} ({}x{})",
            entry.label,
            id,
            size.width,
            size.height
        );
        lock(&self.internal.textures, "textures")?.insert(id, entry);
        Ok(id)
    }

    fn write_texture(&self, id: TextureId, texels: &[LinearRgba]) -> Result<(), ResourceError> {
        self.check_lost()?;
        let textures = lock(&self.internal.textures, "textures")?;
        let entry = textures.get(&id).ok_or(ResourceError::NotFound)?;
        if texels.len() != entry.extent.area() {
            return Err(ResourceError::OutOfBounds);
        }
        self.internal.context.queue.write_texture(
            texel_copy(&entry.texture),
            bytemuck::cast_slice(texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(entry.extent.width * BYTES_PER_TEXEL),
                rows_per_image: Some(entry.extent.height),
            },
            extent3d(entry.extent),
        );
        Ok(())
    }

    fn read_texture(&self, id: TextureId) -> Result<Vec<LinearRgba>, ResourceError> {
        self.check_lost()?;
        let (texture, extent) = {
            let textures = lock(&self.internal.textures, "textures")?;
            let entry = textures.get(&id).ok_or(ResourceError::NotFound)?;
            (Arc::clone(&entry.texture), entry.extent)
        };
        self.read_back(&texture, extent)
    }

    fn texture_extent(&self, id: TextureId) -> Result<Extent2D, ResourceError> {
        let textures = lock(&self.internal.textures, "textures")?;
        textures
            .get(&id)
            .map(|e| e.extent)
            .ok_or(ResourceError::NotFound)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        let mut textures = lock(&self.internal.textures, "textures")?;
        if let Some(entry) = textures.remove(&id) {
            log::trace!("WgpuDevice: destroyed texture '{}' {id:?}", entry.label);
            Ok(())
        } else {
            Err(ResourceError::NotFound)
        }
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        self.check_lost()?;
        let label = descriptor.label.as_deref().unwrap_or("buffer").to_string();
        let buffer = allocate_vertex_buffer(&self.internal.context.device, &label, descriptor.capacity);
        let id = self.generate_buffer_id();
        log::trace!(
            "WgpuDevice: created buffer '{label}' {id:?} ({} vertices)",
            descriptor.capacity
        );
        lock(&self.internal.buffers, "buffers")?.insert(
            id,
            WgpuBufferEntry {
                buffer: Arc::new(buffer),
                capacity: descriptor.capacity,
                label,
            },
        );
        Ok(id)
    }

    fn write_buffer(
        &self,
        id: BufferId,
        offset: u32,
        vertices: &[Vertex2D],
        mode: WriteMode,
    ) -> Result<(), ResourceError> {
        self.check_lost()?;
        let mut buffers = lock(&self.internal.buffers, "buffers")?;
        let entry = buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        let end = u64::from(offset) + vertices.len() as u64;
        if end > u64::from(entry.capacity) {
            return Err(ResourceError::OutOfBounds);
        }
        if mode == WriteMode::Discard {
            // Passes still recording keep the old storage alive.
            entry.buffer = Arc::new(allocate_vertex_buffer(
                &self.internal.context.device,
                &entry.label,
                entry.capacity,
            ));
        }
        if !vertices.is_empty() {
            self.internal.context.queue.write_buffer(
                &entry.buffer,
                u64::from(offset) * VERTEX_SIZE,
                bytemuck::cast_slice(vertices),
            );
        }
        Ok(())
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mut buffers = lock(&self.internal.buffers, "buffers")?;
        if let Some(entry) = buffers.remove(&id) {
            log::trace!("WgpuDevice: destroyed buffer '{}' {id:?}", entry.label);
            Ok(())
        } else {
            Err(ResourceError::NotFound)
        }
    }

    fn begin_render_pass<'a>(
        &'a self,
        descriptor: &RenderPassDescriptor,
    ) -> Result<Box<dyn RenderPassEncoder + 'a>, RenderError> {
        self.check_lost()?;
        let (target_id, view, extent) = match descriptor.target {
            RenderTarget::Surface => (
                None,
                Arc::clone(&self.internal.surface.view),
                self.internal.surface.extent,
            ),
            RenderTarget::Texture(id) => {
                let textures = lock(&self.internal.textures, "textures")?;
                let entry = textures.get(&id).ok_or(ResourceError::NotFound)?;
                if !entry.usage.contains(TextureUsage::RENDER_ATTACHMENT) {
                    return Err(RenderError::RenderingFailed(format!(
                        "texture '{}' is not a render attachment",
                        entry.label
                    )));
                }
                (Some(id), Arc::clone(&entry.view), entry.extent)
            }
        };
        log::trace!("WgpuDevice: begin pass '{}'", descriptor.label_or_default());
        Ok(Box::new(WgpuPassEncoder::new(
            self,
            descriptor.label_or_default().to_string(),
            target_id,
            view,
            extent,
            descriptor.load,
        )))
    }

    fn surface_extent(&self) -> Extent2D {
        self.internal.surface.extent
    }

    fn read_surface(&self) -> Result<Vec<LinearRgba>, RenderError> {
        self.check_lost()?;
        let surface = &self.internal.surface;
        Ok(self.read_back(&surface.texture, surface.extent)?)
    }

    fn is_lost(&self) -> bool {
        self.internal.context.is_lost()
    }

    fn get_adapter_info(&self) -> RendererAdapterInfo {
        let ctx = &self.internal.context;
        RendererAdapterInfo {
            name: ctx.adapter_name.clone(),
            backend_type: match ctx.adapter_device_type {
                wgpu::DeviceType::Cpu => GraphicsBackendType::Software,
                _ => GraphicsBackendType::Hardware,
            },
            max_texture_side: self.max_texture_side(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::math::Vec2;
    use umbra_core::renderer::{BlendMode, BufferUsage, FilterMode, PrimitiveTopology};

    // Needs a GPU adapter with float32 blending; skipped otherwise.
    fn create_test_device(side: u32) -> Option<WgpuDevice> {
        match WgpuDevice::new_headless(Extent2D::square(side)) {
            Ok(device) => Some(device),
            Err(e) => {
                println!("Skipping wgpu test: {e}");
                None
            }
        }
    }

    fn quad(size: f32, color: LinearRgba) -> Vec<Vertex2D> {
        let v = |x: f32, y: f32| Vertex2D::new(Vec2::new(x, y), Vec2::new(x / size, y / size), color);
        vec![
            v(0.0, 0.0),
            v(size, 0.0),
            v(0.0, size),
            v(size, 0.0),
            v(size, size),
            v(0.0, size),
        ]
    }

    fn close(a: LinearRgba, b: LinearRgba) -> bool {
        (a.r - b.r).abs() < 1e-4
            && (a.g - b.g).abs() < 1e-4
            && (a.b - b.b).abs() < 1e-4
            && (a.a - b.a).abs() < 1e-4
    }

    #[test]
    fn pass_clears_and_draws_into_texture() {
        let Some(device) = create_test_device(4) else {
            return;
        };
        let id = device
            .create_texture(&TextureDescriptor::render_target("rt", Extent2D::square(4)))
            .unwrap();
        {
            let mut pass = device
                .begin_render_pass(&RenderPassDescriptor::clear(
                    "test",
                    RenderTarget::Texture(id),
                    LinearRgba::BLACK,
                ))
                .unwrap();
            pass.set_blend_mode(BlendMode::Additive);
            pass.draw(&quad(2.0, LinearRgba::gray(0.5)), PrimitiveTopology::TriangleList)
                .unwrap();
        }
        let texels = device.read_texture(id).unwrap();
        assert!(close(texels[0], LinearRgba::new(0.5, 0.5, 0.5, 1.0)));
        assert!(close(texels[3], LinearRgba::BLACK));
    }

    #[test]
    fn multiply_darkens_and_keeps_alpha() {
        let Some(device) = create_test_device(2) else {
            return;
        };
        {
            let mut pass = device
                .begin_render_pass(&RenderPassDescriptor::clear(
                    "test",
                    RenderTarget::Surface,
                    LinearRgba::new(0.8, 0.8, 0.8, 1.0),
                ))
                .unwrap();
            pass.set_blend_mode(BlendMode::Multiply);
            pass.set_color(LinearRgba::new(1.0, 1.0, 1.0, 0.5));
            pass.draw(&quad(2.0, LinearRgba::gray(0.5)), PrimitiveTopology::TriangleList)
                .unwrap();
        }
        // 0.8 * (0.5 * 0.5 + 0.5)
        let surface = device.read_surface().unwrap();
        assert!(surface
            .iter()
            .all(|t| close(*t, LinearRgba::new(0.6, 0.6, 0.6, 1.0))));
    }

    #[test]
    fn written_texels_are_sampled_and_read_back() {
        let Some(device) = create_test_device(2) else {
            return;
        };
        let texels = vec![
            LinearRgba::new(1.0, 0.0, 0.0, 1.0),
            LinearRgba::new(0.0, 1.0, 0.0, 1.0),
            LinearRgba::new(0.0, 0.0, 1.0, 1.0),
            LinearRgba::new(2.0, 2.0, 2.0, 1.0),
        ];
        let source = device
            .create_texture(&TextureDescriptor::sampled("src", Extent2D::square(2)))
            .unwrap();
        device.write_texture(source, &texels).unwrap();
        assert_eq!(device.read_texture(source).unwrap(), texels);
        assert_eq!(
            device.write_texture(source, &texels[..3]),
            Err(ResourceError::OutOfBounds)
        );
        {
            let mut pass = device
                .begin_render_pass(&RenderPassDescriptor::clear(
                    "copy",
                    RenderTarget::Surface,
                    LinearRgba::BLACK,
                ))
                .unwrap();
            pass.set_blend_mode(BlendMode::Replace);
            pass.set_texture(Some(source), FilterMode::Nearest);
            pass.draw(&quad(2.0, LinearRgba::WHITE), PrimitiveTopology::TriangleList)
                .unwrap();
        }
        let surface = device.read_surface().unwrap();
        for (got, want) in surface.iter().zip(&texels) {
            assert!(close(*got, *want), "{got:?} != {want:?}");
        }
    }

    #[test]
    fn sampling_the_target_is_rejected() {
        let Some(device) = create_test_device(2) else {
            return;
        };
        let id = device
            .create_texture(&TextureDescriptor::render_target("rt", Extent2D::square(2)))
            .unwrap();
        let mut pass = device
            .begin_render_pass(&RenderPassDescriptor::load("test", RenderTarget::Texture(id)))
            .unwrap();
        pass.set_texture(Some(id), FilterMode::Nearest);
        let err = pass
            .draw(&quad(2.0, LinearRgba::WHITE), PrimitiveTopology::TriangleList)
            .unwrap_err();
        assert!(matches!(err, RenderError::RenderingFailed(_)));
    }

    #[test]
    fn discard_write_keeps_only_the_new_vertices() {
        let Some(device) = create_test_device(2) else {
            return;
        };
        let id = device
            .create_buffer(&BufferDescriptor {
                label: None,
                capacity: 6,
                usage: BufferUsage::VERTEX,
            })
            .unwrap();
        let verts = quad(2.0, LinearRgba::WHITE);
        device.write_buffer(id, 0, &verts, WriteMode::Discard).unwrap();
        device.write_buffer(id, 0, &verts[..3], WriteMode::Discard).unwrap();
        assert_eq!(
            device.write_buffer(id, 4, &verts[..3], WriteMode::NoOverwrite),
            Err(ResourceError::OutOfBounds)
        );
        {
            let mut pass = device
                .begin_render_pass(&RenderPassDescriptor::clear(
                    "buffer",
                    RenderTarget::Surface,
                    LinearRgba::BLACK,
                ))
                .unwrap();
            pass.set_blend_mode(BlendMode::Replace);
            // The second triangle was discarded and reads back as zeroes.
            pass.draw_buffer(id, 0..6, PrimitiveTopology::TriangleList)
                .unwrap();
            assert!(matches!(
                pass.draw_buffer(id, 0..7, PrimitiveTopology::TriangleList),
                Err(RenderError::ResourceError(ResourceError::OutOfBounds))
            ));
        }
        let surface = device.read_surface().unwrap();
        // Pixel (0,0) lies in the first triangle, pixel (1,1) only in the second.
        assert!(close(surface[0], LinearRgba::WHITE));
        assert!(close(surface[3], LinearRgba::BLACK));
    }

    #[test]
    fn adapter_info_reports_the_texture_limit() {
        let Some(device) = create_test_device(2) else {
            return;
        };
        let info = device.get_adapter_info();
        assert!(info.max_texture_side >= 2048);
        assert_ne!(info.backend_type, GraphicsBackendType::Unknown);
    }
}
