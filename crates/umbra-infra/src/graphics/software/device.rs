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

use super::raster::{self, RasterState, TexelImage};
use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use umbra_core::math::{Affine2, Extent2D, LinearRgba};
use umbra_core::renderer::{
    BlendMode, BufferDescriptor, BufferId, FilterMode, GraphicsBackendType, GraphicsDevice,
    LoadOp, PrimitiveTopology, RenderError, RenderPassDescriptor, RenderPassEncoder,
    RenderTarget, RendererAdapterInfo, ResourceError, TextureDescriptor, TextureId,
    TextureUsage, Vertex2D, WriteMode,
};

/// Largest texture side the software device accepts.
pub const MAX_TEXTURE_SIDE: u32 = 8192;

#[derive(Debug)]
struct SoftwareTextureEntry {
    label: String,
    usage: TextureUsage,
    image: TexelImage,
}

impl SoftwareTextureEntry {
    fn byte_size(&self) -> usize {
        self.image.texels.len() * std::mem::size_of::<LinearRgba>()
    }
}

#[derive(Debug)]
struct SoftwareBufferEntry {
    label: String,
    vertices: Vec<Vertex2D>,
}

/// Counters exposed for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftwareDeviceStats {
    /// Render passes opened since creation.
    pub passes: u64,
    /// Draw calls recorded since creation.
    pub draw_calls: u64,
    /// Textures created since creation.
    pub texture_allocations: u64,
    /// Vertex buffers created since creation.
    pub buffer_allocations: u64,
    /// Vertex buffer writes since creation.
    pub buffer_writes: u64,
    /// Textures currently alive.
    pub live_textures: usize,
    /// Buffers currently alive.
    pub live_buffers: usize,
    /// Bytes currently allocated.
    pub allocated_bytes: usize,
    /// Highest value `allocated_bytes` ever reached.
    pub peak_bytes: usize,
}

#[derive(Debug)]
struct SoftwareDeviceInternal {
    name: String,
    surface: Mutex<TexelImage>,
    textures: Mutex<HashMap<TextureId, SoftwareTextureEntry>>,
    buffers: Mutex<HashMap<BufferId, SoftwareBufferEntry>>,

    next_texture_id: AtomicUsize,
    next_buffer_id: AtomicUsize,

    allocated_bytes: AtomicUsize,
    peak_bytes: AtomicUsize,
    budget_bytes: AtomicUsize,

    lost: AtomicBool,

    passes: AtomicU64,
    draw_calls: AtomicU64,
    texture_allocations: AtomicU64,
    buffer_allocations: AtomicU64,
    buffer_writes: AtomicU64,
}

/// A clonable, thread-safe handle to the CPU graphics device.
///
/// It implements [`GraphicsDevice`] entirely in memory: textures are
/// [`TexelImage`]s, passes rasterize with the half-space rasterizer, and the
/// surface can be read back. A memory budget and a simulated device loss let
/// callers exercise the pipeline's failure paths.
#[derive(Clone, Debug)]
pub struct SoftwareDevice {
    internal: Arc<SoftwareDeviceInternal>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, ResourceError> {
    mutex
        .lock()
        .map_err(|_| ResourceError::BackendError(format!("SoftwareDevice: {what} mutex poisoned")))
}

impl SoftwareDevice {
    /// Creates a device whose surface has the given size.
    pub fn new(surface: Extent2D) -> Self {
        log::info!(
            "SoftwareDevice: created with a {}x{} surface",
            surface.width,
            surface.height
        );
        Self {
            internal: Arc::new(SoftwareDeviceInternal {
                name: "Umbra Software Rasterizer".to_string(),
                surface: Mutex::new(TexelImage::new(surface, LinearRgba::BLACK)),
                textures: Mutex::new(HashMap::new()),
                buffers: Mutex::new(HashMap::new()),
                next_texture_id: AtomicUsize::new(0),
                next_buffer_id: AtomicUsize::new(0),
                allocated_bytes: AtomicUsize::new(0),
                peak_bytes: AtomicUsize::new(0),
                budget_bytes: AtomicUsize::new(usize::MAX),
                lost: AtomicBool::new(false),
                passes: AtomicU64::new(0),
                draw_calls: AtomicU64::new(0),
                texture_allocations: AtomicU64::new(0),
                buffer_allocations: AtomicU64::new(0),
                buffer_writes: AtomicU64::new(0),
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

    // --- Failure simulation ---

    /// Limits the total bytes the device may hold. `None` removes the limit.
    pub fn set_memory_budget(&self, bytes: Option<usize>) {
        self.internal
            .budget_bytes
            .store(bytes.unwrap_or(usize::MAX), Ordering::Relaxed);
    }

    /// Simulates a device loss: every operation but destruction fails until
    /// [`SoftwareDevice::reset`] is called.
    pub fn lose_device(&self) {
        log::warn!("SoftwareDevice: device lost");
        self.internal.lost.store(true, Ordering::SeqCst);
    }

    /// Recovers from a loss. Every resource still alive is discarded, as a
    /// real driver would after a reset.
    pub fn reset(&self) -> Result<(), ResourceError> {
        let dropped_textures = {
            let mut textures = lock(&self.internal.textures, "textures")?;
            let n = textures.len();
            textures.clear();
            n
        };
        let dropped_buffers = {
            let mut buffers = lock(&self.internal.buffers, "buffers")?;
            let n = buffers.len();
            buffers.clear();
            n
        };
        if dropped_textures + dropped_buffers > 0 {
            log::warn!(
                "SoftwareDevice: reset discarded {dropped_textures} textures and {dropped_buffers} buffers still alive"
            );
        }
        lock(&self.internal.surface, "surface")?.fill(LinearRgba::BLACK);
        self.internal.allocated_bytes.store(0, Ordering::Relaxed);
        self.internal.lost.store(false, Ordering::SeqCst);
        log::info!("SoftwareDevice: reset complete");
        Ok(())
    }

    /// Returns a snapshot of the device counters.
    pub fn stats(&self) -> SoftwareDeviceStats {
        let i = &self.internal;
        SoftwareDeviceStats {
            passes: i.passes.load(Ordering::Relaxed),
            draw_calls: i.draw_calls.load(Ordering::Relaxed),
            texture_allocations: i.texture_allocations.load(Ordering::Relaxed),
            buffer_allocations: i.buffer_allocations.load(Ordering::Relaxed),
            buffer_writes: i.buffer_writes.load(Ordering::Relaxed),
            live_textures: i.textures.lock().map(|t| t.len()).unwrap_or(0),
            live_buffers: i.buffers.lock().map(|b| b.len()).unwrap_or(0),
            allocated_bytes: i.allocated_bytes.load(Ordering::Relaxed),
            peak_bytes: i.peak_bytes.load(Ordering::Relaxed),
        }
    }

    /// Returns the debug label of a live texture.
    pub fn texture_label(&self, id: TextureId) -> Option<String> {
        let textures = self.internal.textures.lock().ok()?;
        textures.get(&id).map(|e| e.label.clone())
    }

    /// Returns a copy of the vertices stored in `range` of a live buffer.
    pub fn buffer_contents(&self, id: BufferId, range: Range<u32>) -> Option<Vec<Vertex2D>> {
        let buffers = self.internal.buffers.lock().ok()?;
        let vertices = &buffers.get(&id)?.vertices;
        vertices
            .get(range.start as usize..range.end as usize)
            .map(<[Vertex2D]>::to_vec)
    }

    fn check_lost(&self) -> Result<(), ResourceError> {
        if self.internal.lost.load(Ordering::SeqCst) {
            Err(ResourceError::DeviceLost)
        } else {
            Ok(())
        }
    }

    fn reserve(&self, label: &str, bytes: usize) -> Result<(), ResourceError> {
        let budget = self.internal.budget_bytes.load(Ordering::Relaxed);
        let current = self.internal.allocated_bytes.load(Ordering::Relaxed);
        if current.saturating_add(bytes) > budget {
            log::warn!(
                "SoftwareDevice: allocation of {bytes} bytes for '{label}' exceeds the budget ({current}/{budget})"
            );
            return Err(ResourceError::AllocationFailed {
                label: label.to_string(),
                bytes,
            });
        }
        let total = self.internal.allocated_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.internal.peak_bytes.fetch_max(total, Ordering::Relaxed);
        Ok(())
    }

    fn release(&self, bytes: usize) {
        let _ = self
            .internal
            .allocated_bytes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(bytes))
            });
    }
}

impl GraphicsDevice for SoftwareDevice {
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        self.check_lost()?;
        let label = descriptor.label.as_deref().unwrap_or("texture").to_string();
        let size = descriptor.size;
        if size.is_empty() || size.max_side() > MAX_TEXTURE_SIDE {
            return Err(ResourceError::AllocationFailed {
                label,
                bytes: descriptor.byte_size(),
            });
        }
        self.reserve(&label, descriptor.byte_size())?;

        let id = self.generate_texture_id();
        let entry = SoftwareTextureEntry {
            label,
            usage: descriptor.usage,
            image: TexelImage::new(size, LinearRgba::TRANSPARENT),
        };
        log::trace!(
            "SoftwareDevice: created texture '{}' {:?} ({}x{})",
            entry.label,
            id,
            size.width,
            size.height
        );
        lock(&self.internal.textures, "textures")?.insert(id, entry);
        self.internal
            .texture_allocations
            .fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    fn write_texture(&self, id: TextureId, texels: &[LinearRgba]) -> Result<(), ResourceError> {
        self.check_lost()?;
        let mut textures = lock(&self.internal.textures, "textures")?;
        let entry = textures.get_mut(&id).ok_or(ResourceError::NotFound)?;
        if texels.len() != entry.image.texels.len() {
            return Err(ResourceError::OutOfBounds);
        }
        entry.image.texels.copy_from_slice(texels);
        Ok(())
    }

    fn read_texture(&self, id: TextureId) -> Result<Vec<LinearRgba>, ResourceError> {
        self.check_lost()?;
        let textures = lock(&self.internal.textures, "textures")?;
        let entry = textures.get(&id).ok_or(ResourceError::NotFound)?;
        Ok(entry.image.texels.clone())
    }

    fn texture_extent(&self, id: TextureId) -> Result<Extent2D, ResourceError> {
        let textures = lock(&self.internal.textures, "textures")?;
        textures
            .get(&id)
            .map(|e| e.image.extent)
            .ok_or(ResourceError::NotFound)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        let mut textures = lock(&self.internal.textures, "textures")?;
        if let Some(entry) = textures.remove(&id) {
            self.release(entry.byte_size());
            log::trace!("SoftwareDevice: destroyed texture '{}' {id:?}", entry.label);
            Ok(())
        } else {
            Err(ResourceError::NotFound)
        }
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        self.check_lost()?;
        let label = descriptor.label.as_deref().unwrap_or("buffer").to_string();
        self.reserve(&label, descriptor.byte_size())?;
        let id = self.generate_buffer_id();
        let entry = SoftwareBufferEntry {
            label,
            vertices: vec![Vertex2D::default(); descriptor.capacity as usize],
        };
        lock(&self.internal.buffers, "buffers")?.insert(id, entry);
        self.internal
            .buffer_allocations
            .fetch_add(1, Ordering::Relaxed);
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
        let start = offset as usize;
        let end = start + vertices.len();
        if end > entry.vertices.len() {
            return Err(ResourceError::OutOfBounds);
        }
        if mode == WriteMode::Discard {
            // A fresh backing store: nothing of the previous content survives.
            entry
                .vertices
                .iter_mut()
                .for_each(|v| *v = Vertex2D::default());
        }
        entry.vertices[start..end].copy_from_slice(vertices);
        self.internal.buffer_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mut buffers = lock(&self.internal.buffers, "buffers")?;
        if let Some(entry) = buffers.remove(&id) {
            self.release(entry.vertices.len() * std::mem::size_of::<Vertex2D>());
            log::trace!("SoftwareDevice: destroyed buffer '{}' {id:?}", entry.label);
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
        let (image, slot) = match descriptor.target {
            RenderTarget::Surface => {
                let mut surface = lock(&self.internal.surface, "surface")?;
                (std::mem::take(&mut *surface), TargetSlot::Surface)
            }
            RenderTarget::Texture(id) => {
                let mut textures = lock(&self.internal.textures, "textures")?;
                let entry = textures.remove(&id).ok_or(ResourceError::NotFound)?;
                if !entry.usage.contains(TextureUsage::RENDER_ATTACHMENT) {
                    let label = entry.label.clone();
                    textures.insert(id, entry);
                    return Err(RenderError::RenderingFailed(format!(
                        "texture '{label}' is not a render attachment"
                    )));
                }
                let SoftwareTextureEntry {
                    label,
                    usage,
                    image,
                } = entry;
                (image, TargetSlot::Texture { id, label, usage })
            }
        };

        let mut encoder = SoftwarePassEncoder {
            device: self,
            slot,
            image,
            state: RasterState::default(),
            texture: None,
        };
        if let LoadOp::Clear(color) = descriptor.load {
            encoder.image.fill(color);
        }
        self.internal.passes.fetch_add(1, Ordering::Relaxed);
        log::trace!("SoftwareDevice: begin pass '{}'", descriptor.label_or_default());
        Ok(Box::new(encoder))
    }

    fn surface_extent(&self) -> Extent2D {
        self.internal
            .surface
            .lock()
            .map(|s| s.extent)
            .unwrap_or_default()
    }

    fn read_surface(&self) -> Result<Vec<LinearRgba>, RenderError> {
        self.check_lost()?;
        Ok(lock(&self.internal.surface, "surface")?.texels.clone())
    }

    fn is_lost(&self) -> bool {
        self.internal.lost.load(Ordering::SeqCst)
    }

    fn get_adapter_info(&self) -> RendererAdapterInfo {
        RendererAdapterInfo {
            name: self.internal.name.clone(),
            backend_type: GraphicsBackendType::Software,
            max_texture_side: MAX_TEXTURE_SIDE,
        }
    }
}

#[derive(Debug)]
enum TargetSlot {
    Surface,
    Texture {
        id: TextureId,
        label: String,
        usage: TextureUsage,
    },
}

/// A render pass on the software device.
///
/// The target image is taken out of the device for the lifetime of the pass
/// and handed back when the encoder is dropped.
struct SoftwarePassEncoder<'a> {
    device: &'a SoftwareDevice,
    slot: TargetSlot,
    image: TexelImage,
    state: RasterState,
    texture: Option<TextureId>,
}

impl SoftwarePassEncoder<'_> {
    fn rasterize(
        &mut self,
        vertices: &[Vertex2D],
        topology: PrimitiveTopology,
    ) -> Result<(), RenderError> {
        self.device.check_lost()?;
        if let (Some(bound), TargetSlot::Texture { id, label, .. }) = (self.texture, &self.slot) {
            if bound == *id {
                return Err(RenderError::RenderingFailed(format!(
                    "texture '{label}' is sampled while being the pass target"
                )));
            }
        }
        let textures = lock(&self.device.internal.textures, "textures")?;
        let sampled = match self.texture {
            Some(id) => Some(&textures.get(&id).ok_or(ResourceError::NotFound)?.image),
            None => None,
        };
        raster::draw_vertices(&mut self.image, vertices, topology, &self.state, sampled);
        self.device
            .internal
            .draw_calls
            .fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl RenderPassEncoder for SoftwarePassEncoder<'_> {
    fn set_blend_mode(&mut self, mode: BlendMode) {
        self.state.blend = mode;
    }

    fn set_texture(&mut self, texture: Option<TextureId>, filter: FilterMode) {
        self.texture = texture;
        self.state.filter = filter;
    }

    fn set_transform(&mut self, transform: Affine2) {
        self.state.transform = transform;
    }

    fn set_color(&mut self, color: LinearRgba) {
        self.state.color = color;
    }

    fn draw(
        &mut self,
        vertices: &[Vertex2D],
        topology: PrimitiveTopology,
    ) -> Result<(), RenderError> {
        self.rasterize(vertices, topology)
    }

    fn draw_buffer(
        &mut self,
        buffer: BufferId,
        range: Range<u32>,
        topology: PrimitiveTopology,
    ) -> Result<(), RenderError> {
        let vertices = {
            let buffers = lock(&self.device.internal.buffers, "buffers")?;
            let entry = buffers.get(&buffer).ok_or(ResourceError::NotFound)?;
            entry
                .vertices
                .get(range.start as usize..range.end as usize)
                .ok_or(ResourceError::OutOfBounds)?
                .to_vec()
        };
        self.rasterize(&vertices, topology)
    }

    fn target_extent(&self) -> Extent2D {
        self.image.extent
    }
}

impl Drop for SoftwarePassEncoder<'_> {
    fn drop(&mut self) {
        let image = std::mem::take(&mut self.image);
        let restored = match &mut self.slot {
            TargetSlot::Surface => self
                .device
                .internal
                .surface
                .lock()
                .map(|mut surface| *surface = image)
                .is_ok(),
            TargetSlot::Texture { id, label, usage } => self
                .device
                .internal
                .textures
                .lock()
                .map(|mut textures| {
                    textures.insert(
                        *id,
                        SoftwareTextureEntry {
                            label: std::mem::take(label),
                            usage: *usage,
                            image,
                        },
                    );
                })
                .is_ok(),
        };
        if !restored {
            log::error!("SoftwareDevice: failed to restore a pass target, mutex poisoned");
        }
    }
}
