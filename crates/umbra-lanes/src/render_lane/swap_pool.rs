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

//! Power-of-two scratch render targets.
//!
//! The pool hands out [`PooledTarget`]s. A target is marked in use while the
//! handle lives and returns to the pool when the handle is dropped; the
//! texture itself is destroyed only once both the pool and every handle have
//! let go of it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use umbra_core::math::Extent2D;
use umbra_core::renderer::{
    GraphicsDevice, OwnedTexture, ResourceError, SizeClass, TextureDescriptor, TextureId,
};

#[derive(Debug)]
struct PoolEntry {
    class: SizeClass,
    texture: Arc<OwnedTexture>,
    in_use: Arc<AtomicBool>,
}

/// A render target borrowed from a [`SwapPool`].
#[derive(Debug)]
pub struct PooledTarget {
    class: SizeClass,
    texture: Arc<OwnedTexture>,
    in_use: Arc<AtomicBool>,
}

impl PooledTarget {
    /// The texture handle.
    #[inline]
    pub fn id(&self) -> TextureId {
        self.texture.id()
    }

    /// The size class the texture was allocated with.
    #[inline]
    pub fn class(&self) -> SizeClass {
        self.class
    }

    /// Side length in pixels.
    #[inline]
    pub fn side(&self) -> u32 {
        self.class.side()
    }

    /// The texture size.
    #[inline]
    pub fn extent(&self) -> Extent2D {
        self.texture.size()
    }

    /// Reads the texels back (row-major).
    pub fn read(&self) -> Result<Vec<umbra_core::math::LinearRgba>, ResourceError> {
        self.texture.read()
    }
}

impl Drop for PooledTarget {
    fn drop(&mut self) {
        self.in_use.store(false, Ordering::Release);
    }
}

/// Two pooled targets of the same class: the current result and a scratch
/// buffer the next pass renders into.
#[derive(Debug)]
pub struct PingPong {
    current: PooledTarget,
    other: PooledTarget,
}

impl PingPong {
    /// Pairs two targets. `current` holds the initial content.
    pub fn new(current: PooledTarget, other: PooledTarget) -> Self {
        Self { current, other }
    }

    /// The buffer holding the latest result.
    #[inline]
    pub fn current(&self) -> &PooledTarget {
        &self.current
    }

    /// The scratch buffer.
    #[inline]
    pub fn other(&self) -> &PooledTarget {
        &self.other
    }

    /// Exchanges the roles of the two buffers. No pixel is copied.
    #[inline]
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.other);
    }

    /// Gives up the scratch buffer and keeps the result.
    pub fn into_current(self) -> PooledTarget {
        self.current
    }
}

/// Pool statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwapPoolStats {
    /// Textures owned by the pool.
    pub entries: usize,
    /// Textures currently handed out.
    pub in_use: usize,
    /// Textures allocated since creation.
    pub allocations: usize,
}

/// A pool of square render targets sorted by size.
#[derive(Debug, Default)]
pub struct SwapPool {
    entries: Vec<PoolEntry>,
    max_class: Option<SizeClass>,
    allocations: usize,
}

impl SwapPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the class of every allocation, typically to the device limit.
    pub fn set_max_class(&mut self, class: Option<SizeClass>) {
        self.max_class = class;
    }

    /// Returns a target at least as large as `class` (up to the cap).
    ///
    /// The smallest idle entry that fits is reused; otherwise a new texture
    /// is allocated and inserted in size order.
    pub fn acquire(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        class: SizeClass,
    ) -> Result<PooledTarget, ResourceError> {
        let class = match self.max_class {
            Some(max) => class.min(max),
            None => class,
        };
        let reusable = self
            .entries
            .iter()
            .find(|e| e.class >= class && !e.in_use.load(Ordering::Acquire));
        if let Some(entry) = reusable {
            entry.in_use.store(true, Ordering::Release);
            return Ok(PooledTarget {
                class: entry.class,
                texture: Arc::clone(&entry.texture),
                in_use: Arc::clone(&entry.in_use),
            });
        }

        let label = format!("swap_pool_{}", class.side());
        let texture = Arc::new(OwnedTexture::new(
            device,
            &TextureDescriptor::render_target(&label, class.extent()),
        )?);
        self.allocations += 1;
        log::info!(
            "Swap pool allocated a {0}x{0} target ({1} entries)",
            class.side(),
            self.entries.len() + 1
        );

        let entry = PoolEntry {
            class,
            texture,
            in_use: Arc::new(AtomicBool::new(true)),
        };
        let target = PooledTarget {
            class,
            texture: Arc::clone(&entry.texture),
            in_use: Arc::clone(&entry.in_use),
        };
        let at = self.entries.partition_point(|e| e.class <= class);
        self.entries.insert(at, entry);
        Ok(target)
    }

    /// Acquires two targets of the same class.
    pub fn acquire_pair(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        class: SizeClass,
    ) -> Result<PingPong, ResourceError> {
        let current = self.acquire(device, class)?;
        let other = self.acquire(device, current.class())?;
        Ok(PingPong::new(current, other))
    }

    /// Drops every pooled texture. Handles still alive keep their texture
    /// until they are dropped.
    pub fn release_all(&mut self) {
        if !self.entries.is_empty() {
            log::info!("Swap pool released {} targets", self.entries.len());
        }
        self.entries.clear();
    }

    /// Current statistics.
    pub fn stats(&self) -> SwapPoolStats {
        SwapPoolStats {
            entries: self.entries.len(),
            in_use: self
                .entries
                .iter()
                .filter(|e| e.in_use.load(Ordering::Acquire))
                .count(),
            allocations: self.allocations,
        }
    }

    /// Classes of the pooled textures, in pool order.
    pub fn classes(&self) -> Vec<SizeClass> {
        self.entries.iter().map(|e| e.class).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_infra::SoftwareDevice;

    fn device() -> Arc<dyn GraphicsDevice> {
        Arc::new(SoftwareDevice::new(Extent2D::square(16)))
    }

    #[test]
    fn reuses_smallest_idle_entry_that_fits() {
        let device = device();
        let mut pool = SwapPool::new();
        let big = pool.acquire(&device, SizeClass(6)).unwrap();
        let small = pool.acquire(&device, SizeClass(3)).unwrap();
        assert_eq!(pool.classes(), vec![SizeClass(3), SizeClass(6)]);
        drop(big);
        drop(small);

        let again = pool.acquire(&device, SizeClass(2)).unwrap();
        assert_eq!(again.class(), SizeClass(3));
        let next = pool.acquire(&device, SizeClass(2)).unwrap();
        assert_eq!(next.class(), SizeClass(6));
        assert_eq!(pool.stats().allocations, 2);
        assert_eq!(pool.stats().in_use, 2);
    }

    #[test]
    fn swap_exchanges_handles_without_copying() {
        let device = device();
        let mut pool = SwapPool::new();
        let mut pair = pool.acquire_pair(&device, SizeClass(2)).unwrap();
        let (a, b) = (pair.current().id(), pair.other().id());
        assert_ne!(a, b);
        pair.swap();
        assert_eq!(pair.current().id(), b);
        assert_eq!(pair.other().id(), a);
        let kept = pair.into_current();
        assert_eq!(pool.stats().in_use, 1);
        assert_eq!(kept.id(), b);
    }

    #[test]
    fn allocation_failure_is_reported() {
        let software = Arc::new(SoftwareDevice::new(Extent2D::square(4)));
        software.set_memory_budget(Some(64));
        let device: Arc<dyn GraphicsDevice> = software;
        let mut pool = SwapPool::new();
        assert!(matches!(
            pool.acquire(&device, SizeClass(4)),
            Err(ResourceError::AllocationFailed { .. })
        ));
        assert_eq!(pool.stats().entries, 0);
    }

    #[test]
    fn release_all_keeps_live_handles_valid() {
        let device = device();
        let mut pool = SwapPool::new();
        let held = pool.acquire(&device, SizeClass(1)).unwrap();
        pool.release_all();
        assert_eq!(pool.stats().entries, 0);
        assert!(device.texture_extent(held.id()).is_ok());
        let id = held.id();
        drop(held);
        assert!(device.texture_extent(id).is_err());
    }
}
