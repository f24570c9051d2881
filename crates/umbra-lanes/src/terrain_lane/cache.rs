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

//! The terrain batch cache.
//!
//! One slot per visible patch holds a retained vertex buffer and the render
//! groups partitioning it. Slots move between three states:
//!
//! - `Empty`: free, possibly still holding a buffer for reuse;
//! - `Cached`: geometry matches the patch;
//! - `Dirty`: geometry is stale and must be rebuilt before it is drawn.
//!
//! A patch that is not dirty and whose slot is cached is never rebuilt.

use super::mesh::{build_patch_mesh, RenderGroup};
use super::tileset::TileSetRegistry;
use ahash::{AHashMap, AHashSet};
use std::sync::Arc;
use umbra_core::math::{next_power_of_two, Rect};
use umbra_core::renderer::{
    BufferDescriptor, BufferId, BufferUsage, GraphicsDevice, OwnedBuffer, ResourceError,
    TerrainRenderConfig, WriteMode,
};
use umbra_core::{Diagnostic, DiagnosticBus};
use umbra_data::{PatchCoord, PatchId, Terrain, TerrainPatch};

/// `(layer index, patch coordinate)`.
pub type SlotKey = (usize, PatchCoord);

/// Lifecycle state of a cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotState {
    /// Unused.
    Empty,
    /// Geometry is current.
    Cached,
    /// Geometry is stale.
    Dirty,
}

/// One cached patch.
#[derive(Debug)]
pub struct CacheSlot {
    state: SlotState,
    key: Option<SlotKey>,
    patch_id: Option<PatchId>,
    revision: u64,
    buffer: Option<OwnedBuffer>,
    groups: Vec<RenderGroup>,
    vertex_count: u32,
    rebuild_count: u64,
}

impl CacheSlot {
    fn empty() -> Self {
        Self {
            state: SlotState::Empty,
            key: None,
            patch_id: None,
            revision: 0,
            buffer: None,
            groups: Vec::new(),
            vertex_count: 0,
            rebuild_count: 0,
        }
    }

    /// The slot state.
    pub fn state(&self) -> SlotState {
        self.state
    }

    /// The patch the slot is bound to.
    pub fn key(&self) -> Option<SlotKey> {
        self.key
    }

    /// Identity of the patch the geometry was built from.
    pub fn patch_id(&self) -> Option<PatchId> {
        self.patch_id
    }

    /// Patch revision the geometry was built from.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Render groups, ordered so groups sharing a texture are contiguous.
    pub fn groups(&self) -> &[RenderGroup] {
        &self.groups
    }

    /// Vertices written to the buffer.
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// The retained buffer, if the patch has any geometry.
    pub fn buffer_id(&self) -> Option<BufferId> {
        self.buffer.as_ref().map(OwnedBuffer::id)
    }

    /// Times this slot was rebuilt since it was created.
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    /// Returns `true` if the slot can be drawn for `patch`.
    pub fn is_valid_for(&self, patch: &TerrainPatch) -> bool {
        self.state == SlotState::Cached && self.patch_id == Some(patch.id()) && !patch.is_dirty()
    }

    fn release(&mut self) {
        self.state = SlotState::Empty;
        self.key = None;
        self.patch_id = None;
        self.groups.clear();
        self.vertex_count = 0;
    }
}

/// Counters of one `update_cache` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Patches rebuilt.
    pub rebuilds: usize,
    /// Visible patches whose cached geometry was reused.
    pub hits: usize,
    /// Slots freed because their patch left the visibility window.
    pub evictions: usize,
    /// Stale patches left for a later frame by `limitCacheUpdate`.
    pub deferred: usize,
    /// Rebuilds that failed to get buffer memory.
    pub failed: usize,
    /// Buffers (re)allocated to fit more vertices.
    pub buffer_grows: usize,
    /// Rebuilt patches exceeding `renderGroupBudget`.
    pub over_budget: usize,
    /// Slots bound to a visible patch after the update.
    pub live_slots: usize,
}

/// Retained per-patch geometry.
#[derive(Debug, Default)]
pub struct TerrainBatchCache {
    slots: Vec<CacheSlot>,
    free: Vec<usize>,
    index: AHashMap<SlotKey, usize>,
    total_rebuilds: u64,
    diagnostics: Option<DiagnosticBus>,
}

impl TerrainBatchCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes budget overflows on `bus`.
    pub fn set_diagnostics(&mut self, bus: DiagnosticBus) {
        self.diagnostics = Some(bus);
    }

    /// The slot bound to a patch.
    pub fn slot(&self, layer: usize, coord: PatchCoord) -> Option<&CacheSlot> {
        self.index.get(&(layer, coord)).map(|&i| &self.slots[i])
    }

    /// All slots, including free ones.
    pub fn slots(&self) -> &[CacheSlot] {
        &self.slots
    }

    /// Rebuilds since the cache was created.
    pub fn total_rebuilds(&self) -> u64 {
        self.total_rebuilds
    }

    /// Marks every cached slot dirty. Buffers are kept and rewritten on the
    /// next update.
    pub fn clear_cache(&mut self) {
        for slot in &mut self.slots {
            if slot.state == SlotState::Cached {
                slot.state = SlotState::Dirty;
            }
        }
        log::debug!("Terrain cache cleared ({} slots)", self.index.len());
    }

    /// Drops every slot and buffer.
    pub fn release_device_objects(&mut self) {
        if !self.slots.is_empty() {
            log::info!("Terrain cache released {} slots", self.slots.len());
        }
        self.slots.clear();
        self.free.clear();
        self.index.clear();
    }

    fn bind_slot(&mut self, key: SlotKey) -> usize {
        if let Some(&i) = self.index.get(&key) {
            return i;
        }
        let i = match self.free.pop() {
            Some(i) => i,
            None => {
                self.slots.push(CacheSlot::empty());
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[i];
        slot.state = SlotState::Empty;
        slot.key = Some(key);
        self.index.insert(key, i);
        i
    }

    /// Brings the cache in line with the patches visible in `bounds`.
    ///
    /// Slots of patches that left the window are freed. A visible patch is
    /// rebuilt only if its slot is not cached, the patch is dirty, or the
    /// patch was replaced; its dirty flag is cleared afterwards. Failed
    /// allocations leave the patch to the slow path; only device loss is
    /// returned.
    pub fn update_cache(
        &mut self,
        device: &Arc<dyn GraphicsDevice>,
        terrain: &mut Terrain,
        bounds: Rect,
        config: &TerrainRenderConfig,
        tile_sets: &TileSetRegistry,
    ) -> Result<CacheStats, ResourceError> {
        let mut stats = CacheStats::default();

        let mut visible: Vec<SlotKey> = Vec::new();
        if config.cache_enable {
            let coords = terrain.visible_patches(bounds, config.visibility_margin);
            for (layer_index, layer) in terrain.layers().iter().enumerate() {
                if layer.visible {
                    visible.extend(coords.iter().map(|&c| (layer_index, c)));
                }
            }
        }

        let keep: AHashSet<SlotKey> = visible.iter().copied().collect();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            let Some(key) = slot.key else { continue };
            if !keep.contains(&key) {
                slot.release();
                self.index.remove(&key);
                self.free.push(i);
                stats.evictions += 1;
            }
        }

        let limit = config.limit_cache_update as usize;
        for key in visible {
            let (layer_index, coord) = key;
            let Some(patch) = terrain.layer(layer_index).and_then(|l| l.patch(coord)) else {
                continue;
            };
            let i = self.bind_slot(key);
            let slot = &mut self.slots[i];
            let stale = slot.state != SlotState::Cached
                || patch.is_dirty()
                || slot.patch_id != Some(patch.id());
            if !stale {
                stats.hits += 1;
                continue;
            }
            if limit > 0 && stats.rebuilds >= limit {
                if slot.state == SlotState::Cached {
                    slot.state = SlotState::Dirty;
                }
                stats.deferred += 1;
                continue;
            }

            let origin = terrain.patch_world_rect(coord).min;
            let mesh = build_patch_mesh(patch, origin, terrain.tile_size(), tile_sets);
            let (patch_id, revision) = (patch.id(), patch.revision());

            let needed = mesh.vertices.len() as u32;
            let upload = (|| -> Result<bool, ResourceError> {
                if needed == 0 {
                    return Ok(false);
                }
                let mut grew = false;
                if slot.buffer.as_ref().map_or(0, OwnedBuffer::capacity) < needed {
                    slot.buffer = None;
                    slot.buffer = Some(OwnedBuffer::new(
                        device,
                        &BufferDescriptor {
                            label: Some("terrain_patch".into()),
                            capacity: next_power_of_two(needed),
                            usage: BufferUsage::VERTEX | BufferUsage::COPY_DST | BufferUsage::DYNAMIC,
                        },
                    )?);
                    grew = true;
                }
                if let Some(buffer) = &slot.buffer {
                    buffer.write(0, &mesh.vertices, WriteMode::Discard)?;
                }
                Ok(grew)
            })();

            match upload {
                Ok(grew) => {
                    stats.buffer_grows += usize::from(grew);
                }
                Err(ResourceError::DeviceLost) => return Err(ResourceError::DeviceLost),
                Err(e) => {
                    log::warn!("Terrain patch {coord:?} of layer {layer_index} not cached: {e}");
                    slot.state = SlotState::Dirty;
                    slot.groups.clear();
                    slot.vertex_count = 0;
                    stats.failed += 1;
                    continue;
                }
            }

            let budget = config.render_group_budget as usize;
            if mesh.groups.len() > budget {
                stats.over_budget += 1;
                let message = format!(
                    "Patch {coord:?} of layer {layer_index} needs {} render groups (budget {budget})",
                    mesh.groups.len()
                );
                match &self.diagnostics {
                    Some(bus) => bus.publish(Diagnostic::warning("terrain", message)),
                    None => log::warn!("{message}"),
                }
            }

            slot.groups = mesh.groups;
            slot.vertex_count = needed;
            slot.state = SlotState::Cached;
            slot.patch_id = Some(patch_id);
            slot.revision = revision;
            slot.rebuild_count += 1;
            self.total_rebuilds += 1;
            stats.rebuilds += 1;

            if let Some(patch) = terrain
                .layer_mut(layer_index)
                .and_then(|l| l.patch_mut(coord))
            {
                patch.clear_dirty();
            }
        }

        stats.live_slots = self.index.len();
        if stats.rebuilds > 0 || stats.evictions > 0 {
            log::debug!(
                "Terrain cache: {} rebuilt, {} reused, {} evicted, {} deferred",
                stats.rebuilds,
                stats.hits,
                stats.evictions,
                stats.deferred
            );
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::math::{Extent2D, Vec2};
    use umbra_data::{SurfaceId, Tile, TileSetId};
    use umbra_infra::SoftwareDevice;

    fn setup() -> (Arc<SoftwareDevice>, Arc<dyn GraphicsDevice>, Terrain) {
        let soft = Arc::new(SoftwareDevice::new(Extent2D::new(64, 64)));
        let device: Arc<dyn GraphicsDevice> = soft.clone();
        let mut terrain = Terrain::new(4, 4, 4, 8.0);
        terrain.add_layer("ground", 0);
        for ty in 0..16 {
            for tx in 0..16 {
                terrain.set_tile(0, tx, ty, Tile::new(TileSetId(0), 0, SurfaceId(0)));
            }
        }
        (soft, device, terrain)
    }

    fn everything() -> Rect {
        Rect::new(Vec2::ZERO, Vec2::splat(128.0))
    }

    #[test]
    fn clean_patches_are_not_rebuilt() {
        let (_, device, mut terrain) = setup();
        let config = TerrainRenderConfig::default();
        let tile_sets = TileSetRegistry::new();
        let mut cache = TerrainBatchCache::new();

        let first = cache
            .update_cache(&device, &mut terrain, everything(), &config, &tile_sets)
            .unwrap();
        assert_eq!(first.rebuilds, 16);
        assert!(terrain.dirty_patches().is_empty());

        let second = cache
            .update_cache(&device, &mut terrain, everything(), &config, &tile_sets)
            .unwrap();
        assert_eq!(second.rebuilds, 0);
        assert_eq!(second.hits, 16);
        assert_eq!(cache.total_rebuilds(), 16);
    }

    #[test]
    fn an_edit_rebuilds_exactly_its_patch() {
        let (_, device, mut terrain) = setup();
        let config = TerrainRenderConfig::default();
        let tile_sets = TileSetRegistry::new();
        let mut cache = TerrainBatchCache::new();
        cache
            .update_cache(&device, &mut terrain, everything(), &config, &tile_sets)
            .unwrap();

        assert!(terrain.set_tile(0, 5, 5, Tile::new(TileSetId(0), 1, SurfaceId(0))));
        let stats = cache
            .update_cache(&device, &mut terrain, everything(), &config, &tile_sets)
            .unwrap();
        assert_eq!(stats.rebuilds, 1);
        let slot = cache.slot(0, PatchCoord::new(1, 1)).unwrap();
        assert_eq!(slot.rebuild_count(), 2);
        assert_eq!(slot.state(), SlotState::Cached);
        assert!(!terrain.layer(0).unwrap().patch(PatchCoord::new(1, 1)).unwrap().is_dirty());
    }

    #[test]
    fn groups_partition_the_buffer() {
        let (_, device, mut terrain) = setup();
        terrain.set_tile(0, 1, 0, Tile::new(TileSetId(2), 0, SurfaceId(0)));
        let mut cache = TerrainBatchCache::new();
        cache
            .update_cache(
                &device,
                &mut terrain,
                everything(),
                &TerrainRenderConfig::default(),
                &TileSetRegistry::new(),
            )
            .unwrap();
        let slot = cache.slot(0, PatchCoord::new(0, 0)).unwrap();
        assert_eq!(slot.groups().len(), 2);
        let total: u32 = slot.groups().iter().map(RenderGroup::vertex_count).sum();
        assert_eq!(total, slot.vertex_count());
        assert_eq!(total, 16 * super::super::mesh::VERTICES_PER_TILE);
    }

    #[test]
    fn clear_cache_forces_one_rebuild() {
        let (_, device, mut terrain) = setup();
        let config = TerrainRenderConfig::default();
        let tile_sets = TileSetRegistry::new();
        let mut cache = TerrainBatchCache::new();
        cache
            .update_cache(&device, &mut terrain, everything(), &config, &tile_sets)
            .unwrap();
        cache.clear_cache();
        assert!(cache.slots().iter().all(|s| s.state() == SlotState::Dirty));
        let stats = cache
            .update_cache(&device, &mut terrain, everything(), &config, &tile_sets)
            .unwrap();
        assert_eq!((stats.rebuilds, stats.buffer_grows), (16, 0));
    }

    #[test]
    fn rebuilds_per_frame_are_limited() {
        let (_, device, mut terrain) = setup();
        let config = TerrainRenderConfig {
            limit_cache_update: 5,
            ..Default::default()
        };
        let tile_sets = TileSetRegistry::new();
        let mut cache = TerrainBatchCache::new();
        let stats = cache
            .update_cache(&device, &mut terrain, everything(), &config, &tile_sets)
            .unwrap();
        assert_eq!((stats.rebuilds, stats.deferred), (5, 11));
        assert_eq!(terrain.dirty_patches().len(), 11);
    }

    #[test]
    fn patches_leaving_the_view_are_evicted() {
        let (soft, device, mut terrain) = setup();
        let config = TerrainRenderConfig {
            visibility_margin: 0,
            ..Default::default()
        };
        let tile_sets = TileSetRegistry::new();
        let mut cache = TerrainBatchCache::new();
        cache
            .update_cache(&device, &mut terrain, everything(), &config, &tile_sets)
            .unwrap();
        let corner = Rect::new(Vec2::splat(1.0), Vec2::splat(2.0));
        let stats = cache
            .update_cache(&device, &mut terrain, corner, &config, &tile_sets)
            .unwrap();
        assert_eq!((stats.evictions, stats.live_slots), (15, 1));

        cache.release_device_objects();
        assert_eq!(soft.stats().live_buffers, 0);
    }

    #[test]
    fn over_budget_patches_are_reported() {
        let (_, device, mut terrain) = setup();
        terrain.set_tile(0, 0, 0, Tile::new(TileSetId(0), 0, SurfaceId(1)));
        let bus = DiagnosticBus::new();
        let mut cache = TerrainBatchCache::new();
        cache.set_diagnostics(bus.clone());
        let config = TerrainRenderConfig {
            render_group_budget: 1,
            ..Default::default()
        };
        let stats = cache
            .update_cache(&device, &mut terrain, everything(), &config, &TileSetRegistry::new())
            .unwrap();
        assert_eq!(stats.over_budget, 1);
        let diagnostics = bus.drain();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].source, "terrain");
    }
}
