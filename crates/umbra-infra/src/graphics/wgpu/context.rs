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

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use umbra_core::renderer::ResourceError;

/// Features every pipeline target relies on: blending into and filtering
/// from 32-bit float textures.
pub const REQUIRED_FEATURES: wgpu::Features =
    wgpu::Features::FLOAT32_BLENDABLE.union(wgpu::Features::FLOAT32_FILTERABLE);

/// Holds the core WGPU objects of a headless device: no window, no swap
/// chain. The presentable surface is an offscreen texture owned by the
/// device.
#[derive(Debug)]
pub struct WgpuGraphicsContext {
    /// The logical device.
    pub device: wgpu::Device,
    /// Its command queue.
    pub queue: wgpu::Queue,

    /// Name reported by the adapter.
    pub adapter_name: String,
    /// Kind of adapter (integrated, discrete, CPU...).
    pub adapter_device_type: wgpu::DeviceType,
    /// Limits the device was opened with.
    pub device_limits: wgpu::Limits,

    /// Set by the device-lost callback.
    pub lost: Arc<AtomicBool>,
}

impl WgpuGraphicsContext {
    /// Picks the default adapter and opens a logical device on it.
    ///
    /// Fails when no adapter is present or when it lacks
    /// [`REQUIRED_FEATURES`].
    pub async fn new_headless() -> Result<Self, ResourceError> {
        log::info!("Initializing headless WGPU graphics context...");
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| ResourceError::BackendError(format!("No graphics adapter: {e}")))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Using graphics adapter: \"{}\" (Backend: {:?})",
            adapter_info.name,
            adapter_info.backend
        );
        let missing = REQUIRED_FEATURES - adapter.features();
        if !missing.is_empty() {
            return Err(ResourceError::BackendError(format!(
                "Adapter \"{}\" lacks required features {missing:?}",
                adapter_info.name
            )));
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Umbra Logical Device"),
                required_features: REQUIRED_FEATURES,
                required_limits: wgpu::Limits::default(),
                experimental_features: Default::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| ResourceError::BackendError(format!("Failed to create logical device: {e}")))?;
        log::info!("Logical device and command queue created.");

        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            log::error!("WGPU device lost ({reason:?}): {message}");
            flag.store(true, Ordering::SeqCst);
        });

        let device_limits = device.limits();
        Ok(Self {
            device,
            queue,
            adapter_name: adapter_info.name,
            adapter_device_type: adapter_info.device_type,
            device_limits,
            lost,
        })
    }

    /// Returns `true` once the driver reported the device lost.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }
}
