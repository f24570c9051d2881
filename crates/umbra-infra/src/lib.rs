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

//! # Umbra Infra
//!
//! Concrete implementations of the contracts defined in `umbra-core`.
//!
//! Two backends implement [`GraphicsDevice`](umbra_core::renderer::GraphicsDevice):
//!
//! - [`WgpuDevice`] renders on a headless GPU adapter through wgpu.
//! - [`SoftwareDevice`] is a CPU rasterizer. It renders the full lighting
//!   pipeline deterministically, which makes it the reference for every
//!   pixel comparison in the tests and the fallback when no adapter exists.

#![warn(missing_docs)]

pub mod graphics;

pub use graphics::{SoftwareDevice, SoftwareDeviceStats, WgpuDevice};
