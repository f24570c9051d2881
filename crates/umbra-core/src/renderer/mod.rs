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

//! Provides the public, backend-agnostic rendering contracts.
//!
//! This module defines the "common language" of the pipeline: the abstract
//! [`GraphicsDevice`] and [`RenderPassEncoder`] traits, descriptors, RAII
//! handles, the pass context every renderable consults, lights and the
//! runtime configuration. Backends live in `umbra-infra`; lanes and agents
//! only use these contracts.

pub mod api;
pub mod error;
pub mod light;
pub mod pass;
pub mod settings;
pub mod traits;

pub use self::api::*;
pub use self::error::{RenderError, ResourceError};
pub use self::light::{Light2D, LightCone};
pub use self::pass::{PassContext, RenderPass};
pub use self::settings::{LightingConfig, TerrainRenderConfig};
pub use self::traits::{GraphicsDevice, RenderPassEncoder, SceneRenderable};
