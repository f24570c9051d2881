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

//! # Lane Abstraction
//!
//! A **Lane** is one self-contained rendering component owned by the render
//! agent: the lighting compositor, the terrain batch cache, and so on.
//!
//! Lanes own device resources. The agent drives their lifecycle explicitly
//! through [`Lane::on_initialize`] and [`Lane::on_shutdown`], which must both be
//! idempotent so that a device-loss cycle can call them in any order.

use crate::renderer::api::resources::GraphicsResources;
use crate::renderer::error::RenderError;
use std::fmt;

/// Error type for lane operations.
#[derive(Debug)]
pub enum LaneError {
    /// Creating or using a device object failed.
    Render(RenderError),
}

impl fmt::Display for LaneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneError::Render(e) => write!(f, "Lane execution failed: {e}"),
        }
    }
}

impl std::error::Error for LaneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaneError::Render(e) => Some(e),
        }
    }
}

impl From<RenderError> for LaneError {
    fn from(e: RenderError) -> Self {
        LaneError::Render(e)
    }
}

/// Classification of lane types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneKind {
    /// Light accumulation and final light mask.
    Lighting,
    /// Cached terrain geometry.
    Terrain,
}

impl fmt::Display for LaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneKind::Lighting => write!(f, "Lighting"),
            LaneKind::Terrain => write!(f, "Terrain"),
        }
    }
}

/// The common interface of every lane.
pub trait Lane: Send + Sync {
    /// Human-readable strategy name, used in logs.
    fn strategy_name(&self) -> &'static str;

    /// The kind of work this lane performs.
    fn lane_kind(&self) -> LaneKind;

    /// Creates the lane's device objects. Calling it twice is a no-op.
    fn on_initialize(&mut self, _resources: &GraphicsResources) -> Result<(), LaneError> {
        Ok(())
    }

    /// Releases every device object the lane owns. Calling it twice is a no-op.
    fn on_shutdown(&mut self) {}
}
