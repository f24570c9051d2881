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

//! Defines the hierarchy of error types for the rendering subsystem.
//!
//! Two failure classes matter to the pipeline. A [`ResourceError`] is local:
//! the dependent sub-pass is skipped for one frame. [`RenderError::DeviceLost`]
//! is total: every device object is torn down and recreated.

use std::fmt;

/// An error related to the creation or use of a device resource (buffers, textures).
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceError {
    /// A generic resource could not be found.
    NotFound,
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// The device refused to allocate the resource.
    AllocationFailed {
        /// Label of the resource being created.
        label: String,
        /// Requested size in bytes.
        bytes: usize,
    },
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
    /// An attempt was made to access a resource out of its bounds.
    OutOfBounds,
    /// The device was lost while handling the resource.
    DeviceLost,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::AllocationFailed { label, bytes } => {
                write!(f, "Failed to allocate {bytes} bytes for '{label}'")
            }
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
            ResourceError::OutOfBounds => write!(f, "Resource access out of bounds."),
            ResourceError::DeviceLost => write!(f, "The device owning the resource was lost."),
        }
    }
}

impl std::error::Error for ResourceError {}

/// A high-level error that can occur within the rendering system or graphics device.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// An operation was attempted before device objects were created.
    NotInitialized,
    /// A rendering operation was invalid (e.g. sampling the pass target).
    RenderingFailed(String),
    /// An error occurred while managing a device resource.
    ResourceError(ResourceError),
    /// The graphics device was lost. Every device object must be recreated.
    DeviceLost,
}

impl RenderError {
    /// Returns `true` for the device-loss case, which callers must never swallow.
    #[inline]
    pub fn is_device_lost(&self) -> bool {
        matches!(self, RenderError::DeviceLost)
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotInitialized => {
                write!(f, "The rendering system is not initialized.")
            }
            RenderError::RenderingFailed(msg) => {
                write!(f, "A rendering operation failed: {msg}")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::DeviceLost => write!(
                f,
                "The graphics device was lost and needs to be reinitialized."
            ),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::DeviceLost => RenderError::DeviceLost,
            other => RenderError::ResourceError(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn render_error_display_wrapping_resource_error() {
        let err: RenderError = ResourceError::AllocationFailed {
            label: "swap".to_string(),
            bytes: 1024,
        }
        .into();
        assert_eq!(
            format!("{err}"),
            "Graphics resource operation failed: Failed to allocate 1024 bytes for 'swap'"
        );
        assert!(err.source().is_some());
        assert!(!err.is_device_lost());
    }

    #[test]
    fn device_lost_is_flagged() {
        assert!(RenderError::DeviceLost.is_device_lost());
        assert!(RenderError::from(ResourceError::DeviceLost).is_device_lost());
        assert!(RenderError::DeviceLost.source().is_none());
    }
}
