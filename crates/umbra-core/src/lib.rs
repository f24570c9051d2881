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

//! # Umbra Core
//!
//! Foundational crate containing traits, core types, and interface contracts
//! for the deferred 2D lighting and terrain rendering pipeline.
//!
//! Nothing in here talks to a real graphics API. Backends implement
//! [`renderer::GraphicsDevice`], lanes and agents only ever see the trait.

#![warn(missing_docs)]

pub mod config;
pub mod diagnostics;
pub mod lane;
pub mod math;
pub mod renderer;
pub mod utils;

pub use config::{ConfigError, NamedOptions};
pub use diagnostics::{Diagnostic, DiagnosticBus, Severity, DIAGNOSTIC_CAPACITY};
