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

//! Acts as the **[A]gent** for the rendering subsystem.
//!
//! The agent owns the lighting and terrain lanes and drives them through a
//! frame: terrain cache update, light selection, light accumulation, then
//! presentation of the diffuse scene with the light mask multiplied over it.
//! It also owns the device-object lifecycle, tearing everything down when
//! the device is lost and rebuilding it on request.

mod agent;

pub use agent::*;
