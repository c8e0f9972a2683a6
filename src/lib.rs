// Copyright 2025 dentsusoken
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

//! Executable identity and runtime environment introspection.
//!
//! [`Habitat`] bundles the detectors: path resolution and format
//! classification for the running executable, packaging context, platform
//! identification and memoized capability probes.

pub mod capability;
pub mod classify;
pub mod commands;
pub mod config;
pub mod error;
pub mod habitat;
pub mod launch;
pub mod logging;
pub mod memo;
pub mod packaging;
pub mod paths;
pub mod platform;
pub mod process;
pub mod registry;

pub use capability::{Capability, CapabilityFlags, CapabilityProbe};
pub use classify::{FormatClassification, MagicByteClassifier};
pub use config::HabitatConfig;
pub use error::{HabitatError, Result};
pub use habitat::{Habitat, Inspection};
pub use packaging::{PackagingContext, PackagingContextDetector};
pub use paths::{PathResolver, Resolution};
pub use platform::{PlatformIdentifier, PlatformReport, PlatformTag, SystemProbe};
pub use process::ProcessSnapshot;
