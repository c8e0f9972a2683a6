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

//! One object owning every detector, with the configuration applied.

use crate::capability::{CapabilityProbe, CapabilitySettings};
use crate::classify::{FormatClassification, MagicByteClassifier};
use crate::config::HabitatConfig;
use crate::packaging::{IsolatedInstallLayout, PackagingContext, PackagingContextDetector};
use crate::paths::resolver::absolutize;
use crate::paths::{PackagingCheck, PathResolver, Resolution};
use crate::platform::PlatformIdentifier;
use crate::process::ProcessSnapshot;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Everything known about one inspected path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inspection {
    pub raw: Option<String>,
    pub resolved: Option<PathBuf>,
    pub exists: bool,
    pub valid: bool,
    pub format: FormatClassification,
    pub packaging: PackagingContext,
}

#[derive(Debug)]
pub struct Habitat {
    config: HabitatConfig,
    detector: PackagingContextDetector,
    platform: Arc<PlatformIdentifier>,
    capabilities: CapabilityProbe,
}

impl Habitat {
    /// Inspect the current process and host.
    pub fn new(config: HabitatConfig) -> Self {
        Self::from_parts(
            config,
            ProcessSnapshot::capture(),
            IsolatedInstallLayout::discover(),
            PlatformIdentifier::new(),
        )
    }

    pub fn from_parts(
        config: HabitatConfig,
        process: ProcessSnapshot,
        layout: IsolatedInstallLayout,
        platform: PlatformIdentifier,
    ) -> Self {
        let serving = process.is_serving();
        let platform = Arc::new(platform);
        let detector = PackagingContextDetector::new(
            PathResolver::new(process, layout),
            MagicByteClassifier::from_config(&config.classify),
        )
        .with_git_timeout(config.shell_timeout());
        let capabilities = CapabilityProbe::new(
            CapabilitySettings::from_config(&config),
            Arc::clone(&platform),
            serving,
        );

        Self {
            config,
            detector,
            platform,
            capabilities,
        }
    }

    pub fn config(&self) -> &HabitatConfig {
        &self.config
    }

    pub fn process(&self) -> &ProcessSnapshot {
        self.detector.resolver().process()
    }

    pub fn resolver(&self) -> &PathResolver {
        self.detector.resolver()
    }

    pub fn classifier(&self) -> &MagicByteClassifier {
        self.detector.classifier()
    }

    pub fn detector(&self) -> &PackagingContextDetector {
        &self.detector
    }

    pub fn platform(&self) -> &PlatformIdentifier {
        &self.platform
    }

    pub fn capabilities(&self) -> &CapabilityProbe {
        &self.capabilities
    }

    /// Resolve with the isolated-install check enabled.
    pub fn resolve(&self, candidate: Option<&Path>) -> Resolution {
        self.resolver().resolve(candidate, PackagingCheck::Enabled)
    }

    /// Format of `candidate`; files managed by an isolated-install tool are
    /// still classified.
    pub fn classify(&self, candidate: Option<&Path>) -> FormatClassification {
        let resolution = self.resolver().resolve(candidate, PackagingCheck::Disabled);
        match resolution.valid_path() {
            Some(path) => self.classifier().classify(path),
            None => FormatClassification::Unknown,
        }
    }

    pub fn packaging_context(&self, candidate: Option<&Path>) -> PackagingContext {
        self.detector.detect(candidate)
    }

    pub fn inspect(&self, candidate: Option<&Path>) -> Inspection {
        let resolution = self.resolve(candidate);
        Inspection {
            raw: resolution
                .path
                .raw()
                .map(|raw| raw.to_string_lossy().into_owned()),
            resolved: resolution.path.resolved().map(Path::to_path_buf),
            exists: resolution.path.exists(),
            valid: resolution.valid,
            format: self.classify(candidate),
            packaging: self.packaging_context(candidate),
        }
    }

    /// Absolute path of the running interpreter (this executable).
    pub fn interpreter_path(&self) -> Option<PathBuf> {
        self.process().interpreter().and_then(absolutize)
    }

    /// Drop every memoized platform and capability answer.
    pub fn reset(&self) {
        self.capabilities.reset_all();
        self.platform.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::HostSystem;
    use std::fs;
    use tempfile::TempDir;

    fn habitat_for(home: &Path, process: ProcessSnapshot) -> Habitat {
        Habitat::from_parts(
            HabitatConfig::default(),
            process,
            IsolatedInstallLayout::for_home(home),
            PlatformIdentifier::with_system(HostSystem, None),
        )
    }

    #[test]
    fn test_isolated_install_is_classified_but_not_valid() {
        let temp_dir = TempDir::new().unwrap();
        let bin = temp_dir.path().join(".local/share/pipx/venvs/tool/bin");
        fs::create_dir_all(&bin).unwrap();
        let exe = bin.join("tool");
        fs::write(&exe, b"\x7fELF\x02\x01\x01").unwrap();

        let habitat = habitat_for(temp_dir.path(), ProcessSnapshot::default());
        let inspection = habitat.inspect(Some(&exe));

        assert!(inspection.exists);
        assert!(!inspection.valid);
        assert_eq!(inspection.format, FormatClassification::Elf);
        assert_eq!(inspection.packaging, PackagingContext::IsolatedInstall);
    }

    #[test]
    fn test_sentinel_launch_path() {
        let temp_dir = TempDir::new().unwrap();
        let habitat = habitat_for(temp_dir.path(), ProcessSnapshot::default().with_argv0("-c"));
        let inspection = habitat.inspect(None);

        assert!(!inspection.exists);
        assert_eq!(inspection.resolved, None);
        assert_eq!(inspection.format, FormatClassification::Unknown);
        assert_eq!(inspection.packaging, PackagingContext::Unknown);
    }

    #[test]
    fn test_custom_suffix_from_config() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = HabitatConfig::default();
        config.classify.script_suffix = "rb".to_string();
        let habitat = Habitat::from_parts(
            config,
            ProcessSnapshot::default(),
            IsolatedInstallLayout::for_home(temp_dir.path()),
            PlatformIdentifier::with_system(HostSystem, None),
        );

        let script = temp_dir.path().join("tool.rb");
        fs::write(&script, b"puts 1\n").unwrap();
        assert_eq!(habitat.classify(Some(&script)), FormatClassification::PlainScript);
    }

    #[test]
    fn test_reset_clears_capabilities() {
        let temp_dir = TempDir::new().unwrap();
        let habitat = habitat_for(temp_dir.path(), ProcessSnapshot::default());
        habitat.capabilities().headless_image_export_available();
        habitat.reset();
        assert!(
            habitat
                .capabilities()
                .flags()
                .iter()
                .all(|(_, state)| !state.computed)
        );
    }
}
