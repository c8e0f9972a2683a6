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

//! How an executable was packaged and delivered.

pub mod isolated;
pub mod sandbox;
pub mod source_tree;

use crate::classify::{FormatClassification, MagicByteClassifier};
use crate::paths::{PackagingCheck, PathResolver};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub use isolated::{IsolatedInstallLayout, IsolationMatch, detect_isolated_install};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackagingContext {
    IsolatedInstall,
    Frozen,
    SandboxedPackage,
    ZipBundle,
    SourceTree,
    Unknown,
}

impl fmt::Display for PackagingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PackagingContext::IsolatedInstall => "isolated install",
            PackagingContext::Frozen => "frozen bundle",
            PackagingContext::SandboxedPackage => "sandboxed package",
            PackagingContext::ZipBundle => "zip bundle",
            PackagingContext::SourceTree => "source tree",
            PackagingContext::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct PackagingContextDetector {
    resolver: PathResolver,
    classifier: MagicByteClassifier,
    git_timeout: Duration,
}

impl PackagingContextDetector {
    pub fn new(resolver: PathResolver, classifier: MagicByteClassifier) -> Self {
        Self {
            resolver,
            classifier,
            git_timeout: source_tree::DEFAULT_GIT_TIMEOUT,
        }
    }

    /// Bound on the `git rev-parse` query behind [`Self::is_source_tree`].
    pub fn with_git_timeout(mut self, timeout: Duration) -> Self {
        self.git_timeout = timeout;
        self
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn classifier(&self) -> &MagicByteClassifier {
        &self.classifier
    }

    /// First matching context for `candidate` (or the process launch path).
    pub fn detect(&self, candidate: Option<&Path>) -> PackagingContext {
        let context = if self.is_isolated_install(candidate) {
            PackagingContext::IsolatedInstall
        } else if self.is_single_file_bundle() {
            PackagingContext::Frozen
        } else if self.is_sandboxed_package() {
            PackagingContext::SandboxedPackage
        } else if self.is_zip_bundle(candidate) {
            PackagingContext::ZipBundle
        } else if self.is_source_tree(candidate) {
            PackagingContext::SourceTree
        } else {
            PackagingContext::Unknown
        };

        log::debug!("Packaging context: {context}");
        context
    }

    pub fn is_isolated_install(&self, candidate: Option<&Path>) -> bool {
        detect_isolated_install(&self.resolver, candidate).is_some()
    }

    /// Any bundler bootloader marker, one-dir or one-file.
    pub fn is_frozen(&self) -> bool {
        self.resolver.process().is_frozen()
    }

    pub fn is_single_file_bundle(&self) -> bool {
        self.resolver.process().is_single_file_bundle()
    }

    pub fn is_sandboxed_package(&self) -> bool {
        sandbox::has_package_identity()
    }

    pub fn is_zip_bundle(&self, candidate: Option<&Path>) -> bool {
        self.valid_path(candidate)
            .is_some_and(|path| self.classifier.classify(&path) == FormatClassification::ZipArchive)
    }

    pub fn is_source_tree(&self, candidate: Option<&Path>) -> bool {
        self.valid_path(candidate)
            .is_some_and(|path| source_tree::in_source_tree(&path, self.git_timeout))
    }

    fn valid_path(&self, candidate: Option<&Path>) -> Option<std::path::PathBuf> {
        self.resolver
            .resolve(candidate, PackagingCheck::Disabled)
            .valid_path()
            .map(Path::to_path_buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessSnapshot;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    fn detector(process: ProcessSnapshot, home: &Path) -> PackagingContextDetector {
        PackagingContextDetector::new(
            PathResolver::new(process, IsolatedInstallLayout::for_home(home)),
            MagicByteClassifier::default(),
        )
    }

    #[test]
    fn test_isolated_install_wins() {
        let temp_dir = TempDir::new().unwrap();
        let home = temp_dir.path();
        let venv_bin = home.join(".local/share/pipx/venvs/tool/bin");
        fs::create_dir_all(&venv_bin).unwrap();
        fs::create_dir(home.join(".git")).unwrap();
        let exe = venv_bin.join("tool");
        fs::write(&exe, b"#!/usr/bin/env python\n").unwrap();

        let detector = detector(ProcessSnapshot::default(), home);
        assert_eq!(detector.detect(Some(&exe)), PackagingContext::IsolatedInstall);
    }

    #[test]
    fn test_single_file_bundle_is_frozen() {
        let temp_dir = TempDir::new().unwrap();
        let exe = temp_dir.path().join("app");
        fs::write(&exe, b"\x7fELF").unwrap();

        let process = ProcessSnapshot::default()
            .with_frozen(true)
            .with_bundle_dir(temp_dir.path().join("_MEI12345"));
        let detector = detector(process, temp_dir.path());
        assert!(detector.is_frozen());
        assert_eq!(detector.detect(Some(&exe)), PackagingContext::Frozen);
    }

    #[test]
    fn test_one_dir_bundle_is_not_single_file() {
        let temp_dir = TempDir::new().unwrap();
        let process = ProcessSnapshot::default()
            .with_frozen(true)
            .with_bundle_dir(temp_dir.path().join("dist"));
        let detector = detector(process, temp_dir.path());
        assert!(detector.is_frozen());
        assert!(!detector.is_single_file_bundle());
    }

    #[test]
    fn test_zip_bundle() {
        let temp_dir = TempDir::new().unwrap();
        let bundle = temp_dir.path().join("app.pyz");
        let mut writer = zip::ZipWriter::new(fs::File::create(&bundle).unwrap());
        writer
            .start_file("__main__.py", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"print('hi')\n").unwrap();
        writer.finish().unwrap();

        let detector = detector(ProcessSnapshot::default(), temp_dir.path());
        assert_eq!(detector.detect(Some(&bundle)), PackagingContext::ZipBundle);
    }

    #[test]
    fn test_source_tree() {
        let temp_dir = TempDir::new().unwrap();
        let repo = temp_dir.path().join("repo");
        fs::create_dir_all(repo.join(".git")).unwrap();
        let script = repo.join("main.py");
        fs::write(&script, b"print(1)\n").unwrap();

        let detector = detector(ProcessSnapshot::default(), temp_dir.path());
        assert_eq!(detector.detect(Some(&script)), PackagingContext::SourceTree);
    }

    #[test]
    fn test_source_tree_from_git_repository() {
        let temp_dir = TempDir::new().unwrap();
        let repo = temp_dir.path().join("checkout");
        fs::create_dir(&repo).unwrap();
        let init = std::process::Command::new("git")
            .args(["init", "--quiet"])
            .current_dir(&repo)
            .status();
        if !init.is_ok_and(|status| status.success()) {
            return;
        }
        let script = repo.join("tool.py");
        fs::write(&script, b"print(1)\n").unwrap();

        let detector = detector(ProcessSnapshot::default(), temp_dir.path())
            .with_git_timeout(Duration::from_secs(5));
        assert!(detector.is_source_tree(Some(&script)));
        assert_eq!(detector.detect(Some(&script)), PackagingContext::SourceTree);
    }

    #[test]
    fn test_missing_path_is_unknown() {
        let temp_dir = TempDir::new().unwrap();
        let detector = detector(ProcessSnapshot::default(), temp_dir.path());
        assert_eq!(
            detector.detect(Some(&temp_dir.path().join("missing"))),
            PackagingContext::Unknown
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(PackagingContext::ZipBundle.to_string(), "zip bundle");
        assert_eq!(PackagingContext::Unknown.to_string(), "unknown");
    }
}
