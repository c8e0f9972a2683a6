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

//! What the running process reports about itself.
//!
//! Every path-based check falls back to the process's own launch path when
//! no candidate is supplied, and the packaging checks need to know whether a
//! bundler bootloader started us. Both come from a [`ProcessSnapshot`],
//! captured once from the environment or built explicitly by an embedding
//! host.

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// argv[0] values that mean "code executed from a string or stdin".
pub const DYNAMIC_CODE_SENTINELS: &[&str] = &["-c", "-", ""];

/// Environment variables a single-file bundler bootloader exports to the
/// child it unpacks. Any one of them marks the process as frozen.
pub const FROZEN_MARKERS: &[&str] = &["_PYI_ARCHIVE_FILE", "_PYI_APPLICATION_HOME_DIR", "_MEIPASS2"];

/// Variables naming the directory the bundle was extracted to, in lookup order.
pub const BUNDLE_DIR_MARKERS: &[&str] = &["_MEIPASS2", "_PYI_APPLICATION_HOME_DIR"];

/// Prefix of the temporary directory a one-file bundle extracts itself into.
pub const BUNDLE_EXTRACTION_PREFIX: &str = "_MEI";

/// Variables set when the process was started to serve network requests
/// (systemd socket activation, CGI gateways).
pub const SERVER_MARKERS: &[&str] = &["LISTEN_FDS", "SERVER_SOFTWARE", "GATEWAY_INTERFACE"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSnapshot {
    argv0: Option<OsString>,
    interpreter: Option<PathBuf>,
    frozen: bool,
    bundle_dir: Option<PathBuf>,
    serving: bool,
}

impl ProcessSnapshot {
    /// Capture the current process state from `std::env`.
    pub fn capture() -> Self {
        let argv0 = env::args_os().next();
        let interpreter = match env::current_exe() {
            Ok(path) => Some(path),
            Err(e) => {
                log::debug!("current_exe unavailable: {e}");
                None
            }
        };
        let frozen = FROZEN_MARKERS.iter().any(|name| env::var_os(name).is_some());
        let bundle_dir = BUNDLE_DIR_MARKERS
            .iter()
            .filter_map(|name| env::var_os(name))
            .find(|value| !value.is_empty())
            .map(PathBuf::from);
        let serving = SERVER_MARKERS.iter().any(|name| env::var_os(name).is_some());

        let snapshot = Self {
            argv0,
            interpreter,
            frozen,
            bundle_dir,
            serving,
        };
        log::debug!("Captured process snapshot: {snapshot:?}");
        snapshot
    }

    pub fn with_argv0(mut self, argv0: impl Into<OsString>) -> Self {
        self.argv0 = Some(argv0.into());
        self
    }

    pub fn without_argv0(mut self) -> Self {
        self.argv0 = None;
        self
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    pub fn with_frozen(mut self, frozen: bool) -> Self {
        self.frozen = frozen;
        self
    }

    pub fn with_bundle_dir(mut self, bundle_dir: impl Into<PathBuf>) -> Self {
        self.bundle_dir = Some(bundle_dir.into());
        self
    }

    pub fn with_serving(mut self, serving: bool) -> Self {
        self.serving = serving;
        self
    }

    pub fn argv0(&self) -> Option<&OsStr> {
        self.argv0.as_deref()
    }

    /// The launch path, or `None` when argv[0] is missing or is a
    /// dynamic-code sentinel with no file behind it.
    pub fn launch_path(&self) -> Option<&Path> {
        let argv0 = self.argv0.as_deref()?;
        if is_dynamic_code_sentinel(argv0) {
            return None;
        }
        Some(Path::new(argv0))
    }

    pub fn interpreter(&self) -> Option<&Path> {
        self.interpreter.as_deref()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn bundle_dir(&self) -> Option<&Path> {
        self.bundle_dir.as_deref()
    }

    /// Frozen and running from a one-file bundle's extraction directory.
    pub fn is_single_file_bundle(&self) -> bool {
        self.frozen
            && self
                .bundle_dir
                .as_deref()
                .and_then(Path::file_name)
                .is_some_and(|name| name.to_string_lossy().starts_with(BUNDLE_EXTRACTION_PREFIX))
    }

    pub fn is_serving(&self) -> bool {
        self.serving
    }
}

pub fn is_dynamic_code_sentinel(argv0: &OsStr) -> bool {
    DYNAMIC_CODE_SENTINELS.iter().any(|sentinel| argv0 == *sentinel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_hide_launch_path() {
        for sentinel in DYNAMIC_CODE_SENTINELS {
            let snapshot = ProcessSnapshot::default().with_argv0(*sentinel);
            assert!(snapshot.launch_path().is_none(), "sentinel {sentinel:?}");
            assert!(snapshot.argv0().is_some());
        }
    }

    #[test]
    fn test_launch_path_passthrough() {
        let snapshot = ProcessSnapshot::default().with_argv0("./bin/tool");
        assert_eq!(snapshot.launch_path(), Some(Path::new("./bin/tool")));
        assert!(ProcessSnapshot::default().launch_path().is_none());
    }

    #[test]
    fn test_single_file_bundle_requires_both_markers() {
        let extraction = std::env::temp_dir().join("_MEI123456");

        let frozen_only = ProcessSnapshot::default().with_frozen(true);
        assert!(!frozen_only.is_single_file_bundle());

        let dir_only = ProcessSnapshot::default().with_bundle_dir(&extraction);
        assert!(!dir_only.is_single_file_bundle());

        let onedir = ProcessSnapshot::default()
            .with_frozen(true)
            .with_bundle_dir("/opt/app/_internal");
        assert!(!onedir.is_single_file_bundle());

        let onefile = ProcessSnapshot::default()
            .with_frozen(true)
            .with_bundle_dir(&extraction);
        assert!(onefile.is_single_file_bundle());
    }

    #[test]
    fn test_capture_reports_interpreter() {
        let snapshot = ProcessSnapshot::capture();
        assert!(snapshot.interpreter().is_some());
        assert!(snapshot.argv0().is_some());
    }
}
