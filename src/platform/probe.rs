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

//! Sources of platform evidence.
//!
//! Detection never touches `std::env` or the filesystem directly; it asks a
//! [`SystemProbe`], so hosts and tests can answer for a machine they are not
//! running on.

use std::env;
use std::fs;
use std::io;
use std::path::Path;
use sysinfo::System;

#[cfg_attr(test, mockall::automock)]
pub trait SystemProbe: Send + Sync {
    /// Value of an environment variable; `None` when unset or not unicode.
    fn env_var(&self, name: &str) -> Option<String>;

    fn path_exists(&self, path: &Path) -> bool;

    fn is_dir(&self, path: &Path) -> bool;

    /// Contents of a small text file; `None` when missing or unreadable.
    fn read_to_string(&self, path: &Path) -> Option<String>;

    /// Kernel release string as reported by the OS.
    fn kernel_release(&self) -> Option<String>;

    /// Compile-target OS name (`std::env::consts::OS`).
    fn target_os(&self) -> String;
}

/// Answers from the machine the process is running on.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostSystem;

impl SystemProbe for HostSystem {
    fn env_var(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }

    fn path_exists(&self, path: &Path) -> bool {
        metadata(path).is_some()
    }

    fn is_dir(&self, path: &Path) -> bool {
        metadata(path).is_some_and(|m| m.is_dir())
    }

    fn read_to_string(&self, path: &Path) -> Option<String> {
        match fs::read_to_string(path) {
            Ok(contents) => Some(contents),
            Err(e) => {
                log_io_error(path, &e);
                None
            }
        }
    }

    fn kernel_release(&self) -> Option<String> {
        System::kernel_version()
    }

    fn target_os(&self) -> String {
        env::consts::OS.to_string()
    }
}

fn metadata(path: &Path) -> Option<fs::Metadata> {
    match fs::metadata(path) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            log_io_error(path, &e);
            None
        }
    }
}

/// Missing and forbidden files are ordinary negative evidence; anything else
/// is worth a warning but still counts as absent.
fn log_io_error(path: &Path, error: &io::Error) {
    match error.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
            log::debug!("{}: {error}", path.display());
        }
        _ => log::warn!("Unexpected error reading {}: {error}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn host_filesystem_answers() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("osrelease");
        fs::write(&file, "6.6.0-microsoft-standard-WSL2\n").unwrap();

        let host = HostSystem;
        assert!(host.path_exists(&file));
        assert!(!host.is_dir(&file));
        assert!(host.is_dir(temp_dir.path()));
        assert_eq!(
            host.read_to_string(&file).as_deref(),
            Some("6.6.0-microsoft-standard-WSL2\n")
        );

        let missing = temp_dir.path().join("missing");
        assert!(!host.path_exists(&missing));
        assert!(host.read_to_string(&missing).is_none());
    }

    #[test]
    fn host_target_os_matches_build() {
        assert_eq!(HostSystem.target_os(), env::consts::OS);
    }
}
