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

use crate::packaging::isolated::{self, IsolatedInstallLayout};
use crate::process::ProcessSnapshot;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};

/// Whether `resolve` also rejects paths managed by an isolated-install tool.
///
/// The isolated-install check itself resolves paths, so it always passes
/// `Disabled`; that keeps detector -> resolver -> detector bounded at one
/// level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackagingCheck {
    Enabled,
    Disabled,
}

/// A candidate path after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutablePath {
    raw: Option<OsString>,
    resolved: Option<PathBuf>,
    exists: bool,
}

impl ExecutablePath {
    /// The path as supplied (or argv[0] when none was supplied).
    pub fn raw(&self) -> Option<&OsStr> {
        self.raw.as_deref()
    }

    /// Absolute form of `raw`; present even when the file does not exist.
    pub fn resolved(&self) -> Option<&Path> {
        self.resolved.as_deref()
    }

    /// True only for an existing regular file.
    pub fn exists(&self) -> bool {
        self.exists
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub path: ExecutablePath,
    pub valid: bool,
}

impl Resolution {
    fn invalid(path: ExecutablePath) -> Self {
        Self { path, valid: false }
    }

    /// The resolved path, only when it is valid for further inspection.
    pub fn valid_path(&self) -> Option<&Path> {
        if self.valid { self.path.resolved() } else { None }
    }
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    process: ProcessSnapshot,
    layout: IsolatedInstallLayout,
}

impl PathResolver {
    pub fn new(process: ProcessSnapshot, layout: IsolatedInstallLayout) -> Self {
        Self { process, layout }
    }

    pub fn from_environment() -> Self {
        Self::new(ProcessSnapshot::capture(), IsolatedInstallLayout::discover())
    }

    pub fn process(&self) -> &ProcessSnapshot {
        &self.process
    }

    pub fn layout(&self) -> &IsolatedInstallLayout {
        &self.layout
    }

    /// Normalize `candidate` (or the process launch path) and validate it.
    ///
    /// Never fails: missing files, permission errors and dynamic-code
    /// launch paths all come back as `exists=false`.
    pub fn resolve(&self, candidate: Option<&Path>, check: PackagingCheck) -> Resolution {
        let raw = match candidate {
            Some(path) => Some(path.as_os_str().to_os_string()),
            None => self
                .own_executable()
                .map(|path| path.as_os_str().to_os_string()),
        };

        let Some(raw) = raw else {
            log::debug!(
                "No inspectable path: argv[0] is {:?}",
                self.process.argv0()
            );
            return Resolution::invalid(ExecutablePath {
                raw: self.process.argv0().map(OsStr::to_os_string),
                resolved: None,
                exists: false,
            });
        };

        let resolved = absolutize(Path::new(&raw));
        let exists = resolved.as_deref().is_some_and(is_regular_file);
        log::debug!("Checking executable path: {raw:?} -> {resolved:?} (file: {exists})");

        let path = ExecutablePath {
            raw: Some(raw),
            resolved,
            exists,
        };
        if !exists {
            return Resolution::invalid(path);
        }

        if check == PackagingCheck::Enabled
            && let Some(matched) = isolated::detect_isolated_install(self, path.resolved())
        {
            log::debug!("Path rejected: managed by an isolated-install tool ({matched:?})");
            return Resolution::invalid(path);
        }

        Resolution { path, valid: true }
    }

    /// The path that stands for this process when no candidate is given.
    ///
    /// A bare argv[0] was found through `PATH`, so it says nothing about the
    /// current directory; it and any launch path that is not a regular file
    /// give way to the interpreter path.
    fn own_executable(&self) -> Option<&Path> {
        let launch = self.process.launch_path()?;
        let bare = launch
            .parent()
            .is_none_or(|parent| parent.as_os_str().is_empty());
        if !bare && absolutize(launch).as_deref().is_some_and(is_regular_file) {
            return Some(launch);
        }
        match self.process.interpreter() {
            Some(interpreter) => {
                log::debug!("argv[0] {launch:?} is not a file path; using {interpreter:?}");
                Some(interpreter)
            }
            None => Some(launch),
        }
    }
}

/// Canonicalize when the target exists, otherwise make it absolute lexically.
pub(crate) fn absolutize(path: &Path) -> Option<PathBuf> {
    if path.as_os_str().is_empty() {
        return None;
    }
    match fs::canonicalize(path) {
        Ok(canonical) => Some(canonical),
        Err(e) => {
            log::debug!("canonicalize({path:?}) failed: {e}");
            std::path::absolute(path).ok()
        }
    }
}

fn is_regular_file(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(metadata) => metadata.is_file(),
        Err(e) => {
            log::debug!("metadata({path:?}) failed: {e}");
            false
        }
    }
}
