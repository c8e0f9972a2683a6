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

//! Detection of applications installed by pipx into per-application venvs.

use crate::paths::resolver::{PackagingCheck, PathResolver, absolutize};
use std::env;
use std::path::{Path, PathBuf};

pub const BIN_DIR_ENV: &str = "PIPX_BIN_DIR";
pub const HOME_ENV: &str = "PIPX_HOME";

/// Path fragment present in every pipx-managed interpreter or entry point.
pub const VENV_SIGNATURE: &str = "pipx/venvs";

const VENVS_DIR: &str = "venvs";

/// Which rule flagged a path as isolated-install managed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationMatch {
    Signature,
    InterpreterBase,
    ExecutableBase,
}

/// Where the isolated-install tool puts entry points and environments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolatedInstallLayout {
    bin_dir: PathBuf,
    venv_base: PathBuf,
}

impl IsolatedInstallLayout {
    /// Honor `PIPX_BIN_DIR` / `PIPX_HOME`, falling back to the defaults under
    /// the user's home directory.
    pub fn discover() -> Self {
        let home = dirs::home_dir().unwrap_or_default();
        let defaults = Self::for_home(&home);

        let bin_dir = match env::var_os(BIN_DIR_ENV).filter(|value| !value.is_empty()) {
            Some(value) => resolve_dir(Path::new(&value)),
            None => defaults.bin_dir,
        };
        let venv_base = match env::var_os(HOME_ENV).filter(|value| !value.is_empty()) {
            Some(value) => resolve_dir(&Path::new(&value).join(VENVS_DIR)),
            None => defaults.venv_base,
        };

        let layout = Self { bin_dir, venv_base };
        log::debug!("Isolated-install layout: {layout:?}");
        layout
    }

    /// The layout used when no override variables are set.
    pub fn for_home(home: &Path) -> Self {
        if home.as_os_str().is_empty() {
            return Self {
                bin_dir: PathBuf::new(),
                venv_base: PathBuf::new(),
            };
        }
        Self {
            bin_dir: home.join(".local").join("bin"),
            venv_base: resolve_dir(
                &home
                    .join(".local")
                    .join("share")
                    .join("pipx")
                    .join(VENVS_DIR),
            ),
        }
    }

    pub fn from_parts(bin_dir: impl Into<PathBuf>, venv_base: impl Into<PathBuf>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
            venv_base: venv_base.into(),
        }
    }

    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    pub fn venv_base(&self) -> &Path {
        &self.venv_base
    }

    /// Apply the three rules in order: signature, interpreter base,
    /// executable base. First match wins.
    pub fn classify(&self, executable: &Path, interpreter: Option<&Path>) -> Option<IsolationMatch> {
        let exec = normalize(executable);
        let interp = interpreter.map(normalize);

        if exec.contains(VENV_SIGNATURE)
            || interp.as_deref().is_some_and(|i| i.contains(VENV_SIGNATURE))
        {
            return Some(IsolationMatch::Signature);
        }

        let base = normalize(&self.venv_base);
        if base.is_empty() {
            return None;
        }

        if interp.as_deref().is_some_and(|i| is_under(i, &base)) {
            return Some(IsolationMatch::InterpreterBase);
        }

        if is_under(&exec, &base) {
            return Some(IsolationMatch::ExecutableBase);
        }

        None
    }
}

/// Resolve `candidate` without the resolver's own packaging check and test it
/// against the resolver's layout and interpreter.
pub fn detect_isolated_install(
    resolver: &PathResolver,
    candidate: Option<&Path>,
) -> Option<IsolationMatch> {
    let resolution = resolver.resolve(candidate, PackagingCheck::Disabled);
    let executable = resolution.valid_path()?;

    let interpreter = resolver.process().interpreter().and_then(absolutize);
    let layout = resolver.layout();

    log::debug!("EXEC_PATH: {}", executable.display());
    log::debug!("INTERP_PATH: {interpreter:?}");
    log::debug!("BIN_DIR: {}", layout.bin_dir().display());
    log::debug!("VENV_BASE: {}", layout.venv_base().display());

    let matched = layout.classify(executable, interpreter.as_deref());
    match matched {
        Some(rule) => log::debug!("Isolated install detected by {rule:?} rule"),
        None => log::debug!("Not an isolated install"),
    }
    matched
}

fn resolve_dir(path: &Path) -> PathBuf {
    absolutize(path).unwrap_or_else(|| path.to_path_buf())
}

/// Lower-case, forward-slash form used for every comparison.
fn normalize(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

fn is_under(path: &str, base: &str) -> bool {
    let base = base.trim_end_matches('/');
    path == base
        || path
            .strip_prefix(base)
            .is_some_and(|rest| rest.starts_with('/'))
}
