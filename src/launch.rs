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

//! Opening files and folders with whatever the host environment provides.
//!
//! Each helper builds an ordered list of [`LaunchPlan`]s from the platform
//! and capability answers and runs them until one succeeds.

use crate::error::{HabitatError, Result};
use crate::habitat::Habitat;
use crate::platform::process::run_with_timeout;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

const GUI_EDITORS: &[&str] = &["gedit", "mousepad", "kate", "xed", "code"];
const TERMINAL_EDITOR: &str = "nano";
const WSLPATH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Run to completion and require a zero exit status.
    Wait,
    /// Start and return immediately; output is discarded.
    Detach,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub mode: LaunchMode,
}

impl LaunchPlan {
    fn new(program: impl Into<OsString>, path: &Path, mode: LaunchMode) -> Self {
        Self {
            program: program.into(),
            args: vec![path.as_os_str().to_os_string()],
            mode,
        }
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    pub fn run(&self) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        log::debug!("Launching {cmd:?} ({:?})", self.mode);

        match self.mode {
            LaunchMode::Wait => {
                let status = cmd.status().map_err(|e| spawn_error(&self.program_name(), e))?;
                if status.success() {
                    Ok(())
                } else {
                    Err(HabitatError::LaunchFailed {
                        program: self.program_name(),
                        reason: format!("exited with {status}"),
                    })
                }
            }
            LaunchMode::Detach => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn()
                    .map_err(|e| spawn_error(&self.program_name(), e))?;
                Ok(())
            }
        }
    }
}

fn spawn_error(program: &str, error: std::io::Error) -> HabitatError {
    match error.kind() {
        ErrorKind::PermissionDenied => {
            HabitatError::PermissionDenied(format!("Unable to run {program}: {error}"))
        }
        ErrorKind::NotFound => HabitatError::LaunchFailed {
            program: program.to_string(),
            reason: "not found on PATH".to_string(),
        },
        _ => HabitatError::LaunchFailed {
            program: program.to_string(),
            reason: error.to_string(),
        },
    }
}

/// Try each plan in order; the last failure is reported if none works.
pub fn run_plans(plans: &[LaunchPlan]) -> Result<()> {
    let mut last_error = None;
    for plan in plans {
        match plan.run() {
            Ok(()) => return Ok(()),
            Err(e) => {
                log::debug!("{} failed: {e}", plan.program_name());
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| {
        HabitatError::UnsupportedPlatform("no launcher for this platform".to_string())
    }))
}

/// Editors to try for `file`, best first.
///
/// `background` forces detached (`true`) or blocking (`false`) launches;
/// `None` blocks only when an interactive terminal is available.
pub fn editor_plans(habitat: &Habitat, file: &Path, background: Option<bool>) -> Vec<LaunchPlan> {
    let platform = habitat.platform();
    let mode = match background {
        Some(true) => LaunchMode::Detach,
        Some(false) => LaunchMode::Wait,
        None if habitat.capabilities().interactive_terminal_available() => LaunchMode::Wait,
        None => LaunchMode::Detach,
    };

    let mut plans = Vec::new();
    if platform.is_windows() {
        if habitat.detector().is_sandboxed_package() {
            let system_root = env::var_os("SystemRoot").unwrap_or_else(|| "C:\\Windows".into());
            let notepad = PathBuf::from(system_root).join("System32").join("notepad.exe");
            plans.push(LaunchPlan::new(notepad, file, LaunchMode::Detach));
        }
        plans.push(LaunchPlan {
            program: "cmd.exe".into(),
            args: vec!["/c".into(), "start".into(), "".into(), file.as_os_str().to_os_string()],
            mode: LaunchMode::Detach,
        });
        plans.push(LaunchPlan::new("notepad.exe", file, LaunchMode::Detach));
    } else if platform.is_termux() || platform.is_ish_alpine() {
        plans.push(LaunchPlan::new(TERMINAL_EDITOR, file, LaunchMode::Wait));
    } else if platform.is_macos() {
        plans.push(LaunchPlan::new("open", file, mode));
        plans.push(LaunchPlan::new(TERMINAL_EDITOR, file, LaunchMode::Wait));
    } else if platform.is_linux() || platform.is_freebsd() {
        // xdg-open must be waited on to learn whether a handler exists
        plans.push(LaunchPlan::new("xdg-open", file, LaunchMode::Wait));
        for editor in GUI_EDITORS {
            if which::which(editor).is_ok() {
                plans.push(LaunchPlan::new(*editor, file, mode));
            }
        }
        plans.push(LaunchPlan::new(TERMINAL_EDITOR, file, LaunchMode::Wait));
    }
    plans
}

/// Open `file` in the environment's default editor.
pub fn edit_text_file(habitat: &Habitat, file: &Path, background: Option<bool>) -> Result<()> {
    let file = existing_path(file)?;
    if !file.is_file() {
        return Err(HabitatError::NotAFile(file.display().to_string()));
    }
    run_plans(&editor_plans(habitat, &file, background))
}

/// The folder to show for `path`: files are replaced by their parent, and
/// `None` means the current directory.
pub fn explorer_target(path: Option<&Path>) -> Result<PathBuf> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => env::current_dir()?,
    };
    let path = existing_path(&path)?;
    if path.is_file() {
        return path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| HabitatError::PathNotFound(path.display().to_string()));
    }
    Ok(path)
}

pub fn explorer_plan(habitat: &Habitat, dir: &Path) -> Result<LaunchPlan> {
    let platform = habitat.platform();
    let plan = if platform.is_wsl() {
        LaunchPlan {
            program: "explorer.exe".into(),
            args: vec![windows_path(dir)?.into()],
            mode: LaunchMode::Detach,
        }
    } else if platform.is_windows() {
        LaunchPlan::new("explorer.exe", dir, LaunchMode::Detach)
    } else if platform.is_macos() {
        LaunchPlan::new("open", dir, LaunchMode::Detach)
    } else if platform.is_termux() {
        LaunchPlan::new("termux-open", dir, LaunchMode::Detach)
    } else {
        LaunchPlan::new("xdg-open", dir, LaunchMode::Detach)
    };
    Ok(plan)
}

/// Show `path` (or the current directory) in the system file manager.
pub fn show_system_explorer(habitat: &Habitat, path: Option<&Path>) -> Result<()> {
    let dir = explorer_target(path)?;
    explorer_plan(habitat, &dir)?.run()
}

fn existing_path(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => HabitatError::PathNotFound(path.display().to_string()),
        ErrorKind::PermissionDenied => {
            HabitatError::PermissionDenied(format!("Unable to access {}: {err}", path.display()))
        }
        _ => HabitatError::SystemError(format!(
            "Failed to resolve {}: {err}",
            path.display()
        )),
    })
}

/// Translate a Linux path inside WSL to its Windows form.
fn windows_path(path: &Path) -> Result<String> {
    let mut cmd = Command::new("wslpath");
    cmd.arg("-w").arg(path);
    let outcome = run_with_timeout(cmd, WSLPATH_TIMEOUT)?;
    let translated = outcome.stdout.trim();
    if !outcome.status.success() || translated.is_empty() {
        return Err(HabitatError::LaunchFailed {
            program: "wslpath".to_string(),
            reason: format!("could not translate {}", path.display()),
        });
    }
    Ok(translated.to_string())
}
