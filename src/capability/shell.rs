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

use crate::platform::process::{ProcessError, run_with_timeout};
use std::fmt;
use std::io;
use std::process::Command;
use std::time::Duration;

#[cfg(windows)]
pub const SHELL_PROGRAM: &str = "cmd.exe";
#[cfg(windows)]
const SHELL_ARGS: &[&str] = &["/c", "exit 0"];

#[cfg(not(windows))]
pub const SHELL_PROGRAM: &str = "sh";
#[cfg(not(windows))]
const SHELL_ARGS: &[&str] = &["-c", "true"];

/// Why the shell probe failed. Only ever logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellProbeFailure {
    Timeout,
    PermissionDenied,
    Spawn(io::ErrorKind),
    Wait(io::ErrorKind),
    NonZeroExit(Option<i32>),
}

impl fmt::Display for ShellProbeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellProbeFailure::Timeout => write!(f, "shell did not exit in time"),
            ShellProbeFailure::PermissionDenied => write!(f, "not permitted to start a shell"),
            ShellProbeFailure::Spawn(kind) => write!(f, "shell could not be started ({kind})"),
            ShellProbeFailure::Wait(kind) => write!(f, "shell could not be waited on ({kind})"),
            ShellProbeFailure::NonZeroExit(Some(code)) => write!(f, "shell exited with {code}"),
            ShellProbeFailure::NonZeroExit(None) => write!(f, "shell terminated by signal"),
        }
    }
}

impl From<ProcessError> for ShellProbeFailure {
    fn from(error: ProcessError) -> Self {
        if error.is_permission_denied() {
            return ShellProbeFailure::PermissionDenied;
        }
        match error {
            ProcessError::Timeout { .. } => ShellProbeFailure::Timeout,
            ProcessError::Spawn { source, .. } => ShellProbeFailure::Spawn(source.kind()),
            ProcessError::Wait { source, .. } => ShellProbeFailure::Wait(source.kind()),
        }
    }
}

pub fn shell_command() -> Command {
    let mut cmd = Command::new(SHELL_PROGRAM);
    cmd.args(SHELL_ARGS);
    cmd
}

/// Run a no-op shell command and require a zero exit within `timeout`.
pub fn probe_shell(timeout: Duration) -> Result<(), ShellProbeFailure> {
    probe_command(shell_command(), timeout)
}

pub(crate) fn probe_command(cmd: Command, timeout: Duration) -> Result<(), ShellProbeFailure> {
    let outcome = run_with_timeout(cmd, timeout)?;
    if outcome.status.success() {
        Ok(())
    } else {
        Err(ShellProbeFailure::NonZeroExit(outcome.status.code()))
    }
}

pub fn can_spawn_shell(timeout: Duration) -> bool {
    match probe_shell(timeout) {
        Ok(()) => true,
        Err(failure) => {
            log::debug!("Shell spawn failed: {failure}");
            false
        }
    }
}

/// The default shell resolves on `PATH`, without running it.
pub fn shell_available() -> bool {
    match which::which(SHELL_PROGRAM) {
        Ok(path) => {
            log::debug!("Shell found at {}", path.display());
            true
        }
        Err(e) => {
            log::debug!("{SHELL_PROGRAM} not found on PATH: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_program_is_spawn_failure() {
        let cmd = Command::new("habitat-no-such-shell");
        assert_eq!(
            probe_command(cmd, Duration::from_secs(1)),
            Err(ShellProbeFailure::Spawn(io::ErrorKind::NotFound))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "exit 7"]);
        assert_eq!(
            probe_command(cmd, Duration::from_secs(5)),
            Err(ShellProbeFailure::NonZeroExit(Some(7)))
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 5"]);
        assert_eq!(
            probe_command(cmd, Duration::from_millis(100)),
            Err(ShellProbeFailure::Timeout)
        );
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(
            ShellProbeFailure::NonZeroExit(Some(1)).to_string(),
            "shell exited with 1"
        );
        assert_eq!(ShellProbeFailure::Timeout.to_string(), "shell did not exit in time");
    }
}
