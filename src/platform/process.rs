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

//! Bounded child process execution.

use crate::error::HabitatError;
use std::io::{self, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn { program: String, source: io::Error },

    #[error("failed to wait for '{program}': {source}")]
    Wait { program: String, source: io::Error },

    #[error("'{program}' did not exit within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

impl ProcessError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            ProcessError::Spawn { source, .. } if source.kind() == io::ErrorKind::PermissionDenied
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ProcessError::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound
        )
    }
}

impl From<ProcessError> for HabitatError {
    fn from(error: ProcessError) -> Self {
        let reason = error.to_string();
        match error {
            ProcessError::Timeout { .. } => HabitatError::Timeout(reason),
            ProcessError::Spawn { program, source }
                if source.kind() == io::ErrorKind::PermissionDenied =>
            {
                HabitatError::PermissionDenied(format!("Unable to run {program}: {source}"))
            }
            ProcessError::Spawn { program, source } | ProcessError::Wait { program, source } => {
                HabitatError::LaunchFailed {
                    program,
                    reason: source.to_string(),
                }
            }
        }
    }
}

#[derive(Debug)]
pub struct CommandOutcome {
    pub status: ExitStatus,
    pub stdout: String,
}

/// Run `cmd` with null stdin/stderr and captured stdout, killing it if it
/// outlives `timeout`.
///
/// Stdout is drained on a separate thread so a chatty child never blocks on
/// a full pipe. A grandchild that keeps the pipe open after the child exits
/// does not extend the deadline; whatever arrived by then is returned.
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<CommandOutcome, ProcessError> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    let start = Instant::now();

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;
    let drain = child.stdout.take().map(OutputDrain::start);

    // Poll the child process until it exits or times out
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ProcessError::Timeout { program, timeout });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(source) => {
                let _ = child.kill();
                return Err(ProcessError::Wait { program, source });
            }
        }
    };

    let remaining = timeout.saturating_sub(start.elapsed()).max(POLL_INTERVAL);
    let stdout = drain
        .map(|drain| drain.finish(&program, remaining))
        .unwrap_or_default();

    log::trace!("'{program}' exited with {status} after {:?}", start.elapsed());
    Ok(CommandOutcome { status, stdout })
}

struct OutputDrain {
    buffer: Arc<Mutex<Vec<u8>>>,
    done: mpsc::Receiver<io::Result<()>>,
}

impl OutputDrain {
    fn start(mut pipe: impl Read + Send + 'static) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buffer);
        let (tx, done) = mpsc::channel();

        thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            let result = loop {
                match pipe.read(&mut chunk) {
                    Ok(0) => break Ok(()),
                    Ok(n) => match sink.lock() {
                        Ok(mut output) => output.extend_from_slice(&chunk[..n]),
                        Err(_) => break Ok(()),
                    },
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => break Err(e),
                }
            };
            let _ = tx.send(result);
        });

        Self { buffer, done }
    }

    fn finish(self, program: &str, wait: Duration) -> String {
        match self.done.recv_timeout(wait) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::debug!("Discarding unreadable output of '{program}': {e}");
                return String::new();
            }
            Err(_) => log::debug!("Output of '{program}' is still open after exit"),
        }
        let output = self
            .buffer
            .lock()
            .map(|output| output.clone())
            .unwrap_or_default();
        String::from_utf8_lossy(&output).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_spawn_not_found() {
        let cmd = Command::new("habitat-definitely-missing-program");
        let err = run_with_timeout(cmd, Duration::from_secs(1)).unwrap_err();
        assert!(err.is_not_found());
        assert!(!err.is_permission_denied());
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout_and_status() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo hello; exit 3"]);
        let outcome = run_with_timeout(cmd, Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.stdout.trim(), "hello");
        assert_eq!(outcome.status.code(), Some(3));
    }

    #[cfg(unix)]
    #[test]
    fn slow_command_times_out() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 5"]);
        let start = Instant::now();
        let err = run_with_timeout(cmd, Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn output_larger_than_pipe_buffer_is_captured() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "head -c 200000 /dev/zero | tr '\\0' a"]);
        let outcome = run_with_timeout(cmd, Duration::from_secs(10)).unwrap();
        assert!(outcome.status.success());
        assert_eq!(outcome.stdout.len(), 200_000);
        assert!(outcome.stdout.bytes().all(|b| b == b'a'));
    }

    #[cfg(unix)]
    #[test]
    fn background_grandchild_does_not_hold_the_deadline() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 5 & echo hi"]);
        let start = Instant::now();
        let outcome = run_with_timeout(cmd, Duration::from_secs(1)).unwrap();
        assert!(outcome.status.success());
        assert_eq!(outcome.stdout.trim(), "hi");
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[cfg(unix)]
    #[test]
    fn timeout_maps_to_timeout_error() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "sleep 5"]);
        let err: HabitatError = run_with_timeout(cmd, Duration::from_millis(100))
            .unwrap_err()
            .into();
        assert!(matches!(err, HabitatError::Timeout(_)));
        assert_eq!(crate::error::get_exit_code(&err), 124);
    }

    #[test]
    fn spawn_failure_maps_to_launch_failed() {
        let cmd = Command::new("habitat-definitely-missing-program");
        let err: HabitatError = run_with_timeout(cmd, Duration::from_secs(1))
            .unwrap_err()
            .into();
        assert!(matches!(
            err,
            HabitatError::LaunchFailed { ref program, .. } if program == "habitat-definitely-missing-program"
        ));
    }
}
