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

use crate::error::HabitatError;
use std::fmt;

pub struct ErrorContext<'a> {
    pub error: &'a HabitatError,
    pub suggestion: Option<String>,
    pub details: Option<String>,
}

impl<'a> ErrorContext<'a> {
    pub fn new(error: &'a HabitatError) -> Self {
        let (suggestion, details) = match error {
            HabitatError::UnknownCheck(name) => {
                let suggestion =
                    Some("Run 'habitat list' to see every registered check.".to_string());
                let details = Some(format!("No check is registered under the name '{name}'."));
                (suggestion, details)
            }
            HabitatError::PathNotFound(path) | HabitatError::NotAFile(path) => {
                let suggestion = Some(
                    "Pass the path of an existing regular file, or omit --path to inspect the \
                     running executable."
                        .to_string(),
                );
                let details = Some(format!("Inspected path: {path}"));
                (suggestion, details)
            }
            HabitatError::PermissionDenied(msg) => {
                let suggestion = if cfg!(windows) {
                    Some("Run the command from an account that can read the file.".to_string())
                } else {
                    Some("Check the file mode and ownership with 'ls -l'.".to_string())
                };
                let details = Some(msg.clone());
                (suggestion, details)
            }
            HabitatError::ConfigError(msg) | HabitatError::InvalidConfig(msg) => {
                let suggestion = Some(
                    "Check ~/.habitat/config.toml (or $HABITAT_HOME/config.toml) and any \
                     HABITAT_* environment variables."
                        .to_string(),
                );
                let details = Some(msg.clone());
                (suggestion, details)
            }
            HabitatError::Config(err) => {
                let suggestion = Some(
                    "Check ~/.habitat/config.toml (or $HABITAT_HOME/config.toml) and any \
                     HABITAT_* environment variables."
                        .to_string(),
                );
                let details = Some(err.to_string());
                (suggestion, details)
            }
            HabitatError::DisplayUnavailable(_) => {
                let suggestion = if cfg!(unix) {
                    Some("Set DISPLAY or WAYLAND_DISPLAY to a running display server.".to_string())
                } else {
                    None
                };
                (suggestion, None)
            }
            HabitatError::LaunchFailed { program, .. } => {
                let suggestion = Some(format!(
                    "Ensure '{program}' is installed and available in your PATH."
                ));
                (suggestion, None)
            }
            _ => (None, None),
        };

        ErrorContext {
            error,
            suggestion,
            details,
        }
    }
}

impl<'a> fmt::Display for ErrorContext<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\n\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}
