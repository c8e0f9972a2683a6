mod context;
mod exit_codes;
mod format;
#[cfg(test)]
mod tests;

pub use context::ErrorContext;
pub use exit_codes::get_exit_code;
pub use format::{format_error_chain, format_error_with_color};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HabitatError {
    #[error("Unknown check '{0}'")]
    UnknownCheck(String),

    #[error("Path not found: {0}")]
    PathNotFound(String),

    #[error("Not a regular file: {0}")]
    NotAFile(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No display available: {0}")]
    DisplayUnavailable(String),

    #[error("Display protocol error: {0}")]
    DisplayProtocol(String),

    #[error("Render failed: {0}")]
    Render(String),

    #[error("Failed to launch '{program}': {reason}")]
    LaunchFailed { program: String, reason: String },

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Not supported on this platform: {0}")]
    UnsupportedPlatform(String),

    #[error("System error: {0}")]
    SystemError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, HabitatError>;
