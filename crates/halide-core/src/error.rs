//! Error types for the Halide supervisor core.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for supervisor operations.
#[derive(Debug, Error)]
pub enum HalideError {
    /// The backend executable could not be found or the OS refused to start
    /// it. Fatal; the supervisor surfaces this as a `Failed` event.
    #[error("Backend launch failed: {message}")]
    Launch {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// A `start()` arrived while a supervised process is still active.
    #[error("Backend is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Network error: {message}")]
    Network { message: String },

    /// Best-effort termination escalation exhausted. The session is still
    /// considered ended; callers log this and move on.
    #[error("Failed to terminate process {pid}: {message}")]
    Terminate { pid: u32, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for supervisor operations.
pub type Result<T> = std::result::Result<T, HalideError>;

impl From<std::io::Error> for HalideError {
    fn from(err: std::io::Error) -> Self {
        HalideError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for HalideError {
    fn from(err: reqwest::Error) -> Self {
        HalideError::Network {
            message: err.to_string(),
        }
    }
}

impl HalideError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        HalideError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Whether this error ends the shell session.
    ///
    /// Launch failures are fatal; termination failures are not, because the
    /// shell itself is already exiting when they can occur.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HalideError::Launch { .. })
    }
}
