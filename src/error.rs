//! Error types for the orders gateway

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for the orders gateway
pub type Result<T> = std::result::Result<T, Error>;

/// Orders gateway errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Circuit is open - the downstream dependency was never attempted
    #[error("Circuit open for dependency: {0}")]
    CircuitOpen(String),

    /// Per-call deadline exceeded - the downstream outcome is unknown and ignored
    #[error("Call to {dependency} timed out after {timeout:?}")]
    Timeout {
        /// Dependency name
        dependency: String,
        /// Configured per-call timeout
        timeout: Duration,
    },

    /// Downstream call completed with an application-level failure
    #[error("Upstream error from {dependency}: {message}")]
    Upstream {
        /// Dependency name
        dependency: String,
        /// Failure description
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
