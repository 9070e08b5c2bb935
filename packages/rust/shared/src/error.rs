//! Error types for innscan.
//!
//! Library crates use [`InnScanError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all innscan operations.
#[derive(Debug, thiserror::Error)]
pub enum InnScanError {
    /// Malformed taxpayer ID. Fatal to that ID only.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Configuration loading error or an unsupported wait condition.
    #[error("config error: {message}")]
    Config { message: String },

    /// A required page condition never became true.
    #[error("timed out after {timeout:?} waiting for {condition} on {locator}")]
    Timeout {
        condition: String,
        locator: String,
        timeout: Duration,
    },

    /// A located element's content could not be read.
    #[error("extraction error: {message}")]
    Extraction { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Browser automation transport or protocol error.
    #[error("automation error: {0}")]
    Automation(String),

    /// The ID source could not be read.
    #[error("input error: {0}")]
    Input(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, InnScanError>;

impl InnScanError {
    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an extraction error from any displayable message.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this is a wait timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
