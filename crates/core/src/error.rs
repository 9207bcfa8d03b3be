//! Error type shared by every snapkeep crate

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type using the snapkeep [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Retention engine preconditions. These indicate a caller bug.
    #[error("records not in order: {prev} came before {next}")]
    OutOfOrder { prev: String, next: String },

    #[error("record time is in the future: {time} > {now}")]
    FutureRecord { time: String, now: String },

    #[error("k = {0} < 0")]
    NegativeKeep(i64),

    // Parsing
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("invalid interval: {0:?}")]
    InvalidInterval(String),

    #[error("length of snapshot identifier suffix must be at least 14: {0:?}")]
    SuffixTooShort(String),

    #[error("invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },

    // System interaction
    #[error("command `{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("{0} is not supported")]
    Unsupported(String),

    #[error("mount lookup failed: {0}")]
    Mount(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True when the failure came from missing privileges
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Error::Io(e) => e.kind() == io::ErrorKind::PermissionDenied,
            Error::Command { stderr, .. } => {
                stderr.contains("Permission denied") || stderr.contains("Operation not permitted")
            }
            _ => false,
        }
    }

    pub(crate) fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Config {
            path: path.into(),
            message: message.into(),
        }
    }
}
