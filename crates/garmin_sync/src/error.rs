//! Custom error types for the sync run.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that end a sync run.
///
/// Remote failures never show up here: they are absorbed by the retrying
/// caller and only leave a missing document behind.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sync state error: {0}")]
    State(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
