//! Storage error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::engine::SnapshotError;

/// Errors raised by timer stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store file or directory could not be read or written.
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The store file exists but is not a valid store document.
    #[error("store file {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A snapshot could not be converted to JSON.
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A stored record could not be turned back into an engine object.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
