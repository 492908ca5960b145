//! Error types for the timer engine.

use thiserror::Error;

/// Errors raised when constructing engine objects.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A step timer was defined without steps
    #[error("step timer '{0}' has no steps")]
    NoSteps(String),
}

/// Errors raised when reconstructing an object from a persisted snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot is not valid JSON for the expected shape
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The snapshot parsed but violates an invariant
    #[error("inconsistent snapshot: {0}")]
    Invalid(String),

    /// A running countdown cannot be re-armed without a tokio runtime
    #[error("cannot resume running timer {0} outside of a tokio runtime")]
    NoRuntime(String),
}
