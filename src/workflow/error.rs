//! Workflow error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors raised by a [`StateStore`](super::StateStore).
///
/// An absent state file is not an error; stores report it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The state file exists but could not be read.
    #[error("Failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The state file exists but does not hold a valid run state.
    #[error("State file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The state could not be written.
    #[error("Failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The state could not be serialized.
    #[error("Failed to serialize state: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The store refused the operation.
    #[error("State store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised while loading an external artifact that exists on disk.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// IO error while reading.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Content is not the expected JSON shape.
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that can occur during workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Run state could not be loaded or saved.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Artifact could not be loaded.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    /// Checkpoint could not be written or read.
    #[error("Checkpoint error at {path}: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Checkpoint content is invalid.
    #[error("Checkpoint {path} is corrupt: {source}")]
    CorruptCheckpoint {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Escalation log could not be written.
    #[error("Failed to write escalation log {path}: {source}")]
    EscalationLog {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl WorkflowError {
    /// Whether the error came from the state store.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
