// error.rs — Error types for run directory and artifact operations.

use std::path::PathBuf;
use thiserror::Error;

use bastion_audit::AuditError;

/// Errors that can occur while reading or writing a run directory.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// A file or directory operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize or deserialize a stored document.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A file passed to the index does not live under the run directory.
    #[error("{path} is not inside run directory {base}")]
    OutsideRun { path: PathBuf, base: PathBuf },

    /// Hashing an artifact failed.
    #[error(transparent)]
    Hash(#[from] AuditError),
}

impl ArtifactError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ArtifactError::IoError {
            path: path.into(),
            source,
        }
    }
}
