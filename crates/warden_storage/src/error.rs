//! Storage errors.

use std::path::Path;

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Filesystem operation failed
    #[error("IO error at {path}: {reason}")]
    Io {
        /// Path involved
        path: String,
        /// Underlying error
        reason: String,
    },
    /// Record could not be encoded or decoded
    #[error("Serialization error: {reason}")]
    Serialization {
        /// Underlying error
        reason: String,
    },
    /// Write-once key already present
    #[error("Artifact already exists: {key}")]
    AlreadyExists {
        /// Conflicting key
        key: String,
    },
}

impl StoreError {
    pub(crate) fn io(path: &Path, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}
