//! Executor errors.
//!
//! Script failures never show up here; they are recorded as failed
//! execution records. These errors are for the executor's own plumbing.

use crate::state::StateError;
use warden_storage::StoreError;

/// Executor error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutorError {
    /// Ledger or artifact storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
    /// Script id rejected before execution
    #[error("Invalid script id '{id}': {reason}")]
    InvalidScriptId {
        /// Offending id
        id: String,
        /// Why it was rejected
        reason: String,
    },
    /// Configuration could not be loaded or is out of range
    #[error("Invalid configuration: {reason}")]
    Config {
        /// What was wrong
        reason: String,
    },
    /// Lifecycle bookkeeping went wrong
    #[error(transparent)]
    State(#[from] StateError),
}
