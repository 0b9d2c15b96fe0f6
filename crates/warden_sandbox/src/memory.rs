//! Memory ceiling for interpreter heaps.
//!
//! Two limits apply to each run. The soft limit is checked after the script
//! finishes against the runtime's own heap usage. The hard ceiling is handed
//! to the allocator so a runaway script cannot take the whole process down.

use serde::{Deserialize, Serialize};

/// Floor for the allocator ceiling so tiny soft limits still leave room to
/// build a context.
pub const MIN_HARD_CEILING: u64 = 8 * 1024 * 1024;

/// Memory limit configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLimit {
    /// Maximum heap bytes after the run
    pub max_bytes: u64,
}

impl MemoryLimit {
    /// Create a new memory limit
    #[must_use]
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    /// Allocation ceiling handed to the interpreter
    #[must_use]
    pub fn hard_ceiling(&self) -> u64 {
        self.max_bytes.saturating_mul(2).max(MIN_HARD_CEILING)
    }

    /// Post-hoc check of sampled heap usage
    ///
    /// # Errors
    ///
    /// Returns error if `used` is above the limit
    pub fn check(&self, used: u64) -> Result<(), MemoryError> {
        if used > self.max_bytes {
            return Err(MemoryError::Exceeded {
                used,
                limit: self.max_bytes,
            });
        }
        Ok(())
    }
}

impl Default for MemoryLimit {
    fn default() -> Self {
        Self::new(64 * 1024 * 1024)
    }
}

/// Memory errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    /// Heap usage above the limit
    #[error("Memory limit exceeded: {used} bytes used (limit {limit} bytes)")]
    Exceeded {
        /// Sampled usage
        used: u64,
        /// Configured limit
        limit: u64,
    },
}
