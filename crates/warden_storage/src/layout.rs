//! On-disk directory layout.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directories used by the filesystem stores
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageLayout {
    /// Raw script text, one file per run
    pub scripts_dir: PathBuf,
    /// Execution records
    pub results_dir: PathBuf,
    /// Console transcripts
    pub logs_dir: PathBuf,
}

impl StorageLayout {
    /// Layout with all three directories under `root`
    #[must_use]
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            scripts_dir: root.join("scripts"),
            results_dir: root.join("results"),
            logs_dir: root.join("logs"),
        }
    }

    /// Create every directory. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns error if a directory cannot be created
    pub fn init(&self) -> StoreResult<()> {
        for dir in [&self.scripts_dir, &self.results_dir, &self.logs_dir] {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, &e))?;
        }
        tracing::debug!(
            scripts = %self.scripts_dir.display(),
            results = %self.results_dir.display(),
            logs = %self.logs_dir.display(),
            "storage layout ready"
        );
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        Self::under(".warden")
    }
}
