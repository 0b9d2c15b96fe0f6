//! Executor configuration.

use crate::error::ExecutorError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use warden_sandbox::SandboxConfig;
use warden_storage::StorageLayout;

/// Executor configuration, loadable from camelCase JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ExecutorConfig {
    /// Wall-clock limit per execution in milliseconds
    pub timeout_ms: u64,
    /// Interpreter heap limit per execution
    pub max_memory_bytes: u64,
    /// Console calls allowed per execution
    pub max_calls: u64,
    /// Raw script text
    pub scripts_dir: PathBuf,
    /// Execution records
    pub results_dir: PathBuf,
    /// Console transcripts
    pub logs_dir: PathBuf,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        let layout = StorageLayout::default();
        Self {
            timeout_ms: 5_000,
            max_memory_bytes: 64 * 1024 * 1024,
            max_calls: 1_000,
            scripts_dir: layout.scripts_dir,
            results_dir: layout.results_dir,
            logs_dir: layout.logs_dir,
        }
    }
}

impl ExecutorConfig {
    /// Load from a JSON file; missing fields take their defaults
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed, or validated
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ExecutorError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ExecutorError::Config {
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_json(&text)
    }

    /// Parse from JSON text
    ///
    /// # Errors
    ///
    /// Returns error if the text is not a valid configuration
    pub fn from_json(text: &str) -> Result<Self, ExecutorError> {
        let config: Self = serde_json::from_str(text).map_err(|e| ExecutorError::Config {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that limits are usable
    ///
    /// # Errors
    ///
    /// Returns error if the timeout or memory limit is zero
    pub fn validate(&self) -> Result<(), ExecutorError> {
        if self.timeout_ms == 0 {
            return Err(ExecutorError::Config {
                reason: "timeoutMs must be greater than zero".to_string(),
            });
        }
        if self.max_memory_bytes == 0 {
            return Err(ExecutorError::Config {
                reason: "maxMemoryBytes must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Set the wall-clock limit
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the heap limit
    #[must_use]
    pub fn with_max_memory_bytes(mut self, bytes: u64) -> Self {
        self.max_memory_bytes = bytes;
        self
    }

    /// Set the call budget
    #[must_use]
    pub fn with_max_calls(mut self, max_calls: u64) -> Self {
        self.max_calls = max_calls;
        self
    }

    /// Put all storage directories under `root`
    #[must_use]
    pub fn with_storage_root(mut self, root: impl AsRef<Path>) -> Self {
        let layout = StorageLayout::under(root);
        self.scripts_dir = layout.scripts_dir;
        self.results_dir = layout.results_dir;
        self.logs_dir = layout.logs_dir;
        self
    }

    /// Limits handed to each sandbox run
    #[must_use]
    pub fn sandbox_config(&self) -> SandboxConfig {
        SandboxConfig::new()
            .with_timeout_ms(self.timeout_ms)
            .with_max_calls(self.max_calls)
            .with_memory_limit(self.max_memory_bytes)
    }

    /// Storage directories
    #[must_use]
    pub fn layout(&self) -> StorageLayout {
        StorageLayout {
            scripts_dir: self.scripts_dir.clone(),
            results_dir: self.results_dir.clone(),
            logs_dir: self.logs_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.timeout_ms, 5000);
        assert_eq!(config.max_memory_bytes, 64 * 1024 * 1024);
        assert_eq!(config.max_calls, 1000);
        assert_eq!(config.scripts_dir, PathBuf::from(".warden/scripts"));
        assert_eq!(config.results_dir, PathBuf::from(".warden/results"));
        assert_eq!(config.logs_dir, PathBuf::from(".warden/logs"));
    }

    #[test]
    fn test_partial_json() {
        let config = ExecutorConfig::from_json(r#"{ "timeoutMs": 100, "maxCalls": 3 }"#).unwrap();
        assert_eq!(config.timeout_ms, 100);
        assert_eq!(config.max_calls, 3);
        assert_eq!(config.max_memory_bytes, 64 * 1024 * 1024);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = ExecutorConfig::from_json(r#"{ "timeout": 100 }"#).unwrap_err();
        assert!(matches!(err, ExecutorError::Config { .. }));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(ExecutorConfig::from_json(r#"{ "timeoutMs": 0 }"#).is_err());
        assert!(ExecutorConfig::default().with_max_memory_bytes(0).validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.json");
        std::fs::write(&path, r#"{ "maxMemoryBytes": 1048576 }"#).unwrap();

        let config = ExecutorConfig::from_file(&path).unwrap();
        assert_eq!(config.max_memory_bytes, 1_048_576);

        let missing = ExecutorConfig::from_file(dir.path().join("absent.json"));
        assert!(matches!(missing, Err(ExecutorError::Config { .. })));
    }

    #[test]
    fn test_builders() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExecutorConfig::default()
            .with_timeout_ms(250)
            .with_max_calls(7)
            .with_storage_root(dir.path());

        let sandbox = config.sandbox_config();
        assert_eq!(sandbox.timeout_ms, 250);
        assert_eq!(sandbox.max_calls, 7);
        assert_eq!(config.layout().results_dir, dir.path().join("results"));
    }
}
