//! Script and transcript artifacts.
//!
//! Scripts are stored as `{scriptId}_{executionId}.js` and never
//! overwritten. Transcripts are stored next to them as `.log` files.

use crate::error::{StoreError, StoreResult};
use crate::ledger::write_durable;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use warden_core::{ExecutionId, ScriptId};

/// Artifact key: `{scriptId}_{executionId}`
#[must_use]
pub fn artifact_key(script_id: &ScriptId, execution_id: &ExecutionId) -> String {
    format!("{}_{}", script_id, execution_id)
}

/// Storage for raw scripts and console transcripts
pub trait ArtifactStore: Send + Sync {
    /// Store the raw script text for a run. Write-once.
    ///
    /// # Errors
    ///
    /// Returns error if the key already exists or the write fails
    fn put_script(&self, script_id: &ScriptId, execution_id: &ExecutionId, source: &str) -> StoreResult<String>;

    /// Fetch the raw script text for a run
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read
    fn get_script(&self, script_id: &ScriptId, execution_id: &ExecutionId) -> StoreResult<Option<String>>;

    /// Store the console transcript for a run
    ///
    /// # Errors
    ///
    /// Returns error if the write fails
    fn put_transcript(&self, script_id: &ScriptId, execution_id: &ExecutionId, transcript: &str) -> StoreResult<String>;
}

/// Artifacts on the filesystem
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    scripts_dir: PathBuf,
    logs_dir: PathBuf,
}

impl FsArtifactStore {
    /// Create a store over existing or new directories
    ///
    /// # Errors
    ///
    /// Returns error if a directory cannot be created
    pub fn open(scripts_dir: impl Into<PathBuf>, logs_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let scripts_dir = scripts_dir.into();
        let logs_dir = logs_dir.into();
        for dir in [&scripts_dir, &logs_dir] {
            fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, &e))?;
        }
        Ok(Self {
            scripts_dir,
            logs_dir,
        })
    }

    fn script_path(&self, key: &str) -> PathBuf {
        self.scripts_dir.join(format!("{}.js", key))
    }

    fn transcript_path(&self, key: &str) -> PathBuf {
        self.logs_dir.join(format!("{}.log", key))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn put_script(&self, script_id: &ScriptId, execution_id: &ExecutionId, source: &str) -> StoreResult<String> {
        let key = artifact_key(script_id, execution_id);
        let path = self.script_path(&key);
        write_once(&path, &key, source.as_bytes())?;
        tracing::debug!(key = %key, bytes = source.len(), "script stored");
        Ok(key)
    }

    fn get_script(&self, script_id: &ScriptId, execution_id: &ExecutionId) -> StoreResult<Option<String>> {
        let path = self.script_path(&artifact_key(script_id, execution_id));
        match fs::read_to_string(&path) {
            Ok(source) => Ok(Some(source)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::io(&path, &err)),
        }
    }

    fn put_transcript(&self, script_id: &ScriptId, execution_id: &ExecutionId, transcript: &str) -> StoreResult<String> {
        let key = artifact_key(script_id, execution_id);
        write_durable(&self.transcript_path(&key), transcript.as_bytes())?;
        Ok(key)
    }
}

fn write_once(path: &Path, key: &str, bytes: &[u8]) -> StoreResult<()> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            return Err(StoreError::AlreadyExists {
                key: key.to_string(),
            });
        }
        Err(err) => return Err(StoreError::io(path, &err)),
    };
    file.write_all(bytes).map_err(|e| StoreError::io(path, &e))?;
    file.sync_all().map_err(|e| StoreError::io(path, &e))?;
    Ok(())
}

/// Artifacts kept in memory
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    scripts: RwLock<HashMap<String, String>>,
    transcripts: RwLock<HashMap<String, String>>,
}

impl MemoryArtifactStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored scripts
    #[must_use]
    pub fn script_count(&self) -> usize {
        self.scripts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Stored transcript for a run
    #[must_use]
    pub fn transcript(&self, script_id: &ScriptId, execution_id: &ExecutionId) -> Option<String> {
        self.transcripts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&artifact_key(script_id, execution_id))
            .cloned()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn put_script(&self, script_id: &ScriptId, execution_id: &ExecutionId, source: &str) -> StoreResult<String> {
        let key = artifact_key(script_id, execution_id);
        let mut scripts = self.scripts.write().unwrap_or_else(PoisonError::into_inner);
        if scripts.contains_key(&key) {
            return Err(StoreError::AlreadyExists { key });
        }
        scripts.insert(key.clone(), source.to_string());
        Ok(key)
    }

    fn get_script(&self, script_id: &ScriptId, execution_id: &ExecutionId) -> StoreResult<Option<String>> {
        Ok(self
            .scripts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&artifact_key(script_id, execution_id))
            .cloned())
    }

    fn put_transcript(&self, script_id: &ScriptId, execution_id: &ExecutionId, transcript: &str) -> StoreResult<String> {
        let key = artifact_key(script_id, execution_id);
        self.transcripts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), transcript.to_string());
        Ok(key)
    }
}
