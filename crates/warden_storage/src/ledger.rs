//! Append-only execution ledger.
//!
//! Record files are named `{scriptId}_{timestampMs}_{sequence}.json`. The
//! sequence comes from one process-wide counter that is moved past the
//! highest sequence found on disk whenever a ledger is opened, so names never
//! collide and sort in append order.

use crate::error::{StoreError, StoreResult};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use warden_core::{ExecutionRecord, ScriptId};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

fn next_sequence() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::SeqCst) + 1
}

/// Where an appended record ended up
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordHandle {
    /// Append sequence number
    pub sequence: u64,
    /// Storage key, `{scriptId}_{timestampMs}_{sequence}`
    pub key: String,
}

impl std::fmt::Display for RecordHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key)
    }
}

/// Durable, append-only store of execution records
pub trait ExecutionLedger: Send + Sync {
    /// Persist a record. The record is durable once this returns.
    ///
    /// # Errors
    ///
    /// Returns error if the record cannot be written
    fn append(&self, record: &ExecutionRecord) -> StoreResult<RecordHandle>;

    /// All records whose script id equals `script_id`, in append order
    ///
    /// # Errors
    ///
    /// Returns error if the ledger cannot be read
    fn query_by_script_id(&self, script_id: &ScriptId) -> StoreResult<Vec<ExecutionRecord>>;
}

/// Ledger backed by one JSON file per record
#[derive(Debug)]
pub struct FsLedger {
    dir: PathBuf,
}

impl FsLedger {
    /// Open (and create) a ledger directory
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or listed
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, &e))?;

        let highest = record_files(&dir)?
            .into_iter()
            .map(|(sequence, _, _)| sequence)
            .max()
            .unwrap_or(0);
        SEQUENCE.fetch_max(highest, Ordering::SeqCst);
        tracing::debug!(dir = %dir.display(), highest, "ledger opened");

        Ok(Self { dir })
    }

    /// Ledger directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ExecutionLedger for FsLedger {
    fn append(&self, record: &ExecutionRecord) -> StoreResult<RecordHandle> {
        let sequence = next_sequence();
        let key = format!("{}_{:010}", record.key_stem(), sequence);
        let path = self.dir.join(format!("{}.json", key));
        let bytes = serde_json::to_vec_pretty(record)?;

        write_durable(&path, &bytes)?;
        tracing::debug!(key = %key, execution_id = %record.execution_id, "record appended");

        Ok(RecordHandle { sequence, key })
    }

    fn query_by_script_id(&self, script_id: &ScriptId) -> StoreResult<Vec<ExecutionRecord>> {
        let prefix = format!("{}_", script_id);
        let mut found = Vec::new();

        for (sequence, name, path) in record_files(&self.dir)? {
            // Ids may contain '_', so the prefix only narrows the scan.
            if !name.starts_with(&prefix) {
                continue;
            }
            let bytes = fs::read(&path).map_err(|e| StoreError::io(&path, &e))?;
            match serde_json::from_slice::<ExecutionRecord>(&bytes) {
                Ok(record) if record.script_id == *script_id => found.push((sequence, record)),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable record");
                }
            }
        }

        found.sort_by_key(|(sequence, _)| *sequence);
        Ok(found.into_iter().map(|(_, record)| record).collect())
    }
}

/// `(sequence, file name, path)` of every finished record file
fn record_files(dir: &Path) -> StoreResult<Vec<(u64, String, PathBuf)>> {
    let entries = fs::read_dir(dir).map_err(|e| StoreError::io(dir, &e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(dir, &e))?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if let Some(sequence) = parse_sequence(&name) {
            files.push((sequence, name, entry.path()));
        }
    }
    Ok(files)
}

fn parse_sequence(name: &str) -> Option<u64> {
    let stem = name.strip_suffix(".json")?;
    let (_, sequence) = stem.rsplit_once('_')?;
    sequence.parse().ok()
}

/// Write to a temp file, fsync, then rename into place
pub(crate) fn write_durable(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp).map_err(|e| StoreError::io(&tmp, &e))?;
        file.write_all(bytes).map_err(|e| StoreError::io(&tmp, &e))?;
        file.sync_all().map_err(|e| StoreError::io(&tmp, &e))?;
    }
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, &e))?;

    // Persist the rename itself; not supported on every platform.
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

/// In-memory ledger
#[derive(Debug, Default)]
pub struct MemoryLedger {
    records: RwLock<Vec<(RecordHandle, ExecutionRecord)>>,
}

impl MemoryLedger {
    /// Create an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records appended
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if no record was appended
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ExecutionLedger for MemoryLedger {
    fn append(&self, record: &ExecutionRecord) -> StoreResult<RecordHandle> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let sequence = records.len() as u64 + 1;
        let handle = RecordHandle {
            sequence,
            key: format!("{}_{:010}", record.key_stem(), sequence),
        };
        records.push((handle.clone(), record.clone()));
        Ok(handle)
    }

    fn query_by_script_id(&self, script_id: &ScriptId) -> StoreResult<Vec<ExecutionRecord>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .iter()
            .filter(|(_, record)| record.script_id == *script_id)
            .map(|(_, record)| record.clone())
            .collect())
    }
}
