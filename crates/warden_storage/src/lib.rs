//! Warden Storage
//!
//! Durable storage for execution records and script artifacts.
//! Records are append-only; nothing here updates or deletes them.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod artifacts;
pub mod error;
pub mod layout;
pub mod ledger;

pub use artifacts::{ArtifactStore, FsArtifactStore, MemoryArtifactStore, artifact_key};
pub use error::{StoreError, StoreResult};
pub use layout::StorageLayout;
pub use ledger::{ExecutionLedger, FsLedger, MemoryLedger, RecordHandle};
