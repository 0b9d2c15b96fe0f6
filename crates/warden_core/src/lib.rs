//! Warden Core Types
//!
//! Pure types shared by every Warden crate: identifiers, script digests,
//! risk tiers, and the persisted execution record. No I/O happens here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod hash;
pub mod id;
pub mod record;
pub mod risk;
pub mod time;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use hash::{Hash, HashError};
pub use id::{ExecutionId, ScriptId};
pub use record::{ErrorInfo, ErrorKind, ExecutionRecord, Outcome};
pub use risk::{PolicyViolation, RiskLevel};
pub use time::Timestamp;
