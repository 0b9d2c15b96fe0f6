//! Warden Policy Engine
//!
//! Lexical screening of script text against a fixed catalog of dangerous
//! capability names. A match rejects the script before any context is
//! built.
//!
//! This is a conservative filter, not semantic analysis. It over-blocks
//! (a symbol inside a comment or string literal still matches) and
//! under-blocks (computed property access such as `this["ev" + "al"]` is not
//! seen).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod matcher;

pub use catalog::{BlacklistEntry, default_entries};
pub use matcher::{Blacklist, PolicyError, check_blacklist, default_blacklist};
pub use warden_core::{PolicyViolation, RiskLevel};
