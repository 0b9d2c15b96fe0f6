//! Warden Sandbox
//!
//! Runs untrusted JavaScript in a fresh QuickJS runtime per invocation.
//!
//! ## Host API
//!
//! Scripts see only pure standard objects plus:
//!
//! - `console.log(...args)` / `console.info(...args)` - append to the run's logs
//! - `console.error(...args)` / `console.warn(...args)` - append to the run's errors
//!
//! Every console call is charged against the call budget. There are no
//! timers, modules, filesystem, network, promises, or `eval`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod budget;
pub mod context;
pub mod host;
pub mod memory;
pub mod sandbox;
pub mod sanitize;

pub use budget::{BudgetError, CallBudget};
pub use context::{ContextHandle, ExecutionContext, Stream};
pub use host::HostBindings;
pub use memory::{MemoryError, MemoryLimit};
pub use sandbox::{CancellationToken, Sandbox, SandboxConfig, SandboxError, SandboxRun, ScriptFault};
pub use sanitize::{CIRCULAR_MARKER, DEPTH_MARKER, MAX_DEPTH, Sanitizer, UNREADABLE_MARKER};
