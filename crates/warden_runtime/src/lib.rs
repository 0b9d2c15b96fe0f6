//! Warden Runtime
//!
//! Policy-checked, resource-bounded execution of untrusted scripts with a
//! durable execution ledger.
//!
//! ```no_run
//! # async fn demo() -> Result<(), warden_runtime::ExecutorError> {
//! use warden_runtime::{ExecutorConfig, ScriptExecutor};
//!
//! let executor = ScriptExecutor::init(ExecutorConfig::default())?;
//! let record = executor.execute_script("let x = 5; let y = 10; x + y;", "t1").await?;
//! assert!(record.success);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod executor;
pub mod monitor;
pub mod state;

pub use config::ExecutorConfig;
pub use error::ExecutorError;
pub use executor::ScriptExecutor;
pub use monitor::Metrics;
pub use state::{ExecutionState, StateError};
