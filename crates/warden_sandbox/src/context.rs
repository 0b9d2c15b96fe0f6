//! Per-invocation execution context.
//!
//! One context is created for every run and shared only between the host
//! bindings of that run and the executor that spawned it.

use crate::budget::{BudgetError, CallBudget};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Console output and call accounting of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    /// Lines written through `console.log` / `console.info`
    pub logs: Vec<String>,
    /// Lines written through `console.error` / `console.warn`
    pub errors: Vec<String>,
    /// Instrumented host calls, including a rejected over-budget call
    pub call_count: u64,
}

impl ExecutionContext {
    /// Render logs and errors as a plain-text transcript
    #[must_use]
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        for line in &self.logs {
            out.push_str("[log] ");
            out.push_str(line);
            out.push('\n');
        }
        for line in &self.errors {
            out.push_str("[error] ");
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Console stream a call writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// `log` and `info`
    Log,
    /// `error` and `warn`
    Error,
}

/// Shared handle to a run's context
#[derive(Debug, Clone, Default)]
pub struct ContextHandle {
    inner: Arc<Mutex<ExecutionContext>>,
    exhausted: Arc<AtomicBool>,
}

impl ContextHandle {
    /// Create a handle around an empty context
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ExecutionContext> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Charge one call against `budget`.
    ///
    /// # Errors
    ///
    /// Returns error if the call exceeds the budget, and marks the handle
    /// exhausted.
    pub fn charge(&self, budget: &CallBudget) -> Result<u64, BudgetError> {
        let mut ctx = self.lock();
        budget.charge(&mut ctx.call_count).inspect_err(|_| {
            self.exhausted.store(true, Ordering::SeqCst);
        })
    }

    /// Append an already charged line to `stream`
    pub fn push(&self, stream: Stream, line: String) {
        let mut ctx = self.lock();
        match stream {
            Stream::Log => ctx.logs.push(line),
            Stream::Error => ctx.errors.push(line),
        }
    }

    /// Charge one call and append `line` to `stream`.
    ///
    /// # Errors
    ///
    /// Returns error if the call exceeds the budget. The line is dropped.
    pub fn record(&self, stream: Stream, line: String, budget: &CallBudget) -> Result<u64, BudgetError> {
        let count = self.charge(budget)?;
        self.push(stream, line);
        Ok(count)
    }

    /// Whether a call was rejected for exceeding the budget
    #[must_use]
    pub fn budget_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::SeqCst)
    }

    /// Copy of the current context
    #[must_use]
    pub fn snapshot(&self) -> ExecutionContext {
        self.lock().clone()
    }
}
