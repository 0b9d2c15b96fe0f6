//! Execution metrics.

use serde::{Deserialize, Serialize};
use warden_core::{ErrorKind, ExecutionRecord};

/// Counters over every execution an executor has recorded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    /// Total executions recorded
    pub executions: u64,
    /// Executions that completed with a value
    pub completed: u64,
    /// Scripts rejected by the blacklist
    pub policy_rejections: u64,
    /// Executions stopped by the deadline
    pub timeouts: u64,
    /// Executions stopped by the call budget
    pub call_budget_exceeded: u64,
    /// Executions over the memory limit
    pub memory_exceeded: u64,
    /// Executions where the script threw
    pub runtime_errors: u64,
    /// Sum of execution wall-clock times
    pub total_execution_ms: u64,
}

impl Metrics {
    /// Create new metrics
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one finished execution
    pub fn record(&mut self, record: &ExecutionRecord) {
        self.executions += 1;
        self.total_execution_ms = self.total_execution_ms.saturating_add(record.execution_time_ms);
        match record.error_info().map(|info| info.kind) {
            None => self.completed += 1,
            Some(ErrorKind::PolicyViolation) => self.policy_rejections += 1,
            Some(ErrorKind::Timeout) => self.timeouts += 1,
            Some(ErrorKind::CallBudgetExceeded) => self.call_budget_exceeded += 1,
            Some(ErrorKind::MemoryLimitExceeded) => self.memory_exceeded += 1,
            Some(ErrorKind::RuntimeError) => self.runtime_errors += 1,
        }
    }

    /// Executions that failed for any reason
    #[must_use]
    pub fn failed(&self) -> u64 {
        self.executions - self.completed
    }

    /// Get success rate (0.0 - 1.0)
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.executions == 0 {
            return 1.0;
        }
        self.completed as f64 / self.executions as f64
    }

    /// Mean wall-clock time per execution
    #[must_use]
    pub fn average_execution_ms(&self) -> f64 {
        if self.executions == 0 {
            return 0.0;
        }
        self.total_execution_ms as f64 / self.executions as f64
    }

    /// Reset metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
