//! Execution lifecycle.

use serde::{Deserialize, Serialize};
use warden_sandbox::SandboxError;

/// Stage of a single execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    /// Id validated, context allocated
    Init,
    /// Blacklist check running
    PolicyCheck,
    /// Blacklist matched; the script never runs
    Rejected,
    /// Script stored, capability context about to be built
    ContextReady,
    /// Script running on a worker
    Running,
    /// Deadline passed
    TimedOut,
    /// Call budget exhausted
    CallLimit,
    /// Memory limit exceeded
    MemLimit,
    /// Script threw
    Faulted,
    /// Script finished with a value
    Completed,
    /// Record appended to the ledger
    Persisted,
    /// Record returned to the caller
    Done,
}

impl ExecutionState {
    /// Check whether `next` may follow this state
    #[must_use]
    pub fn can_advance_to(&self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        matches!(
            (*self, next),
            (Init, PolicyCheck)
                | (PolicyCheck, Rejected | ContextReady)
                | (ContextReady, Running)
                | (Running, TimedOut | CallLimit | MemLimit | Faulted | Completed)
                | (Rejected | TimedOut | CallLimit | MemLimit | Faulted | Completed, Persisted)
                | (Persisted, Done)
        )
    }

    /// Move to `next`
    ///
    /// # Errors
    ///
    /// Returns error if the transition is not allowed
    pub fn advance(self, next: ExecutionState) -> Result<ExecutionState, StateError> {
        if !self.can_advance_to(next) {
            return Err(StateError::IllegalTransition { from: self, to: next });
        }
        tracing::debug!(from = ?self, to = ?next, "execution state");
        Ok(next)
    }

    /// State reached when a sandbox run ends with `outcome`
    #[must_use]
    pub fn after_run<T>(outcome: &Result<T, SandboxError>) -> ExecutionState {
        match outcome {
            Ok(_) => Self::Completed,
            Err(SandboxError::Timeout { .. }) => Self::TimedOut,
            Err(SandboxError::CallBudgetExceeded { .. }) => Self::CallLimit,
            Err(SandboxError::MemoryLimitExceeded { .. }) => Self::MemLimit,
            Err(SandboxError::Script(_) | SandboxError::Init(_) | SandboxError::Aborted(_)) => Self::Faulted,
        }
    }

    /// Whether the lifecycle is over
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Lifecycle error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// Transition not in the lifecycle graph
    #[error("Illegal execution state transition {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current state
        from: ExecutionState,
        /// Requested state
        to: ExecutionState,
    },
}
