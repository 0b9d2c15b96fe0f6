//! Execution records.
//!
//! A record is the immutable outcome of one script run. It is written once
//! to the ledger and read many times by history queries.

use crate::hash::Hash;
use crate::id::{ExecutionId, ScriptId};
use crate::risk::PolicyViolation;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// Failure category of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Script referenced a blacklisted symbol and never ran
    PolicyViolation,
    /// Wall-clock deadline exceeded
    Timeout,
    /// Too many instrumented host calls
    CallBudgetExceeded,
    /// Interpreter heap above the configured ceiling
    MemoryLimitExceeded,
    /// Anything the script itself raised
    RuntimeError,
}

impl ErrorKind {
    /// Error name reported for this kind when the script did not supply one
    #[must_use]
    pub fn default_name(&self) -> &'static str {
        match self {
            Self::PolicyViolation => "PolicyViolation",
            Self::Timeout => "TimeoutError",
            Self::CallBudgetExceeded => "CallBudgetExceeded",
            Self::MemoryLimitExceeded => "MemoryLimitExceeded",
            Self::RuntimeError => "Error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.default_name())
    }
}

/// Structured error carried by a failed record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    /// Failure category
    pub kind: ErrorKind,
    /// Error name (`TypeError`, `TimeoutError`, ...)
    pub name: String,
    /// Error message
    pub message: String,
    /// Script stack trace, when the interpreter produced one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Matched blacklist entry for policy rejections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub violation: Option<PolicyViolation>,
}

impl ErrorInfo {
    /// Create an error of the given kind with its default name
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            name: kind.default_name().to_string(),
            message: message.into(),
            stack: None,
            violation: None,
        }
    }

    /// Policy rejection
    #[must_use]
    pub fn policy(violation: PolicyViolation) -> Self {
        let mut info = Self::new(ErrorKind::PolicyViolation, violation.summary());
        info.violation = Some(violation);
        info
    }

    /// Wall-clock timeout
    #[must_use]
    pub fn timeout(limit_ms: u64) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("Script execution timed out after {}ms", limit_ms),
        )
    }

    /// Call budget exhausted
    #[must_use]
    pub fn call_budget(limit: u64) -> Self {
        Self::new(
            ErrorKind::CallBudgetExceeded,
            format!("Call budget exceeded: more than {} host calls", limit),
        )
    }

    /// Memory ceiling exceeded
    #[must_use]
    pub fn memory(used: u64, limit: u64) -> Self {
        Self::new(
            ErrorKind::MemoryLimitExceeded,
            format!(
                "Memory limit exceeded: {} bytes used (limit {} bytes)",
                used, limit
            ),
        )
    }

    /// Error raised by the script body
    #[must_use]
    pub fn runtime(name: Option<String>, message: impl Into<String>, stack: Option<String>) -> Self {
        let mut info = Self::new(ErrorKind::RuntimeError, message);
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            info.name = name;
        }
        info.stack = stack.filter(|s| !s.is_empty());
        info
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Outcome of a run: exactly one of a result or an error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome {
    /// Script completed; sanitized final expression value
    Completed {
        /// Sanitized result (`null` for `undefined`)
        result: serde_json::Value,
    },
    /// Script was rejected or failed
    Failed {
        /// What went wrong
        #[serde(rename = "errorInfo")]
        error_info: ErrorInfo,
    },
}

impl Outcome {
    /// Whether this is a successful outcome
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Persisted outcome of one script execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    /// Unique id of this run
    pub execution_id: ExecutionId,
    /// Script the run belongs to
    pub script_id: ScriptId,
    /// When the run started
    pub timestamp: Timestamp,
    /// Mirrors `outcome`
    pub success: bool,
    /// Result or error
    #[serde(flatten)]
    pub outcome: Outcome,
    /// `console.log` / `console.info` output
    pub logs: Vec<String>,
    /// `console.error` / `console.warn` output
    pub errors: Vec<String>,
    /// Instrumented host calls made, including the one that tripped the budget
    pub call_count: u64,
    /// Elapsed wall-clock time
    pub execution_time_ms: u64,
    /// BLAKE3 digest of the script text
    pub script_digest: Hash,
    /// Interpreter heap sampled after the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_used_bytes: Option<u64>,
}

impl ExecutionRecord {
    /// Create a record; `success` is derived from the outcome
    #[must_use]
    pub fn new(
        execution_id: ExecutionId,
        script_id: ScriptId,
        timestamp: Timestamp,
        script_digest: Hash,
        outcome: Outcome,
    ) -> Self {
        Self {
            execution_id,
            script_id,
            timestamp,
            success: outcome.is_success(),
            outcome,
            logs: Vec::new(),
            errors: Vec::new(),
            call_count: 0,
            execution_time_ms: 0,
            script_digest,
            memory_used_bytes: None,
        }
    }

    /// Attach console output and call count
    #[must_use]
    pub fn with_console(mut self, logs: Vec<String>, errors: Vec<String>, call_count: u64) -> Self {
        self.logs = logs;
        self.errors = errors;
        self.call_count = call_count;
        self
    }

    /// Attach elapsed time
    #[must_use]
    pub fn with_execution_time(mut self, millis: u64) -> Self {
        self.execution_time_ms = millis;
        self
    }

    /// Attach sampled heap usage
    #[must_use]
    pub fn with_memory_used(mut self, bytes: u64) -> Self {
        self.memory_used_bytes = Some(bytes);
        self
    }

    /// Sanitized result, if the run completed
    #[must_use]
    pub fn result(&self) -> Option<&serde_json::Value> {
        match &self.outcome {
            Outcome::Completed { result } => Some(result),
            Outcome::Failed { .. } => None,
        }
    }

    /// Error, if the run failed
    #[must_use]
    pub fn error_info(&self) -> Option<&ErrorInfo> {
        match &self.outcome {
            Outcome::Completed { .. } => None,
            Outcome::Failed { error_info } => Some(error_info),
        }
    }

    /// Storage key stem: `{scriptId}_{timestampMs}`
    #[must_use]
    pub fn key_stem(&self) -> String {
        format!("{}_{}", self.script_id, self.timestamp.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskLevel;
    use serde_json::json;

    fn record(outcome: Outcome) -> ExecutionRecord {
        ExecutionRecord::new(
            ExecutionId::new(),
            ScriptId::parse("t1").unwrap(),
            Timestamp::from_millis(1_700_000_000_000).unwrap(),
            Hash::compute(b"1 + 1"),
            outcome,
        )
    }

    #[test]
    fn test_completed_record() {
        let rec = record(Outcome::Completed { result: json!(15) });
        assert!(rec.success);
        assert_eq!(rec.result(), Some(&json!(15)));
        assert!(rec.error_info().is_none());
    }

    #[test]
    fn test_failed_record() {
        let rec = record(Outcome::Failed {
            error_info: ErrorInfo::timeout(100),
        });
        assert!(!rec.success);
        assert!(rec.result().is_none());
        assert_eq!(rec.error_info().unwrap().kind, ErrorKind::Timeout);
        assert_eq!(rec.error_info().unwrap().name, "TimeoutError");
    }

    #[test]
    fn test_json_shape() {
        let rec = record(Outcome::Completed { result: json!(null) })
            .with_console(vec!["hi".to_string()], vec![], 1)
            .with_execution_time(3);
        let value = serde_json::to_value(&rec).unwrap();
        assert_eq!(value["scriptId"], json!("t1"));
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["result"], json!(null));
        assert!(value.get("errorInfo").is_none());
        assert_eq!(value["logs"], json!(["hi"]));
        assert_eq!(value["callCount"], json!(1));
        assert_eq!(value["executionTimeMs"], json!(3));
    }

    #[test]
    fn test_null_result_survives_roundtrip() {
        let rec = record(Outcome::Completed { result: json!(null) });
        let json = serde_json::to_string(&rec).unwrap();
        let back: ExecutionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
        assert!(back.result().is_some());
    }

    #[test]
    fn test_failed_roundtrip_keeps_violation() {
        let violation = PolicyViolation {
            symbol: "require".to_string(),
            risk_level: RiskLevel::Critical,
            reasons: vec!["Provides filesystem access".to_string()],
        };
        let rec = record(Outcome::Failed {
            error_info: ErrorInfo::policy(violation.clone()),
        });
        let json = serde_json::to_string(&rec).unwrap();
        assert!(!json.contains("\"result\""));
        let back: ExecutionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.error_info().unwrap().violation, Some(violation));
        assert!(!back.success);
    }

    #[test]
    fn test_runtime_error_defaults() {
        let info = ErrorInfo::runtime(None, "boom", Some(String::new()));
        assert_eq!(info.name, "Error");
        assert_eq!(info.stack, None);
        let info = ErrorInfo::runtime(Some("TypeError".to_string()), "bad", None);
        assert_eq!(info.to_string(), "TypeError: bad");
    }

    #[test]
    fn test_key_stem() {
        let rec = record(Outcome::Completed { result: json!(1) });
        assert_eq!(rec.key_stem(), "t1_1700000000000");
    }
}
