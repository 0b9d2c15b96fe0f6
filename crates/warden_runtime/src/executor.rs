//! Bounded script executor.
//!
//! Runs one script per call: policy check, sandboxed execution on a blocking
//! worker, then an append to the ledger. Every piece of per-run state lives
//! in the call itself, so a single executor can serve concurrent callers.

use crate::config::ExecutorConfig;
use crate::error::ExecutorError;
use crate::monitor::Metrics;
use crate::state::ExecutionState;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use warden_core::{CoreError, ErrorInfo, ExecutionId, ExecutionRecord, Hash, Outcome, ScriptId, Timestamp};
use warden_policy::{Blacklist, default_blacklist};
use warden_sandbox::{CancellationToken, ContextHandle, Sandbox, SandboxError, SandboxRun};
use warden_storage::{ArtifactStore, ExecutionLedger, FsArtifactStore, FsLedger};

/// Slack given to the worker past the engine deadline before the run is
/// abandoned
pub const BACKSTOP_GRACE: Duration = Duration::from_millis(250);

/// Executes untrusted scripts under policy and resource limits
pub struct ScriptExecutor {
    config: ExecutorConfig,
    sandbox: Sandbox,
    blacklist: Option<Arc<Blacklist>>,
    ledger: Arc<dyn ExecutionLedger>,
    artifacts: Arc<dyn ArtifactStore>,
    metrics: Mutex<Metrics>,
}

impl std::fmt::Debug for ScriptExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptExecutor")
            .field("config", &self.config)
            .field("blacklist_entries", &self.blacklist().len())
            .finish_non_exhaustive()
    }
}

impl ScriptExecutor {
    /// Create the storage directories and an executor over them.
    /// Safe to call repeatedly with the same configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or a directory cannot
    /// be created
    pub fn init(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        config.validate()?;
        config.layout().init()?;
        let ledger = FsLedger::open(&config.results_dir)?;
        let artifacts = FsArtifactStore::open(&config.scripts_dir, &config.logs_dir)?;
        tracing::info!(
            results = %config.results_dir.display(),
            timeout_ms = config.timeout_ms,
            max_calls = config.max_calls,
            max_memory_bytes = config.max_memory_bytes,
            "executor initialized"
        );
        Self::with_stores(config, Arc::new(ledger), Arc::new(artifacts))
    }

    /// Create an executor over caller-supplied stores
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid
    pub fn with_stores(
        config: ExecutorConfig,
        ledger: Arc<dyn ExecutionLedger>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Result<Self, ExecutorError> {
        config.validate()?;
        Ok(Self {
            sandbox: Sandbox::new(config.sandbox_config()),
            config,
            blacklist: None,
            ledger,
            artifacts,
            metrics: Mutex::new(Metrics::new()),
        })
    }

    /// Replace the built-in blacklist
    #[must_use]
    pub fn with_blacklist(mut self, blacklist: Blacklist) -> Self {
        self.blacklist = Some(Arc::new(blacklist));
        self
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Blacklist applied before every run
    #[must_use]
    pub fn blacklist(&self) -> &Blacklist {
        self.blacklist.as_deref().unwrap_or_else(|| default_blacklist())
    }

    /// Snapshot of the executor's counters
    #[must_use]
    pub fn metrics(&self) -> Metrics {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Execute a script and persist its record.
    ///
    /// Anything the script does wrong (blacklisted symbol, timeout, budget,
    /// memory, thrown error) comes back as a failed record.
    ///
    /// # Errors
    ///
    /// Returns error if `script_id` is invalid or storage fails
    #[tracing::instrument(skip_all, fields(script_id = %script_id))]
    pub async fn execute_script(&self, script_content: &str, script_id: &str) -> Result<ExecutionRecord, ExecutorError> {
        let script_id = ScriptId::parse(script_id).map_err(invalid_id)?;
        let execution_id = ExecutionId::new();
        let timestamp = Timestamp::now();
        let started = Instant::now();
        let context = ContextHandle::new();
        let mut state = ExecutionState::Init.advance(ExecutionState::PolicyCheck)?;

        let (outcome, memory_used) = match self.blacklist().check(script_content) {
            Err(violation) => {
                state = state.advance(ExecutionState::Rejected)?;
                tracing::warn!(
                    %execution_id,
                    symbol = %violation.symbol,
                    risk = %violation.risk_level,
                    "script rejected by policy"
                );
                (
                    Outcome::Failed {
                        error_info: ErrorInfo::policy(violation),
                    },
                    None,
                )
            }
            Ok(()) => {
                state = state.advance(ExecutionState::ContextReady)?;
                self.artifacts.put_script(&script_id, &execution_id, script_content)?;

                state = state.advance(ExecutionState::Running)?;
                let run = self.run_sandboxed(script_content, &context).await;
                state = state.advance(ExecutionState::after_run(&run.outcome))?;

                let outcome = match run.outcome {
                    Ok(result) => Outcome::Completed { result },
                    Err(err) => Outcome::Failed {
                        error_info: err.error_info(),
                    },
                };
                (outcome, run.memory_used)
            }
        };
        let rejected = state == ExecutionState::Rejected;

        let console = context.snapshot();
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let mut record = ExecutionRecord::new(
            execution_id,
            script_id.clone(),
            timestamp,
            Hash::compute(script_content.as_bytes()),
            outcome,
        )
        .with_console(console.logs.clone(), console.errors.clone(), console.call_count)
        .with_execution_time(elapsed_ms);
        if let Some(bytes) = memory_used {
            record = record.with_memory_used(bytes);
        }

        let handle = self.ledger.append(&record)?;
        if !rejected {
            // The record is already durable, so a missing transcript must not fail the run
            if let Err(err) = self
                .artifacts
                .put_transcript(&script_id, &execution_id, &console.transcript())
            {
                tracing::warn!(%execution_id, error = %err, "transcript not written");
            }
        }
        state = state.advance(ExecutionState::Persisted)?;

        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(&record);

        match record.error_info() {
            None => tracing::info!(
                %execution_id,
                key = %handle,
                elapsed_ms,
                call_count = record.call_count,
                "script completed"
            ),
            Some(info) => tracing::warn!(
                %execution_id,
                key = %handle,
                elapsed_ms,
                kind = ?info.kind,
                error = %info,
                "script failed"
            ),
        }

        state.advance(ExecutionState::Done)?;
        Ok(record)
    }

    /// All records for `script_id`, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if `script_id` is invalid or the ledger cannot be read
    pub fn get_script_history(&self, script_id: &str) -> Result<Vec<ExecutionRecord>, ExecutorError> {
        let script_id = ScriptId::parse(script_id).map_err(invalid_id)?;
        Ok(self.ledger.query_by_script_id(&script_id)?)
    }

    /// Run on a blocking worker with an async backstop past the deadline
    async fn run_sandboxed(&self, source: &str, context: &ContextHandle) -> SandboxRun {
        let cancel = CancellationToken::new();
        let worker = {
            let sandbox = self.sandbox.clone();
            let source = source.to_owned();
            let context = context.clone();
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || sandbox.run(&source, &context, &cancel))
        };

        let backstop = self.sandbox.config().timeout().saturating_add(BACKSTOP_GRACE);
        match tokio::time::timeout(backstop, worker).await {
            Ok(Ok(run)) => run,
            Ok(Err(err)) => {
                tracing::error!(error = %err, "sandbox worker died");
                SandboxRun::failed(SandboxError::Aborted(err.to_string()))
            }
            Err(_) => {
                cancel.cancel();
                tracing::warn!(backstop_ms = backstop.as_millis() as u64, "sandbox worker missed its deadline");
                SandboxRun::failed(SandboxError::Timeout {
                    limit_ms: self.config.timeout_ms,
                })
            }
        }
    }
}

fn invalid_id(err: CoreError) -> ExecutorError {
    match err {
        CoreError::InvalidScriptId { id, reason } => ExecutorError::InvalidScriptId { id, reason },
        other => ExecutorError::InvalidScriptId {
            id: String::new(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use warden_core::{ErrorKind, RiskLevel};
    use warden_policy::BlacklistEntry;
    use warden_sandbox::{DEPTH_MARKER, MAX_DEPTH};
    use warden_storage::{MemoryArtifactStore, MemoryLedger, StoreError, StoreResult};

    struct Harness {
        executor: Arc<ScriptExecutor>,
        ledger: Arc<MemoryLedger>,
        artifacts: Arc<MemoryArtifactStore>,
    }

    fn harness(config: ExecutorConfig) -> Harness {
        let ledger = Arc::new(MemoryLedger::new());
        let artifacts = Arc::new(MemoryArtifactStore::new());
        let executor = ScriptExecutor::with_stores(config, ledger.clone(), artifacts.clone()).unwrap();
        Harness {
            executor: Arc::new(executor),
            ledger,
            artifacts,
        }
    }

    fn kind(record: &ExecutionRecord) -> Option<ErrorKind> {
        record.error_info().map(|info| info.kind)
    }

    #[tokio::test]
    async fn test_arithmetic_result() {
        let h = harness(ExecutorConfig::default());
        let record = h.executor.execute_script("let x=5; let y=10; x+y;", "t1").await.unwrap();

        assert!(record.success);
        assert_eq!(record.result(), Some(&json!(15)));
        assert_eq!(record.script_id.as_str(), "t1");
        assert!(record.script_digest.verify(b"let x=5; let y=10; x+y;"));
        assert_eq!(h.artifacts.script_count(), 1);
    }

    #[tokio::test]
    async fn test_thrown_error() {
        let h = harness(ExecutorConfig::default());
        let record = h.executor.execute_script("throw new Error('boom')", "t2").await.unwrap();

        assert!(!record.success);
        let info = record.error_info().unwrap();
        assert_eq!(info.kind, ErrorKind::RuntimeError);
        assert_eq!(info.message, "boom");
    }

    #[tokio::test]
    async fn test_infinite_loop_times_out() {
        let h = harness(ExecutorConfig::default().with_timeout_ms(100));
        let started = Instant::now();
        let record = h.executor.execute_script("while(true){}", "t3").await.unwrap();

        assert!(!record.success);
        assert_eq!(kind(&record), Some(ErrorKind::Timeout));
        assert!(started.elapsed() < Duration::from_millis(100) + BACKSTOP_GRACE + Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_policy_rejection() {
        let h = harness(ExecutorConfig::default());
        let record = h.executor.execute_script("require('fs')", "t4").await.unwrap();

        assert!(!record.success);
        let info = record.error_info().unwrap();
        assert_eq!(info.kind, ErrorKind::PolicyViolation);
        let violation = info.violation.as_ref().unwrap();
        assert_eq!(violation.symbol, "require");
        assert_eq!(violation.risk_level, RiskLevel::Critical);
        assert!(violation.reasons.iter().any(|r| r.contains("filesystem access")));

        // The script never ran and its text was never stored.
        assert_eq!(record.call_count, 0);
        assert_eq!(h.artifacts.script_count(), 0);
        assert!(h.artifacts.transcript(&record.script_id, &record.execution_id).is_none());
        assert_eq!(h.ledger.len(), 1);
    }

    #[tokio::test]
    async fn test_policy_rejects_symbol_in_comment() {
        let h = harness(ExecutorConfig::default());
        let record = h.executor.execute_script("// do not use eval\n1", "c1").await.unwrap();

        assert_eq!(kind(&record), Some(ErrorKind::PolicyViolation));
    }

    #[tokio::test]
    async fn test_call_budget_keeps_partial_logs() {
        let h = harness(ExecutorConfig::default().with_max_calls(5));
        let record = h
            .executor
            .execute_script("for (let i = 0; i < 20; i++) { console.log(i); }", "budget")
            .await
            .unwrap();

        assert_eq!(kind(&record), Some(ErrorKind::CallBudgetExceeded));
        assert_eq!(record.logs, vec!["0", "1", "2", "3", "4"]);
        assert_eq!(record.call_count, 6);
    }

    #[tokio::test]
    async fn test_call_count_resets_per_execution() {
        let h = harness(ExecutorConfig::default().with_max_calls(3));
        let script = "console.log('a'); console.error('b'); 1";

        let first = h.executor.execute_script(script, "reset").await.unwrap();
        let second = h.executor.execute_script(script, "reset").await.unwrap();

        assert!(first.success && second.success);
        assert_eq!(first.call_count, 2);
        assert_eq!(second.call_count, 2);
        assert_eq!(second.logs, vec!["a"]);
        assert_eq!(second.errors, vec!["b"]);
    }

    #[tokio::test]
    async fn test_post_hoc_memory_check() {
        let h = harness(ExecutorConfig::default().with_max_memory_bytes(4096));
        let record = h.executor.execute_script("1 + 1", "mem").await.unwrap();

        assert_eq!(kind(&record), Some(ErrorKind::MemoryLimitExceeded));
        assert!(record.memory_used_bytes.is_some_and(|used| used > 4096));
    }

    #[tokio::test]
    async fn test_circular_and_function_results() {
        let h = harness(ExecutorConfig::default());
        let record = h
            .executor
            .execute_script("const o = { f: function go() {} }; o.o = o; o", "shape")
            .await
            .unwrap();

        assert_eq!(
            record.result(),
            Some(&json!({ "f": "[Function: go]", "o": "[Circular Reference]" }))
        );
    }

    #[tokio::test]
    async fn test_undefined_result_is_null() {
        let h = harness(ExecutorConfig::default());
        let record = h.executor.execute_script("let unused = 1;", "undef").await.unwrap();

        assert!(record.success);
        assert_eq!(record.result(), Some(&serde_json::Value::Null));
    }

    #[tokio::test]
    async fn test_deeply_nested_result_is_capped() {
        let h = harness(ExecutorConfig::default());
        let record = h
            .executor
            .execute_script("let a = []; for (let i = 0; i < 20000; i++) { a = [a]; } a", "deep")
            .await
            .unwrap();

        assert!(record.success);
        let mut value = record.result().unwrap();
        let mut depth = 0;
        while let serde_json::Value::Array(items) = value {
            depth += 1;
            value = &items[0];
        }
        assert_eq!(depth, MAX_DEPTH);
        assert_eq!(value, &json!(DEPTH_MARKER));

        let encoded = serde_json::to_string(&record).unwrap();
        let decoded: ExecutionRecord = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.result(), record.result());
    }

    #[tokio::test]
    async fn test_deep_values_in_console_and_throw() {
        let h = harness(ExecutorConfig::default());
        let record = h
            .executor
            .execute_script(
                "let o = {}; for (let i = 0; i < 20000; i++) { o = { o }; } console.log(o); throw o;",
                "deep-log",
            )
            .await
            .unwrap();

        assert_eq!(kind(&record), Some(ErrorKind::RuntimeError));
        assert!(record.logs[0].contains(DEPTH_MARKER));
        assert!(record.error_info().unwrap().message.contains(DEPTH_MARKER));
    }

    #[tokio::test]
    async fn test_wide_result_completes() {
        let h = harness(ExecutorConfig::default());
        let record = h
            .executor
            .execute_script("let a = []; for (let i = 0; i < 60000; i++) { a.push({ i }); } a", "wide")
            .await
            .unwrap();

        assert!(record.success, "{:?}", record.error_info());
        let items = record.result().unwrap().as_array().unwrap();
        assert_eq!(items.len(), 60000);
        assert_eq!(items[12345], json!({ "i": 12345 }));
    }

    struct NoTranscripts(MemoryArtifactStore);

    impl ArtifactStore for NoTranscripts {
        fn put_script(&self, script_id: &ScriptId, execution_id: &ExecutionId, source: &str) -> StoreResult<String> {
            self.0.put_script(script_id, execution_id, source)
        }

        fn get_script(&self, script_id: &ScriptId, execution_id: &ExecutionId) -> StoreResult<Option<String>> {
            self.0.get_script(script_id, execution_id)
        }

        fn put_transcript(&self, _: &ScriptId, _: &ExecutionId, _: &str) -> StoreResult<String> {
            Err(StoreError::Io {
                path: "logs".into(),
                reason: "disk full".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_transcript_failure_keeps_record() {
        let ledger = Arc::new(MemoryLedger::new());
        let executor = ScriptExecutor::with_stores(
            ExecutorConfig::default(),
            ledger.clone(),
            Arc::new(NoTranscripts(MemoryArtifactStore::new())),
        )
        .unwrap();

        let record = executor.execute_script("console.log('hi'); 7", "nolog").await.unwrap();

        assert_eq!(record.result(), Some(&json!(7)));
        assert_eq!(executor.get_script_history("nolog").unwrap().len(), 1);
        assert_eq!(executor.metrics().executions, 1);
    }

    #[tokio::test]
    async fn test_history_in_append_order() {
        let h = harness(ExecutorConfig::default());
        h.executor.execute_script("1", "hist").await.unwrap();
        h.executor.execute_script("2", "other").await.unwrap();
        h.executor.execute_script("throw 3", "hist").await.unwrap();

        let history = h.executor.get_script_history("hist").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].result(), Some(&json!(1)));
        assert!(!history[1].success);

        assert!(h.executor.get_script_history("never").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_script_id() {
        let h = harness(ExecutorConfig::default());
        let err = h.executor.execute_script("1", "../escape").await.unwrap_err();

        assert!(matches!(err, ExecutorError::InvalidScriptId { .. }));
        assert!(h.ledger.is_empty());
    }

    #[tokio::test]
    async fn test_custom_blacklist() {
        let h = harness(ExecutorConfig::default());
        let executor = ScriptExecutor::with_stores(ExecutorConfig::default(), h.ledger.clone(), h.artifacts.clone())
            .unwrap()
            .with_blacklist(Blacklist::new(vec![BlacklistEntry::new("secret", RiskLevel::High, &["Leaks data"])]).unwrap());

        let record = executor.execute_script("secret + 1", "custom").await.unwrap();
        assert_eq!(kind(&record), Some(ErrorKind::PolicyViolation));

        let record = executor.execute_script("Math.max(1, 2)", "custom").await.unwrap();
        assert_eq!(record.result(), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_metrics() {
        let h = harness(ExecutorConfig::default());
        h.executor.execute_script("1", "m").await.unwrap();
        h.executor.execute_script("process.exit()", "m").await.unwrap();

        let metrics = h.executor.metrics();
        assert_eq!(metrics.executions, 2);
        assert_eq!(metrics.completed, 1);
        assert_eq!(metrics.policy_rejections, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_executions_are_isolated() {
        let h = harness(ExecutorConfig::default());

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let executor = h.executor.clone();
                tokio::spawn(async move {
                    let script = format!("for (let n = 0; n < {i}; n++) {{ console.log('run {i}'); }} {i}");
                    executor.execute_script(&script, &format!("c{i}")).await.unwrap()
                })
            })
            .collect();

        for (i, task) in tasks.into_iter().enumerate() {
            let record = task.await.unwrap();
            assert_eq!(record.result(), Some(&json!(i)));
            assert_eq!(record.call_count, i as u64);
            assert!(record.logs.iter().all(|line| *line == format!("run {i}")));
        }
        assert_eq!(h.ledger.len(), 8);
    }

    #[tokio::test]
    async fn test_init_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = ExecutorConfig::default().with_storage_root(dir.path());

        let executor = ScriptExecutor::init(config.clone()).unwrap();
        ScriptExecutor::init(config.clone()).unwrap();
        assert!(config.scripts_dir.is_dir());
        assert!(config.results_dir.is_dir());
        assert!(config.logs_dir.is_dir());

        let record = executor.execute_script("console.log('hi'); 2 * 21", "disk").await.unwrap();
        let history = executor.get_script_history("disk").unwrap();
        assert_eq!(history, vec![record.clone()]);

        let transcript = config.logs_dir.join(format!("disk_{}.log", record.execution_id));
        assert_eq!(std::fs::read_to_string(transcript).unwrap(), "[log] hi\n");
        let script = config.scripts_dir.join(format!("disk_{}.js", record.execution_id));
        assert!(script.is_file());
    }

    #[tokio::test]
    async fn test_init_fails_when_directory_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let err = ScriptExecutor::init(ExecutorConfig::default().with_storage_root(&blocker)).unwrap_err();
        assert!(matches!(err, ExecutorError::Storage(_)));
    }
}
