//! QuickJS sandbox for bounded script execution.
//!
//! Each [`Sandbox::run`] builds a fresh runtime, so nothing leaks between
//! runs. Limits are enforced from the engine's interrupt hook, which stops
//! the script with an exception it cannot catch.

use crate::budget::CallBudget;
use crate::context::ContextHandle;
use crate::host::HostBindings;
use crate::memory::MemoryLimit;
use crate::sanitize::Sanitizer;
use rquickjs::{Ctx, Runtime, Value};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use warden_core::ErrorInfo;

/// Sandbox configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxConfig {
    /// Wall-clock limit in milliseconds
    pub timeout_ms: u64,
    /// Maximum console calls
    pub max_calls: u64,
    /// Heap limit
    pub memory: MemoryLimit,
}

impl SandboxConfig {
    /// Create a new sandbox config
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout_ms: 5_000,
            max_calls: 1_000,
            memory: MemoryLimit::default(),
        }
    }

    /// Set the wall-clock limit
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the call budget
    #[must_use]
    pub fn with_max_calls(mut self, max_calls: u64) -> Self {
        self.max_calls = max_calls;
        self
    }

    /// Set the heap limit in bytes
    #[must_use]
    pub fn with_memory_limit(mut self, max_bytes: u64) -> Self {
        self.memory = MemoryLimit::new(max_bytes);
        self
    }

    /// Wall-clock limit as a duration
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative cancellation shared with the interrupt hook
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation was requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Error raised by script code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptFault {
    /// Error name, if the thrown value had one
    pub name: Option<String>,
    /// Error message or the rendered thrown value
    pub message: String,
    /// Script stack trace
    pub stack: Option<String>,
    /// Whether the fault came from the allocator ceiling
    pub out_of_memory: bool,
}

impl std::fmt::Display for ScriptFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}: {}", name, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Engine-level outcome of a failed run
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SandboxError {
    /// Deadline passed or the run was cancelled
    #[error("Script execution timed out after {limit_ms}ms")]
    Timeout {
        /// Configured limit
        limit_ms: u64,
    },
    /// Too many console calls
    #[error("Call budget exceeded: more than {limit} host calls")]
    CallBudgetExceeded {
        /// Configured limit
        limit: u64,
    },
    /// Heap above the limit
    #[error("Memory limit exceeded: {used} bytes used (limit {limit} bytes)")]
    MemoryLimitExceeded {
        /// Sampled or ceiling usage
        used: u64,
        /// Configured limit
        limit: u64,
    },
    /// Script threw
    #[error("{0}")]
    Script(ScriptFault),
    /// Engine could not be set up
    #[error("Sandbox initialization failed: {0}")]
    Init(String),
    /// Worker thread died before reporting
    #[error("Sandbox worker aborted: {0}")]
    Aborted(String),
}

impl SandboxError {
    /// Structured error for an execution record
    #[must_use]
    pub fn error_info(&self) -> ErrorInfo {
        match self {
            Self::Timeout { limit_ms } => ErrorInfo::timeout(*limit_ms),
            Self::CallBudgetExceeded { limit } => ErrorInfo::call_budget(*limit),
            Self::MemoryLimitExceeded { used, limit } => ErrorInfo::memory(*used, *limit),
            Self::Script(fault) => {
                ErrorInfo::runtime(fault.name.clone(), fault.message.clone(), fault.stack.clone())
            }
            Self::Init(_) | Self::Aborted(_) => {
                ErrorInfo::runtime(Some("InternalError".to_string()), self.to_string(), None)
            }
        }
    }
}

/// Result of one sandbox run
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxRun {
    /// Sanitized completion value or failure
    pub outcome: Result<JsonValue, SandboxError>,
    /// Interpreter heap usage sampled after the run
    pub memory_used: Option<u64>,
}

impl SandboxRun {
    /// A run that produced no heap sample
    #[must_use]
    pub fn failed(error: SandboxError) -> Self {
        Self {
            outcome: Err(error),
            memory_used: None,
        }
    }
}

/// Sandbox for bounded script execution
#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    config: SandboxConfig,
}

impl Sandbox {
    /// Create a sandbox
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Run `source` to completion on the current thread.
    ///
    /// Console output lands in `context`. Blocks for at most about the
    /// configured timeout; call it from a blocking worker.
    pub fn run(&self, source: &str, context: &ContextHandle, cancel: &CancellationToken) -> SandboxRun {
        let runtime = match Runtime::new() {
            Ok(runtime) => runtime,
            Err(err) => return SandboxRun::failed(SandboxError::Init(err.to_string())),
        };
        runtime.set_memory_limit(usize::try_from(self.config.memory.hard_ceiling()).unwrap_or(usize::MAX));

        let started = Instant::now();
        let timeout = self.config.timeout();
        let timed_out = Arc::new(AtomicBool::new(false));
        {
            let timed_out = timed_out.clone();
            let cancel = cancel.clone();
            let budget = context.clone();
            runtime.set_interrupt_handler(Some(Box::new(move || {
                if cancel.is_cancelled() || started.elapsed() >= timeout {
                    timed_out.store(true, Ordering::SeqCst);
                    return true;
                }
                budget.budget_exhausted()
            })));
        }

        let deadline = started.checked_add(timeout);
        let mut bindings = HostBindings::new(context.clone(), CallBudget::new(self.config.max_calls));
        if let Some(deadline) = deadline {
            bindings = bindings.with_deadline(deadline);
        }
        let js = match bindings.build(&runtime) {
            Ok(js) => js,
            Err(err) => return SandboxRun::failed(SandboxError::Init(err.to_string())),
        };

        let evaluated = js.with(|ctx| match ctx.eval::<Value, _>(source) {
            Ok(value) => {
                let mut sanitizer = Sanitizer::new(ctx.clone());
                if let Some(deadline) = deadline {
                    sanitizer = sanitizer.with_deadline(deadline);
                }
                let json = sanitizer.sanitize(&value);
                if sanitizer.expired() {
                    timed_out.store(true, Ordering::SeqCst);
                }
                Ok(json)
            }
            Err(err) => Err(fault_from(&ctx, err)),
        });

        let memory_used = u64::try_from(runtime.memory_usage().malloc_size).unwrap_or(0);
        let outcome = self.classify(
            evaluated,
            memory_used,
            timed_out.load(Ordering::SeqCst),
            context.budget_exhausted(),
        );
        tracing::trace!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            memory_used,
            ok = outcome.is_ok(),
            "sandbox run finished"
        );

        SandboxRun {
            outcome,
            memory_used: Some(memory_used),
        }
    }

    fn classify(
        &self,
        evaluated: Result<JsonValue, ScriptFault>,
        memory_used: u64,
        timed_out: bool,
        budget_exhausted: bool,
    ) -> Result<JsonValue, SandboxError> {
        if timed_out {
            return Err(SandboxError::Timeout {
                limit_ms: self.config.timeout_ms,
            });
        }
        if budget_exhausted {
            return Err(SandboxError::CallBudgetExceeded {
                limit: self.config.max_calls,
            });
        }
        let limit = self.config.memory.max_bytes;
        match evaluated {
            Err(fault) if fault.out_of_memory || memory_used > limit => Err(SandboxError::MemoryLimitExceeded {
                used: memory_used.max(self.config.memory.hard_ceiling()),
                limit,
            }),
            Err(fault) => Err(SandboxError::Script(fault)),
            Ok(value) => {
                self.config
                    .memory
                    .check(memory_used)
                    .map_err(|_| SandboxError::MemoryLimitExceeded {
                        used: memory_used,
                        limit,
                    })?;
                Ok(value)
            }
        }
    }
}

/// Describe whatever the script threw
fn fault_from<'js>(ctx: &Ctx<'js>, err: rquickjs::Error) -> ScriptFault {
    if matches!(err, rquickjs::Error::Allocation) {
        return ScriptFault {
            name: Some("InternalError".to_string()),
            message: "out of memory".to_string(),
            stack: None,
            out_of_memory: true,
        };
    }
    if !matches!(err, rquickjs::Error::Exception) {
        return ScriptFault {
            name: None,
            message: err.to_string(),
            stack: None,
            out_of_memory: false,
        };
    }

    let thrown: Value<'js> = ctx.catch();
    let (name, message, stack) = match thrown.as_object().filter(|_| !thrown.is_function()) {
        Some(object) => {
            let read = |key: &str| object.get::<_, Option<String>>(key).ok().flatten();
            (read("name"), read("message"), read("stack"))
        }
        None => (None, None, None),
    };
    let message = match message {
        Some(message) => message,
        None => Sanitizer::new(ctx.clone()).render(&thrown),
    };
    let out_of_memory = name.as_deref() == Some("InternalError") && message == "out of memory";

    ScriptFault {
        name,
        message,
        stack,
        out_of_memory,
    }
}
