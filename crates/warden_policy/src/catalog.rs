//! The built-in blacklist catalog.
//!
//! Order matters: when a script mentions several symbols, the entry listed
//! first is the one reported.

use serde::{Deserialize, Serialize};
use warden_core::{PolicyViolation, RiskLevel};

/// A named capability disallowed in sandboxed scripts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistEntry {
    /// Symbol matched as a whole word
    pub symbol: String,
    /// Risk tier
    pub risk_level: RiskLevel,
    /// Why the symbol is blocked
    pub reasons: Vec<String>,
}

impl BlacklistEntry {
    /// Create a new entry
    #[must_use]
    pub fn new(symbol: &str, risk_level: RiskLevel, reasons: &[&str]) -> Self {
        Self {
            symbol: symbol.to_string(),
            risk_level,
            reasons: reasons.iter().map(|r| (*r).to_string()).collect(),
        }
    }

    /// Violation reported when this entry matches
    #[must_use]
    pub fn violation(&self) -> PolicyViolation {
        PolicyViolation {
            symbol: self.symbol.clone(),
            risk_level: self.risk_level,
            reasons: self.reasons.clone(),
        }
    }
}

/// The default catalog, in match-priority order
#[must_use]
pub fn default_entries() -> Vec<BlacklistEntry> {
    use RiskLevel::{Critical, High, Low, Medium};

    vec![
        BlacklistEntry::new(
            "require",
            Critical,
            &[
                "Loads arbitrary host modules",
                "Provides filesystem access through the fs module",
                "Provides network access through the net and http modules",
                "Can spawn system commands through child_process",
            ],
        ),
        BlacklistEntry::new(
            "process",
            Critical,
            &[
                "Exposes the host process object",
                "Can read environment variables and secrets",
                "Can terminate the host through process.exit",
            ],
        ),
        BlacklistEntry::new(
            "child_process",
            Critical,
            &["Can spawn arbitrary system commands"],
        ),
        BlacklistEntry::new(
            "fs",
            Critical,
            &[
                "Direct filesystem access",
                "Can read or overwrite files on the host",
            ],
        ),
        BlacklistEntry::new(
            "eval",
            High,
            &[
                "Evaluates arbitrary code at runtime",
                "Bypasses static screening",
            ],
        ),
        BlacklistEntry::new(
            "Function",
            High,
            &[
                "The Function constructor compiles arbitrary code at runtime",
                "Bypasses static screening",
            ],
        ),
        BlacklistEntry::new(
            "import",
            High,
            &["Loads arbitrary modules dynamically"],
        ),
        BlacklistEntry::new(
            "global",
            High,
            &["Exposes the host global object"],
        ),
        BlacklistEntry::new(
            "globalThis",
            Medium,
            &["Reaches the global object and can tamper with host bindings"],
        ),
        BlacklistEntry::new(
            "WebAssembly",
            High,
            &["Compiles and runs native-speed code outside static screening"],
        ),
        BlacklistEntry::new(
            "Worker",
            High,
            &["Starts concurrent execution outside the wall-clock timeout"],
        ),
        BlacklistEntry::new(
            "SharedArrayBuffer",
            Medium,
            &["Shares memory across execution contexts"],
        ),
        BlacklistEntry::new(
            "Atomics",
            Medium,
            &["Can block the worker thread on shared memory"],
        ),
        BlacklistEntry::new("fetch", High, &["Network access"]),
        BlacklistEntry::new("XMLHttpRequest", High, &["Network access"]),
        BlacklistEntry::new("WebSocket", High, &["Network access"]),
        BlacklistEntry::new(
            "Buffer",
            Medium,
            &["Allocates raw memory outside script heap accounting"],
        ),
        BlacklistEntry::new(
            "setTimeout",
            Medium,
            &["Schedules work that can outlive the execution window"],
        ),
        BlacklistEntry::new(
            "setInterval",
            Medium,
            &["Schedules work that can outlive the execution window"],
        ),
        BlacklistEntry::new(
            "setImmediate",
            Medium,
            &["Schedules work that can outlive the execution window"],
        ),
        BlacklistEntry::new(
            "__proto__",
            Medium,
            &["Enables prototype pollution of shared built-ins"],
        ),
        BlacklistEntry::new(
            "Proxy",
            Low,
            &["Can intercept property access to probe the host environment"],
        ),
        BlacklistEntry::new(
            "Reflect",
            Low,
            &["Gives reflective access to host-provided bindings"],
        ),
        BlacklistEntry::new(
            "__dirname",
            Low,
            &["Discloses host filesystem layout"],
        ),
        BlacklistEntry::new(
            "__filename",
            Low,
            &["Discloses host filesystem layout"],
        ),
    ]
}
