//! Risk tiers and policy violations.

use serde::{Deserialize, Serialize};

/// Risk tier attached to a blacklisted symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Information disclosure or probing
    Low,
    /// Can subvert accounting or shared state
    Medium,
    /// Can run code outside static screening
    High,
    /// Direct access to the host process, filesystem, or network
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        f.write_str(s)
    }
}

/// A script referenced a blacklisted symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyViolation {
    /// The symbol that matched
    pub symbol: String,
    /// Risk tier of the symbol
    pub risk_level: RiskLevel,
    /// Human-readable justifications, in catalog order
    pub reasons: Vec<String>,
}

impl PolicyViolation {
    /// One-line summary used as the error message in records
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Script references blacklisted symbol '{}' ({} risk): {}",
            self.symbol,
            self.risk_level,
            self.reasons.join("; ")
        )
    }
}

impl std::fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_level_order() {
        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::High < RiskLevel::Critical);
    }

    #[test]
    fn test_risk_level_serde() {
        assert_eq!(
            serde_json::to_string(&RiskLevel::Critical).unwrap(),
            "\"CRITICAL\""
        );
    }

    #[test]
    fn test_violation_summary() {
        let v = PolicyViolation {
            symbol: "require".to_string(),
            risk_level: RiskLevel::Critical,
            reasons: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            v.summary(),
            "Script references blacklisted symbol 'require' (CRITICAL risk): a; b"
        );
    }
}
