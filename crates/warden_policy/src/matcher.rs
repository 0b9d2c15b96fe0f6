//! Whole-word matching of script text against the blacklist.

use crate::catalog::{BlacklistEntry, default_entries};
use once_cell::sync::Lazy;
use regex::RegexSet;
use warden_core::PolicyViolation;

/// Errors building a blacklist
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// Entry with an empty symbol
    #[error("Blacklist entry {index} has an empty symbol")]
    EmptySymbol {
        /// Position in the catalog
        index: usize,
    },

    /// Pattern compilation failed
    #[error("Invalid blacklist pattern: {0}")]
    InvalidPattern(String),
}

static DEFAULT_BLACKLIST: Lazy<Blacklist> = Lazy::new(|| {
    Blacklist::new(default_entries()).expect("built-in blacklist patterns compile")
});

/// The process-wide built-in blacklist
#[must_use]
pub fn default_blacklist() -> &'static Blacklist {
    &DEFAULT_BLACKLIST
}

/// Check a script against the built-in blacklist
///
/// # Errors
///
/// Returns the first matching entry as a violation
pub fn check_blacklist(script: &str) -> Result<(), PolicyViolation> {
    default_blacklist().check(script)
}

/// Compiled, read-only blacklist
#[derive(Debug, Clone)]
pub struct Blacklist {
    entries: Vec<BlacklistEntry>,
    patterns: RegexSet,
}

impl Blacklist {
    /// Compile a blacklist from entries in priority order
    ///
    /// # Errors
    ///
    /// Returns error if an entry is empty or a pattern fails to compile
    pub fn new(entries: Vec<BlacklistEntry>) -> Result<Self, PolicyError> {
        let mut patterns = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            if entry.symbol.is_empty() {
                return Err(PolicyError::EmptySymbol { index });
            }
            patterns.push(word_pattern(&entry.symbol));
        }

        let patterns =
            RegexSet::new(&patterns).map_err(|e| PolicyError::InvalidPattern(e.to_string()))?;

        Ok(Self { entries, patterns })
    }

    /// Entries in priority order
    #[must_use]
    pub fn entries(&self) -> &[BlacklistEntry] {
        &self.entries
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the blacklist has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reject the script if it mentions any blacklisted symbol
    ///
    /// # Errors
    ///
    /// Returns the highest-priority matching entry as a violation
    pub fn check(&self, script: &str) -> Result<(), PolicyViolation> {
        match self.patterns.matches(script).iter().next() {
            Some(index) => Err(self.entries[index].violation()),
            None => Ok(()),
        }
    }

    /// Every matching entry, in priority order
    #[must_use]
    pub fn scan(&self, script: &str) -> Vec<PolicyViolation> {
        self.patterns
            .matches(script)
            .iter()
            .map(|index| self.entries[index].violation())
            .collect()
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// `\b` only anchors where the symbol itself starts or ends with a word
/// character; elsewhere it would demand a boundary that cannot exist.
fn word_pattern(symbol: &str) -> String {
    let head = if symbol.starts_with(is_word_char) { r"\b" } else { "" };
    let tail = if symbol.ends_with(is_word_char) { r"\b" } else { "" };
    format!("{}{}{}", head, regex::escape(symbol), tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use warden_core::RiskLevel;

    #[test]
    fn test_require_fs_rejected() {
        let violation = check_blacklist("require('fs')").unwrap_err();
        assert_eq!(violation.symbol, "require");
        assert_eq!(violation.risk_level, RiskLevel::Critical);
        assert!(violation.reasons.iter().any(|r| r.contains("filesystem")));
    }

    #[test]
    fn test_clean_scripts_pass() {
        assert!(check_blacklist("let x=5; let y=10; x+y;").is_ok());
        assert!(check_blacklist("throw new Error('boom')").is_ok());
        assert!(check_blacklist("while(true){}").is_ok());
        assert!(check_blacklist("console.log(Math.max(1, 2))").is_ok());
    }

    #[test]
    fn test_whole_word_only() {
        assert!(check_blacklist("let evaluate = 1; evaluate").is_ok());
        assert!(check_blacklist("let requirement = 'x'").is_ok());
        assert!(check_blacklist("let processed = [1]; processed").is_ok());
        assert!(check_blacklist("let prefs = {}; prefs").is_ok());
        assert!(check_blacklist("const myFunction = 1").is_ok());
    }

    #[test]
    fn test_member_access_is_a_word() {
        let violation = check_blacklist("obj.eval(1)").unwrap_err();
        assert_eq!(violation.symbol, "eval");
    }

    // The filter is lexical: mentions in comments and string literals are
    // rejected too. This is expected behavior.
    #[test]
    fn test_comments_and_strings_are_rejected() {
        assert!(check_blacklist("// never call eval here\n1").is_err());
        assert!(check_blacklist("const note = 'process';").is_err());
    }

    #[test]
    fn test_first_entry_wins() {
        let violation = check_blacklist("eval(x); require('y')").unwrap_err();
        assert_eq!(violation.symbol, "require");
    }

    #[test]
    fn test_scan_reports_all_in_order() {
        let found = default_blacklist().scan("eval(require('fs'))");
        let symbols: Vec<_> = found.iter().map(|v| v.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["require", "fs", "eval"]);
    }

    #[test]
    fn test_custom_blacklist() {
        let list = Blacklist::new(vec![
            BlacklistEntry::new("$secret", RiskLevel::Low, &["custom"]),
            BlacklistEntry::new("danger", RiskLevel::High, &["custom"]),
        ])
        .unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.check("x = $secret").unwrap_err().symbol, "$secret");
        assert!(list.check("dangerous()").is_ok());
        assert!(list.check("danger()").is_err());
    }

    #[test]
    fn test_empty_symbol_rejected() {
        let err = Blacklist::new(vec![BlacklistEntry::new("", RiskLevel::Low, &[])]).unwrap_err();
        assert_eq!(err, PolicyError::EmptySymbol { index: 0 });
    }

    #[test]
    fn test_default_blacklist_is_shared() {
        assert!(std::ptr::eq(default_blacklist(), default_blacklist()));
        assert!(!default_blacklist().is_empty());
    }

    proptest! {
        #[test]
        fn prop_longer_identifiers_never_match(index in 0usize..25, suffix in "[a-z]{1,8}") {
            let entries = default_entries();
            let symbol = &entries[index % entries.len()].symbol;
            let script = format!("let {}{} = 1;", symbol, suffix);
            prop_assert!(check_blacklist(&script).is_ok());
        }

        #[test]
        fn prop_bare_symbol_always_matches(index in 0usize..25) {
            let entries = default_entries();
            let entry = &entries[index % entries.len()];
            let script = format!("x = 1; {}; y = 2", entry.symbol);
            let found = default_blacklist().scan(&script);
            prop_assert!(found.iter().any(|v| v.symbol == entry.symbol));
        }
    }
}
