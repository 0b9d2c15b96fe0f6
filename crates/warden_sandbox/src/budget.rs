//! Call budget for instrumented host functions.
//!
//! Every console call is charged before it has any effect. The call that
//! pushes the count past the limit fails and leaves no trace in the
//! transcript.

use serde::{Deserialize, Serialize};

/// Maximum number of host calls a single run may make
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallBudget {
    limit: u64,
}

impl CallBudget {
    /// Create a budget allowing `limit` calls
    #[must_use]
    pub fn new(limit: u64) -> Self {
        Self { limit }
    }

    /// Configured limit
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Charge one call against `count`.
    ///
    /// The counter is incremented even when the charge fails, so it reflects
    /// every attempted call.
    ///
    /// # Errors
    ///
    /// Returns error once the incremented count exceeds the limit
    pub fn charge(&self, count: &mut u64) -> Result<u64, BudgetError> {
        *count = count.saturating_add(1);
        if *count > self.limit {
            return Err(BudgetError::Exceeded {
                limit: self.limit,
                attempted: *count,
            });
        }
        Ok(*count)
    }

    /// Calls left before the budget trips
    #[must_use]
    pub fn remaining(&self, count: u64) -> u64 {
        self.limit.saturating_sub(count)
    }
}

impl Default for CallBudget {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Budget errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BudgetError {
    /// Call attempted after the budget was spent
    #[error("Call budget exceeded: call {attempted} over limit of {limit}")]
    Exceeded {
        /// Configured limit
        limit: u64,
        /// Count including the rejected call
        attempted: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_charge_within_budget() {
        let budget = CallBudget::new(3);
        let mut count = 0;

        assert_eq!(budget.charge(&mut count), Ok(1));
        assert_eq!(budget.charge(&mut count), Ok(2));
        assert_eq!(budget.charge(&mut count), Ok(3));
        assert_eq!(budget.remaining(count), 0);
    }

    #[test]
    fn test_charge_over_budget() {
        let budget = CallBudget::new(2);
        let mut count = 2;

        let err = budget.charge(&mut count).unwrap_err();
        assert_eq!(
            err,
            BudgetError::Exceeded {
                limit: 2,
                attempted: 3
            }
        );
        assert_eq!(count, 3);
    }

    #[test]
    fn test_zero_budget_rejects_first_call() {
        let budget = CallBudget::new(0);
        let mut count = 0;

        assert!(budget.charge(&mut count).is_err());
        assert_eq!(count, 1);
    }

    proptest! {
        #[test]
        fn prop_successful_charges_capped_by_limit(limit in 0u64..50, calls in 0u64..100) {
            let budget = CallBudget::new(limit);
            let mut count = 0;
            let accepted = (0..calls).filter(|_| budget.charge(&mut count).is_ok()).count() as u64;

            prop_assert_eq!(accepted, calls.min(limit));
            prop_assert_eq!(count, calls);
        }
    }
}
