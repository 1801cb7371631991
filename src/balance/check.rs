//! Pool-level verification failures.
//!
//! These are assertion results, not transport errors: every variant names the
//! pool and carries the numbers a reader needs to see what went wrong.

use thiserror::Error;

use crate::balance::verifier::BalanceReport;
use crate::polling::Outcome;

#[derive(Debug, Clone, Error)]
pub enum CheckFailure {
    /// Observed traffic share strays beyond tolerance.
    #[error("upstream {pool} not balanced: {}", .report.diagnostic())]
    Imbalance { pool: String, report: BalanceReport },

    /// Backend hits and successful responses disagree.
    #[error("upstream {pool}: expected to see {ok_responses} total ok responses, saw {hits} hits")]
    AccountingMismatch {
        pool: String,
        ok_responses: u64,
        hits: u64,
    },

    /// Load generation saw non-`ok` outcomes.
    #[error("errors found in requests to upstream {pool}: {outcome} ({count} times)")]
    RequestErrors {
        pool: String,
        outcome: Outcome,
        count: u64,
    },
}

impl CheckFailure {
    pub fn pool(&self) -> &str {
        match self {
            CheckFailure::Imbalance { pool, .. }
            | CheckFailure::AccountingMismatch { pool, .. }
            | CheckFailure::RequestErrors { pool, .. } => pool,
        }
    }
}
