//! Scenario results.

use std::fmt;
use std::time::Duration;

use crate::balance::BalanceReport;
use crate::error::ScenarioError;

/// Outcome of one scenario run.
#[derive(Debug)]
pub struct ScenarioResult {
    pub name: String,
    /// One report per balance check that passed, in phase order.
    pub reports: Vec<BalanceReport>,
    /// First failure; `None` when every phase passed.
    pub error: Option<ScenarioError>,
    pub elapsed: Duration,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

impl fmt::Display for ScenarioResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            None => write!(f, "PASS {} ({:.2?})", self.name, self.elapsed),
            Some(e) => write!(f, "FAIL {} ({:.2?}): {}", self.name, self.elapsed, e),
        }
    }
}

/// Results of a whole run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub results: Vec<ScenarioResult>,
}

impl RunSummary {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results.iter().filter(|r| !r.passed())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in &self.results {
            writeln!(f, "{}", result)?;
        }
        write!(
            f,
            "{} scenarios, {} passed, {} failed",
            self.results.len(),
            self.passed(),
            self.failed()
        )
    }
}
