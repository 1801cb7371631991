//! Weighted balance verification.
//!
//! Pure computation over hit counts and weights. For every weighted server:
//!
//! ```text
//! expected  = total_hits * weight / total_weight
//! deviation = (observed - expected) / expected
//! ```
//!
//! The pool is balanced when the largest `|deviation|` is within tolerance.
//! Deviations are relative, so the same tolerance works for small and large
//! weights and for any request volume.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{HarnessError, Result};

/// Tolerance used when none is given.
pub const DEFAULT_TOLERANCE: f64 = 0.05;

/// Observed versus expected share for one server.
#[derive(Debug, Clone, PartialEq)]
pub struct Deviation {
    pub server: String,
    pub weight: f64,
    pub observed: u64,
    pub expected: f64,
    /// Signed relative error; `0.6` means 60% more hits than expected.
    pub ratio: f64,
}

impl Deviation {
    /// Signed percentage for display, e.g. `+60%` or `-7%`.
    pub fn percent(&self) -> String {
        let sign = if self.ratio < 0.0 { '-' } else { '+' };
        format!("{}{}%", sign, (self.ratio.abs() * 100.0).round())
    }
}

/// Result of a balance check.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceReport {
    pub total_hits: u64,
    pub total_weight: f64,
    pub tolerance: f64,
    /// One entry per weighted server, ordered by server name.
    pub deviations: Vec<Deviation>,
}

impl BalanceReport {
    pub fn is_balanced(&self) -> bool {
        self.max_abs_deviation() <= self.tolerance
    }

    pub fn max_abs_deviation(&self) -> f64 {
        self.deviations
            .iter()
            .map(|d| d.ratio.abs())
            .fold(0.0, f64::max)
    }

    pub fn deviation(&self, server: &str) -> Option<&Deviation> {
        self.deviations.iter().find(|d| d.server == server)
    }

    /// `"a:+60%, b:-60%"`.
    pub fn diagnostic(&self) -> String {
        self.deviations
            .iter()
            .map(|d| format!("{}:{}", d.server, d.percent()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for BalanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} hits over weight {}: {}",
            self.total_hits,
            self.total_weight,
            self.diagnostic()
        )
    }
}

/// Compare `hits` against the share `weights` asks for.
///
/// Servers with a weight but no hits count as zero hits. Hits for a server
/// without a weight are rejected, as is an empty or non-positive weight set.
pub fn verify(
    hits: &BTreeMap<String, u64>,
    weights: &BTreeMap<String, f64>,
    tolerance: f64,
) -> Result<BalanceReport> {
    if !(tolerance > 0.0 && tolerance < 1.0) {
        return Err(HarnessError::InvalidTolerance(tolerance));
    }
    for (server, weight) in weights {
        if !weight.is_finite() || *weight <= 0.0 {
            return Err(HarnessError::InvalidWeight {
                server: server.clone(),
                weight: *weight,
            });
        }
    }
    if let Some(server) = hits.keys().find(|s| !weights.contains_key(*s)) {
        return Err(HarnessError::UnknownServer {
            server: server.clone(),
        });
    }

    let total_weight: f64 = weights.values().sum();
    if total_weight <= 0.0 {
        return Err(HarnessError::NoWeights);
    }
    let total_hits: u64 = hits.values().sum();

    let deviations = weights
        .iter()
        .map(|(server, weight)| {
            let observed = hits.get(server).copied().unwrap_or(0);
            let expected = total_hits as f64 * weight / total_weight;
            let ratio = if total_hits == 0 {
                0.0
            } else {
                (observed as f64 - expected) / expected
            };
            Deviation {
                server: server.clone(),
                weight: *weight,
                observed,
                expected,
                ratio,
            }
        })
        .collect();

    Ok(BalanceReport {
        total_hits,
        total_weight,
        tolerance,
        deviations,
    })
}
