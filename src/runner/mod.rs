//! Scenario runner.
//!
//! # Data Flow
//! ```text
//! HarnessConfig.effective_scenarios()
//!     → select_scenarios (--scenario filter)
//!     → order_scenarios (shuffled, or alphabetical with --ordered)
//!     → ScenarioRunner::run (one pool per scenario, stopped afterwards)
//!     → RunSummary (exit status)
//! ```

pub mod report;
pub mod scenario;

pub use report::{RunSummary, ScenarioResult};
pub use scenario::{order_scenarios, select_scenarios, ScenarioRunner};
