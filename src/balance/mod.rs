//! Balance verification subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream counters (hits per server) + configured weights
//!     → verifier.rs (expected share, signed relative deviation)
//!     → BalanceReport (verdict + per-server table)
//!     → check.rs CheckFailure::Imbalance when out of tolerance
//! ```
//!
//! # Design Decisions
//! - No I/O: the verifier is a pure function and unit-tested as such
//! - Zero traffic is balanced by definition

pub mod check;
pub mod verifier;

pub use check::CheckFailure;
pub use verifier::{verify, BalanceReport, Deviation, DEFAULT_TOLERANCE};
