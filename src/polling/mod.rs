//! Polling and load-generation subsystem.
//!
//! # Data Flow
//! ```text
//! Readiness / shutdown confirmation:
//!     url + Expect (e.g. "ok", "!couldnt_connect")
//!     → client.rs poll_until (one GET per iteration, sleep, deadline)
//!     → Outcome or PollTimeout
//!
//! Load generation:
//!     url + count
//!     → client.rs burst (sequential or bounded concurrency)
//!     → outcome.rs OutcomeCounts histogram
//! ```
//!
//! # Design Decisions
//! - Connection errors are outcomes, never errors: "down" is a state we poll for
//! - Timeout is the only cancellation mechanism

pub mod client;
pub mod outcome;

pub use client::{PollOptions, PollingClient, X_REQUEST_ID};
pub use outcome::{Expect, Outcome, OutcomeCounts, UnknownOutcome};
