//! Upstream (server pool) subsystem.
//!
//! # Data Flow
//! ```text
//! Setup:
//!     name + [ServerSpec] + weights
//!     → spec.rs (weight resolution: explicit > positional > default)
//!     → pool.rs starts MockServers, polls each /ready until ok
//!
//! Measurement:
//!     send_load → polling burst → counters.rs outcome histogram
//!     MockServer hook → counters.rs hits[server]
//!     → balance::verify → BalanceReport / CheckFailure
//! ```
//!
//! # Design Decisions
//! - Members have independent lifecycles; `stop_server` leaves siblings up
//! - Counters are per pool and lock-free per server
//! - A recreated pool starts from zero; counters are never carried over

pub mod counters;
pub mod pool;
pub mod spec;

pub use counters::{HitRecorder, PoolCounters};
pub use pool::{Upstream, UpstreamOptions};
pub use spec::{ServerConfig, ServerSpec, DEFAULT_HOST, DEFAULT_WEIGHT};
