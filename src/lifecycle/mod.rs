//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! MockServer::stop / Drop
//!     → shutdown.rs (watch flag flips to true)
//!     → accept loop exits, listener dropped
//!     → every open connection task exits
//!
//! Standalone binaries (signals.rs):
//!     SIGINT → stop servers → exit
//! ```
//!
//! # Design Decisions
//! - One coordinator per server, never shared across a pool
//! - Stopping is asynchronous; callers confirm it by polling

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
