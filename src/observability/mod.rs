//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields (pool, server, url, outcome)
//!
//! Consumers:
//!     → logging.rs (fmt subscriber on stdout, filtered by verbosity / RUST_LOG)
//! ```

pub mod logging;

pub use logging::{init_logging, Verbosity};
