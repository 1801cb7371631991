//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! harness.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → HarnessConfig (validated, immutable)
//!     → CLI overrides applied in main.rs
//! ```
//!
//! # Design Decisions
//! - All fields have defaults; an empty file runs the built-in scenarios
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    HarnessConfig, LoadConfig, ObservabilityConfig, PollingConfig, ProxyConfig, ReweightConfig,
    ScenarioConfig,
};
pub use validation::{validate_config, ValidationError};
