//! Validation harness for weighted load balancing in a reverse proxy.

pub mod balance;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod mock;
pub mod observability;
pub mod polling;
pub mod proxy;
pub mod runner;
pub mod upstream;

pub use balance::{verify, BalanceReport, CheckFailure};
pub use config::HarnessConfig;
pub use error::{HarnessError, Result, ScenarioError};
pub use mock::{MockServer, MockServerConfig};
pub use polling::{Expect, Outcome, PollingClient};
pub use proxy::ProxyHandle;
pub use runner::ScenarioRunner;
pub use upstream::{ServerSpec, Upstream, UpstreamOptions};
