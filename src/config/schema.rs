//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the harness.
//! All types derive Serde traits for deserialization from TOML files, and
//! every section has defaults so a minimal (or empty) file is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::balance::DEFAULT_TOLERANCE;
use crate::mock::RequestLogging;
use crate::polling::PollOptions;
use crate::upstream::ServerSpec;

/// Root configuration for the harness.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HarnessConfig {
    /// The proxy under test.
    pub proxy: ProxyConfig,

    /// Readiness / shutdown polling.
    pub polling: PollingConfig,

    /// Load generation defaults.
    pub load: LoadConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,

    /// Scenarios to run. Empty means the built-in set.
    pub scenarios: Vec<ScenarioConfig>,
}

impl HarnessConfig {
    /// Configured scenarios, or the built-in set when none are given.
    pub fn effective_scenarios(&self) -> Vec<ScenarioConfig> {
        if self.scenarios.is_empty() {
            ScenarioConfig::builtin()
        } else {
            self.scenarios.clone()
        }
    }
}

/// How to reach, start and stop the proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Base URL load is sent to (e.g., "http://127.0.0.1:8082").
    pub url: String,

    /// Readiness path on the proxy.
    pub ready_path: String,

    /// Program and arguments that launch the proxy. Empty: externally managed.
    pub start_command: Vec<String>,

    /// Program and arguments that stop the proxy. Empty: kill the spawned child.
    pub stop_command: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8082".to_string(),
            ready_path: "/ready".to_string(),
            start_command: Vec::new(),
            stop_command: Vec::new(),
        }
    }
}

/// Polling timings in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    pub max_wait_ms: u64,
    pub retry_interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        let defaults = PollOptions::default();
        Self {
            max_wait_ms: defaults.max_wait.as_millis() as u64,
            retry_interval_ms: defaults.retry_interval.as_millis() as u64,
            request_timeout_ms: defaults.request_timeout.as_millis() as u64,
        }
    }
}

impl PollingConfig {
    pub fn to_options(&self) -> PollOptions {
        PollOptions {
            max_wait: Duration::from_millis(self.max_wait_ms),
            retry_interval: Duration::from_millis(self.retry_interval_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }
}

/// Load generation defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Requests per phase when a scenario does not say.
    pub requests: u64,

    /// Requests in flight; 1 is sequential.
    pub concurrency: usize,

    /// Allowed relative deviation per backend.
    pub tolerance: f64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            requests: 1000,
            concurrency: 1,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Per-request logging on mock backends.
    pub request_logging: RequestLogging,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            request_logging: RequestLogging::Off,
        }
    }
}

/// One balance scenario.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScenarioConfig {
    /// Pool name; also the default load path (`/<name>`).
    pub name: String,

    pub servers: Vec<ServerSpec>,

    /// Positional weights.
    #[serde(default)]
    pub weights: Option<Vec<f64>>,

    /// Overrides `load.requests`.
    #[serde(default)]
    pub requests: Option<u64>,

    /// Overrides `load.tolerance`.
    #[serde(default)]
    pub tolerance: Option<f64>,

    /// Second phase after pushing new weights to the proxy.
    #[serde(default)]
    pub reweight: Option<ReweightConfig>,

    /// Port of a member to stop for a peer-failure phase.
    #[serde(default)]
    pub fail_server: Option<u16>,
}

/// New weights for the second phase of a scenario.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReweightConfig {
    /// Positional weights for the recreated pool.
    pub weights: Vec<f64>,

    /// Requests for the second phase.
    #[serde(default)]
    pub requests: Option<u64>,
}

impl ScenarioConfig {
    pub fn new(name: impl Into<String>, servers: Vec<ServerSpec>) -> Self {
        Self {
            name: name.into(),
            servers,
            weights: None,
            requests: None,
            tolerance: None,
            reweight: None,
            fail_server: None,
        }
    }

    pub fn weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Round-robin scenarios against ports 8083-8085.
    pub fn builtin() -> Vec<Self> {
        let ports = || vec![ServerSpec::Port(8083), ServerSpec::Port(8084), ServerSpec::Port(8085)];
        vec![
            Self::new("simple_roundrobin", ports()),
            Self::new("weighted_roundrobin", ports()).weights(vec![1.0, 10.0, 30.0]),
            Self {
                reweight: Some(ReweightConfig {
                    weights: vec![10.0, 6.0, 1.0],
                    requests: Some(2000),
                }),
                ..Self::new("reweighted_roundrobin", ports()).weights(vec![10.0, 20.0, 30.0])
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: HarnessConfig = toml::from_str("").unwrap();
        assert_eq!(config.proxy.url, "http://127.0.0.1:8082");
        assert_eq!(config.polling.max_wait_ms, 3000);
        assert_eq!(config.polling.retry_interval_ms, 200);
        assert_eq!(config.load.requests, 1000);
        assert_eq!(config.effective_scenarios().len(), 3);
    }

    #[test]
    fn builtin_reweight_scenario() {
        let builtin = ScenarioConfig::builtin();
        let reweighted = builtin
            .iter()
            .find(|s| s.name == "reweighted_roundrobin")
            .unwrap();
        assert_eq!(reweighted.weights, Some(vec![10.0, 20.0, 30.0]));
        let phase_two = reweighted.reweight.as_ref().unwrap();
        assert_eq!(phase_two.weights, vec![10.0, 6.0, 1.0]);
        assert_eq!(phase_two.requests, Some(2000));
    }

    #[test]
    fn parses_full_document() {
        let config: HarnessConfig = toml::from_str(
            r#"
            [proxy]
            url = "http://127.0.0.1:9000"
            start_command = ["./nginx.sh", "10"]

            [polling]
            max_wait_ms = 500

            [load]
            concurrency = 4

            [observability]
            request_logging = "very_verbose"

            [[scenarios]]
            name = "peer_failure"
            servers = [8083, 8084, { port = 8085, weight = 3 }]
            weights = [1, 10]
            fail_server = 8084
            "#,
        )
        .unwrap();

        assert_eq!(config.proxy.start_command, vec!["./nginx.sh", "10"]);
        assert_eq!(config.polling.to_options().max_wait, Duration::from_millis(500));
        assert_eq!(config.polling.retry_interval_ms, 200);
        assert_eq!(config.load.concurrency, 4);
        assert_eq!(config.observability.request_logging, RequestLogging::VeryVerbose);
        let scenario = &config.scenarios[0];
        assert_eq!(scenario.fail_server, Some(8084));
        assert_eq!(scenario.servers[2].resolve_weight(None), 3.0);
        assert_eq!(scenario.weights, Some(vec![1.0, 10.0]));
    }
}
