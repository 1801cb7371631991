//! Named, weighted group of mock backends.
//!
//! # Responsibilities
//! - Start every member and wait until each answers its readiness path
//! - Count which member served each request (via `HitRecorder`)
//! - Drive load through the proxy and keep the outcome histogram
//! - Stop members and wait until each is unreachable
//! - Judge balance and accounting against the configured weights

use std::collections::BTreeMap;
use std::sync::Arc;

use url::Url;

use crate::balance::{self, BalanceReport, CheckFailure};
use crate::error::{HarnessError, Result, ScenarioError};
use crate::mock::{MockServer, MockServerConfig, RequestLogging, RequestObserver};
use crate::polling::{Expect, Outcome, OutcomeCounts, PollingClient};
use crate::upstream::counters::{HitRecorder, PoolCounters};
use crate::upstream::spec::ServerSpec;

/// How a pool reaches the proxy and configures its members.
#[derive(Clone)]
pub struct UpstreamOptions {
    /// Base URL of the proxy under test.
    pub target: Url,
    pub client: PollingClient,
    /// Default request logging for members.
    pub logging: RequestLogging,
    /// Requests in flight during `send_load`; `1` is sequential.
    pub concurrency: usize,
    /// Consulted after each hit is recorded; may switch a member into drop mode.
    pub observer: Option<Arc<dyn RequestObserver>>,
}

impl UpstreamOptions {
    pub fn new(target: Url, client: PollingClient) -> Self {
        Self {
            target,
            client,
            logging: RequestLogging::Off,
            concurrency: 1,
            observer: None,
        }
    }

    pub fn logging(mut self, logging: RequestLogging) -> Self {
        self.logging = logging;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn RequestObserver>) -> Self {
        self.observer = Some(observer);
        self
    }
}

/// A weighted pool of mock backends standing behind the proxy.
pub struct Upstream {
    name: String,
    options: UpstreamOptions,
    servers: Vec<MockServer>,
    weights: BTreeMap<String, f64>,
    counters: Arc<PoolCounters>,
}

impl Upstream {
    /// Start every member and block until all of them are ready.
    ///
    /// `weights` is positional; a structured spec's own weight wins over it.
    /// An invalid weight fails the call before any member is bound.
    pub async fn create(
        name: impl Into<String>,
        specs: Vec<ServerSpec>,
        weights: Option<Vec<f64>>,
        options: UpstreamOptions,
    ) -> Result<Self> {
        let name = name.into();
        let counters = Arc::new(PoolCounters::new());
        let recorder: Arc<dyn RequestObserver> = Arc::new(HitRecorder::new(
            Arc::clone(&counters),
            options.observer.clone(),
        ));

        // Every weight is checked before anything binds.
        let resolved = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let positional = weights.as_ref().and_then(|w| w.get(i).copied());
                let weight = spec.resolve_weight(positional);
                if weight.is_finite() && weight > 0.0 {
                    Ok(weight)
                } else {
                    Err(HarnessError::InvalidWeight {
                        server: spec.label(),
                        weight,
                    })
                }
            })
            .collect::<Result<Vec<f64>>>()?;

        let mut servers = Vec::with_capacity(specs.len());
        let mut weight_map = BTreeMap::new();

        for (spec, weight) in specs.iter().zip(resolved) {
            let config = MockServerConfig::new(spec.host(), spec.port())
                .logging(spec.logging().unwrap_or(options.logging));
            let server = MockServer::start_observed(config, Arc::clone(&recorder)).await?;

            if weight_map.insert(server.name().to_string(), weight).is_some() {
                return Err(HarnessError::DuplicateServer {
                    pool: name,
                    server: server.name().to_string(),
                });
            }
            servers.push(server);
        }

        for server in &servers {
            options
                .client
                .poll_until(&server.ready_url(), Expect::Is(Outcome::Ok))
                .await?;
        }

        tracing::info!(
            pool = %name,
            servers = servers.len(),
            weights = ?weight_map,
            "Upstream ready"
        );

        Ok(Self {
            name,
            options,
            servers,
            weights: weight_map,
            counters,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member names in creation order.
    pub fn names(&self) -> Vec<&str> {
        self.servers.iter().map(|s| s.name()).collect()
    }

    pub fn servers(&self) -> &[MockServer] {
        &self.servers
    }

    pub fn server(&self, name: &str) -> Option<&MockServer> {
        self.servers.iter().find(|s| s.name() == name)
    }

    pub fn server_by_port(&self, port: u16) -> Option<&MockServer> {
        self.servers.iter().find(|s| s.port() == port)
    }

    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    pub fn hits(&self) -> BTreeMap<String, u64> {
        self.counters.hits()
    }

    pub fn responses(&self) -> OutcomeCounts {
        self.counters.responses()
    }

    /// Clear hits and responses before a new measurement phase.
    pub fn reset_counters(&self) {
        self.counters.reset();
    }

    /// URL load is sent to: `path`, or `/<pool name>`, under the proxy base.
    pub fn load_url(&self, path: Option<&str>) -> Result<Url> {
        let default_path = format!("/{}", self.name);
        Ok(self.options.target.join(path.unwrap_or(&default_path))?)
    }

    /// Send `count` GETs through the proxy and fold the outcomes into the
    /// pool's running histogram. Counters accumulate across calls.
    pub async fn send_load(&self, path: Option<&str>, count: u64) -> Result<OutcomeCounts> {
        let url = self.load_url(path)?;
        let counts = self
            .options
            .client
            .burst_concurrent(url.as_str(), count, self.options.concurrency)
            .await;
        self.counters.record_responses(&counts);

        tracing::info!(
            pool = %self.name,
            url = %url,
            requests = count,
            outcomes = %counts,
            "Load sent"
        );
        Ok(counts)
    }

    /// Stop every member and wait until each refuses connections.
    ///
    /// Weights and counters survive so results can still be inspected.
    pub async fn stop(&mut self) -> Result<()> {
        for server in &self.servers {
            server.stop();
        }

        let mut first_error = None;
        for server in self.servers.drain(..) {
            if let Err(e) = self
                .options
                .client
                .poll_until(&server.ready_url(), Expect::Is(Outcome::CouldntConnect))
                .await
            {
                tracing::warn!(pool = %self.name, server = %server.name(), error = %e, "Server did not go down");
                first_error.get_or_insert(e);
            }
        }

        tracing::info!(pool = %self.name, "Upstream stopped");
        first_error.map_or(Ok(()), Err)
    }

    /// Stop one member and wait until it refuses connections; its siblings
    /// keep serving. The member leaves the pool, so later balance checks
    /// only cover the survivors.
    pub async fn stop_server(&mut self, name: &str) -> Result<()> {
        let index = self
            .servers
            .iter()
            .position(|s| s.name() == name)
            .ok_or_else(|| HarnessError::UnknownServer {
                server: name.to_string(),
            })?;

        let server = self.servers.remove(index);
        server.stop();
        self.weights.remove(name);
        self.counters.forget(name);

        self.options
            .client
            .poll_until(&server.ready_url(), Expect::Is(Outcome::CouldntConnect))
            .await?;

        tracing::info!(pool = %self.name, server = %name, "Server stopped");
        Ok(())
    }

    /// Total hits equal the `ok` responses seen by the load generator.
    pub fn response_counts_match(&self) -> bool {
        self.counters.total_hits() == self.counters.ok_responses()
    }

    pub fn check_accounting(&self) -> std::result::Result<(), CheckFailure> {
        let hits = self.counters.total_hits();
        let ok_responses = self.counters.ok_responses();
        if hits == ok_responses {
            Ok(())
        } else {
            Err(CheckFailure::AccountingMismatch {
                pool: self.name.clone(),
                ok_responses,
                hits,
            })
        }
    }

    /// Fail on the first non-`ok` outcome class recorded so far.
    pub fn check_no_errors(&self) -> std::result::Result<(), CheckFailure> {
        match self.counters.responses().failures().next() {
            Some((outcome, count)) => Err(CheckFailure::RequestErrors {
                pool: self.name.clone(),
                outcome,
                count,
            }),
            None => Ok(()),
        }
    }

    /// Balance report for the current hits against the configured weights.
    pub fn is_balanced(&self, tolerance: f64) -> Result<BalanceReport> {
        balance::verify(&self.counters.hits(), &self.weights, tolerance).map_err(|e| match e {
            HarnessError::NoWeights => HarnessError::EmptyPool {
                pool: self.name.clone(),
            },
            other => other,
        })
    }

    /// Accounting identity plus balance, as one assertion.
    pub fn check_balanced(&self, tolerance: f64) -> std::result::Result<BalanceReport, ScenarioError> {
        self.check_accounting()?;
        let report = self.is_balanced(tolerance)?;
        if !report.is_balanced() {
            return Err(CheckFailure::Imbalance {
                pool: self.name.clone(),
                report,
            }
            .into());
        }
        tracing::info!(
            pool = %self.name,
            hits = report.total_hits,
            max_deviation = report.max_abs_deviation(),
            "Upstream balanced"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstream")
            .field("name", &self.name)
            .field("target", &self.options.target.as_str())
            .field("weights", &self.weights)
            .finish()
    }
}
