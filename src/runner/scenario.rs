//! Scenario execution.
//!
//! A scenario is a sequence of phases against one pool:
//!
//! ```text
//! create pool → send load → no errors → accounting + balance
//!     [reweight]     POST changed weights → stop → recreate → load → check
//!     [fail_server]  reset counters → stop one member → load → check survivors
//! stop pool (always)
//! ```

use std::collections::BTreeMap;
use std::time::Instant;

use rand::seq::SliceRandom;

use crate::balance::BalanceReport;
use crate::config::schema::{LoadConfig, ReweightConfig, ScenarioConfig};
use crate::error::{HarnessError, ScenarioError};
use crate::proxy::ProxyHandle;
use crate::runner::report::{RunSummary, ScenarioResult};
use crate::upstream::{ServerConfig, ServerSpec, Upstream, UpstreamOptions};

/// Runs scenarios against a proxy that is already up.
pub struct ScenarioRunner<'a> {
    proxy: &'a ProxyHandle,
    options: UpstreamOptions,
    load: LoadConfig,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(proxy: &'a ProxyHandle, options: UpstreamOptions, load: LoadConfig) -> Self {
        Self {
            proxy,
            options,
            load,
        }
    }

    /// Run `scenarios` one after another; a failure never stops the run.
    pub async fn run_all(&self, scenarios: Vec<ScenarioConfig>, ordered: bool) -> RunSummary {
        let mut summary = RunSummary::default();
        for scenario in order_scenarios(scenarios, ordered) {
            let result = self.run(&scenario).await;
            if result.passed() {
                tracing::info!(scenario = %result.name, elapsed = ?result.elapsed, "Scenario passed");
            } else {
                tracing::error!(scenario = %result.name, "{}", result);
            }
            summary.results.push(result);
        }
        summary
    }

    /// Run one scenario. The pool is stopped whether or not a phase failed.
    pub async fn run(&self, scenario: &ScenarioConfig) -> ScenarioResult {
        let started = Instant::now();
        tracing::info!(scenario = %scenario.name, "Scenario starting");

        let mut reports = Vec::new();
        let error = match Upstream::create(
            scenario.name.clone(),
            scenario.servers.clone(),
            scenario.weights.clone(),
            self.options.clone(),
        )
        .await
        {
            Ok(mut pool) => {
                let outcome = self.drive(&mut pool, scenario, &mut reports).await;
                let stopped = pool.stop().await;
                match (outcome, stopped) {
                    (Err(e), _) => Some(e),
                    (Ok(()), Err(e)) => Some(e.into()),
                    (Ok(()), Ok(())) => None,
                }
            }
            Err(e) => Some(e.into()),
        };

        ScenarioResult {
            name: scenario.name.clone(),
            reports,
            error,
            elapsed: started.elapsed(),
        }
    }

    async fn drive(
        &self,
        pool: &mut Upstream,
        scenario: &ScenarioConfig,
        reports: &mut Vec<BalanceReport>,
    ) -> Result<(), ScenarioError> {
        let tolerance = scenario.tolerance.unwrap_or(self.load.tolerance);
        let requests = scenario.requests.unwrap_or(self.load.requests);

        pool.send_load(None, requests).await?;
        pool.check_no_errors()?;
        reports.push(pool.check_balanced(tolerance)?);

        if let Some(reweight) = &scenario.reweight {
            self.reweight(pool, scenario, reweight).await?;
            pool.send_load(None, reweight.requests.unwrap_or(requests)).await?;
            reports.push(pool.check_balanced(tolerance)?);
            pool.check_no_errors()?;
        }

        if let Some(port) = scenario.fail_server {
            let name = pool
                .server_by_port(port)
                .map(|s| s.name().to_string())
                .ok_or_else(|| HarnessError::UnknownServer {
                    server: format!("port {}", port),
                })?;
            pool.reset_counters();
            pool.stop_server(&name).await?;
            pool.send_load(None, requests).await?;
            pool.check_no_errors()?;
            reports.push(pool.check_balanced(tolerance)?);
        }

        Ok(())
    }

    /// Push the new weights to the proxy, then replace `pool` with a fresh
    /// one on the same addresses carrying those weights.
    async fn reweight(
        &self,
        pool: &mut Upstream,
        scenario: &ScenarioConfig,
        reweight: &ReweightConfig,
    ) -> Result<(), ScenarioError> {
        let specs: Vec<ServerSpec> = scenario
            .servers
            .iter()
            .zip(pool.servers())
            .map(|(spec, server)| {
                ServerSpec::Config(ServerConfig {
                    host: spec.host().to_string(),
                    port: server.port(),
                    weight: None,
                    logging: spec.logging(),
                })
            })
            .collect();

        let changed = changed_weights(pool.weights(), &pool.names(), &reweight.weights);
        self.proxy.set_peer_weight(pool.name(), &changed).await?;

        pool.stop().await?;
        *pool = Upstream::create(
            scenario.name.clone(),
            specs,
            Some(reweight.weights.clone()),
            self.options.clone(),
        )
        .await?;
        Ok(())
    }
}

/// Entries of `next` (positional over `names`) that differ from `current`.
fn changed_weights(
    current: &BTreeMap<String, f64>,
    names: &[&str],
    next: &[f64],
) -> BTreeMap<String, f64> {
    names
        .iter()
        .zip(next)
        .filter(|(name, weight)| current.get(**name) != Some(*weight))
        .map(|(name, weight)| (name.to_string(), *weight))
        .collect()
}

/// Keep scenarios named in `only`; an empty filter keeps everything.
pub fn select_scenarios(scenarios: Vec<ScenarioConfig>, only: &[String]) -> Vec<ScenarioConfig> {
    if only.is_empty() {
        return scenarios;
    }
    scenarios
        .into_iter()
        .filter(|s| only.iter().any(|name| name == &s.name))
        .collect()
}

/// Alphabetical when `ordered`, shuffled otherwise.
pub fn order_scenarios(mut scenarios: Vec<ScenarioConfig>, ordered: bool) -> Vec<ScenarioConfig> {
    if ordered {
        scenarios.sort_by(|a, b| a.name.cmp(&b.name));
    } else {
        scenarios.shuffle(&mut rand::thread_rng());
    }
    scenarios
}
