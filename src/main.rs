//! Weighted load-balancing harness.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────┐
//!                         │              BALANCE HARNESS              │
//!                         │                                           │
//!     harness.toml  ─────▶│  config ──▶ runner ──▶ upstream (pool)    │
//!                         │               │           │               │
//!                         │               ▼           ▼               │
//!                         │          polling      mock servers ◀──────┼──┐
//!                         │          client          (hits)           │  │
//!                         │               │                           │  │
//!                         └───────────────┼───────────────────────────┘  │
//!                                         ▼                              │
//!                                  ┌─────────────┐                       │
//!                                  │ proxy under │───────────────────────┘
//!                                  │    test     │
//!                                  └─────────────┘
//! ```
//!
//! Each scenario starts a pool of mock backends, drives load through the
//! proxy, and checks that the hits each backend received match its weight.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use url::Url;

use balance_harness::config::{self, HarnessConfig};
use balance_harness::observability::{init_logging, Verbosity};
use balance_harness::polling::PollingClient;
use balance_harness::proxy::ProxyHandle;
use balance_harness::runner::{select_scenarios, ScenarioRunner};
use balance_harness::upstream::UpstreamOptions;

#[derive(Parser)]
#[command(name = "balance-harness")]
#[command(about = "Verify that a reverse proxy balances load according to peer weights", long_about = None)]
struct Cli {
    /// TOML configuration file. Built-in defaults without it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Proxy base URL, overriding `proxy.url`.
    #[arg(long)]
    server: Option<String>,

    #[arg(short, long)]
    quiet: bool,

    #[arg(short, long)]
    verbose: bool,

    /// Also log every request header on the mock backends.
    #[arg(long)]
    very_verbose: bool,

    /// Run scenarios alphabetically instead of shuffled.
    #[arg(long)]
    ordered: bool,

    /// Only run the named scenario. Repeatable.
    #[arg(long = "scenario")]
    scenarios: Vec<String>,

    /// Assume the proxy is already running and leave it running.
    #[arg(long)]
    no_proxy_control: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "Harness aborted");
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => HarnessConfig::default(),
    };
    if let Some(server) = &cli.server {
        config.proxy.url = server.clone();
    }

    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose, cli.very_verbose);
    init_logging(verbosity, &config.observability.log_level);
    if verbosity >= Verbosity::Verbose {
        config.observability.request_logging = verbosity.request_logging();
    }

    tracing::info!(
        proxy = %config.proxy.url,
        requests = config.load.requests,
        concurrency = config.load.concurrency,
        tolerance = config.load.tolerance,
        "Configuration loaded"
    );

    let client = PollingClient::new(config.polling.to_options())?;
    let mut proxy = ProxyHandle::new(&config.proxy, client.clone())?;
    let options = UpstreamOptions::new(Url::parse(&config.proxy.url)?, client)
        .logging(config.observability.request_logging)
        .concurrency(config.load.concurrency);

    let scenarios = select_scenarios(config.effective_scenarios(), &cli.scenarios);
    if scenarios.is_empty() {
        tracing::warn!(filter = ?cli.scenarios, "No scenarios selected");
        return Ok(true);
    }

    if !cli.no_proxy_control {
        // A proxy left over from an earlier run would answer with stale weights.
        if proxy.is_managed() && proxy.is_ready().await {
            proxy.stop().await?;
        }
        proxy.start().await?;
    }

    let summary = ScenarioRunner::new(&proxy, options, config.load.clone())
        .run_all(scenarios, cli.ordered)
        .await;

    if !cli.no_proxy_control && proxy.is_managed() {
        if let Err(e) = proxy.stop().await {
            tracing::warn!(error = %e, "Proxy did not stop cleanly");
        }
    }

    println!("{}", summary);
    Ok(summary.all_passed())
}
