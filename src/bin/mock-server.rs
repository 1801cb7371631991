//! Standalone mock backend.
//!
//! Answers `/ready` with `ready` and every other path with the path itself,
//! until interrupted.

use clap::Parser;

use balance_harness::lifecycle::signals;
use balance_harness::mock::{MockServer, MockServerConfig};
use balance_harness::observability::{init_logging, Verbosity};

#[derive(Parser)]
#[command(name = "mock-server")]
#[command(about = "Disposable HTTP backend for load-balancing tests", long_about = None)]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(short, long, default_value_t = 8053)]
    port: u16,

    /// No per-request logging.
    #[arg(short, long)]
    quiet: bool,

    /// Log request bodies.
    #[arg(short, long)]
    verbose: bool,

    /// Log request bodies and headers.
    #[arg(long)]
    very_verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose, cli.very_verbose);
    init_logging(verbosity, "info");

    let config = MockServerConfig::new(cli.host, cli.port).logging(verbosity.request_logging());
    let server = MockServer::start(config).await?;
    tracing::info!(address = %server.addr(), ready = %server.ready_url(), "Mock server started");

    signals::ctrl_c().await;
    server.stop();
    tracing::info!("Shutdown complete");
    Ok(())
}
