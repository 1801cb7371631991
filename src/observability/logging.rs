//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Map command-line verbosity onto a log filter and request logging
//!
//! # Design Decisions
//! - `RUST_LOG` wins over flags so a single run can be debugged without edits
//! - Human-readable fmt output; the harness is run from a terminal

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::mock::RequestLogging;

/// Output level selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
    VeryVerbose,
}

impl Verbosity {
    /// Resolve the usual `-q` / `-v` / `--very-verbose` flag set.
    pub fn from_flags(quiet: bool, verbose: bool, very_verbose: bool) -> Self {
        if very_verbose {
            Verbosity::VeryVerbose
        } else if verbose {
            Verbosity::Verbose
        } else if quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        }
    }

    /// Filter directive, falling back to `default_level` at normal verbosity.
    pub fn filter_directive(&self, default_level: &str) -> String {
        let level = match self {
            Verbosity::Quiet => "warn",
            Verbosity::Normal => default_level,
            Verbosity::Verbose => "debug",
            Verbosity::VeryVerbose => "trace",
        };
        format!("balance_harness={level},mock_server={level},warn")
    }

    /// Per-request logging a standalone mock server uses at this verbosity.
    pub fn request_logging(&self) -> RequestLogging {
        match self {
            Verbosity::Quiet => RequestLogging::Off,
            Verbosity::Normal => RequestLogging::Access,
            Verbosity::Verbose => RequestLogging::Verbose,
            Verbosity::VeryVerbose => RequestLogging::VeryVerbose,
        }
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(verbosity: Verbosity, default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive(default_level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}
