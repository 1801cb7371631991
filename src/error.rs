//! Error types shared by the harness subsystems.

use std::time::Duration;
use thiserror::Error;

use crate::balance::CheckFailure;
use crate::polling::{Expect, Outcome};

/// Errors raised while standing up, driving or tearing down a test pool.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The polled URL never satisfied the expectation before the deadline.
    #[error("failed to get {url} ({expected}) after {waited:?}, last outcome: {last}")]
    PollTimeout {
        url: String,
        expected: Expect,
        last: Outcome,
        waited: Duration,
    },

    /// A mock server could not bind its listening socket.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Weights must be finite and strictly positive.
    #[error("invalid weight {weight} for server {server}")]
    InvalidWeight { server: String, weight: f64 },

    /// Two pool members resolved to the same `host:port`.
    #[error("upstream {pool} already has a server named {server}")]
    DuplicateServer { pool: String, server: String },

    /// Hits were recorded for a server that has no configured weight.
    #[error("hits recorded for unknown server {server}")]
    UnknownServer { server: String },

    /// Balance cannot be judged without weighted servers.
    #[error("no weighted servers to verify")]
    NoWeights,

    /// A pool has no weighted servers left to judge.
    #[error("upstream {pool} has no weighted servers")]
    EmptyPool { pool: String },

    /// Tolerance must lie strictly between 0 and 1.
    #[error("tolerance {0} is outside (0, 1)")]
    InvalidTolerance(f64),

    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be constructed.
    #[error("http client error: {0}")]
    Client(#[source] reqwest::Error),

    /// A control request to the proxy failed at the transport level.
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The proxy answered the weight update with a non-success status.
    #[error("POST to {url} failed with status {status}")]
    WeightUpdateRejected { url: String, status: u16 },

    /// Running the proxy's start or stop command failed.
    #[error("proxy command `{command}` failed: {source}")]
    ProxyCommand {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

/// Anything that fails a scenario: a harness error or a failed check.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Harness(#[from] HarnessError),

    #[error(transparent)]
    Check(#[from] CheckFailure),
}
