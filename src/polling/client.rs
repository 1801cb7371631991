//! Blocking-style HTTP polling and load generation.
//!
//! # Responsibilities
//! - Issue single GETs and classify them into an `Outcome`
//! - Poll a URL until an expectation holds or the deadline passes
//! - Fire bursts of GETs and tabulate their outcomes
//!
//! # Design Decisions
//! - Idle connection pooling is off: a reused keep-alive socket would hide
//!   a stopped listener from the poll loop
//! - The deadline bounds the whole loop, including the request in flight

use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use reqwest::Client;

use crate::error::{HarnessError, Result};
use crate::polling::outcome::{Expect, Outcome, OutcomeCounts};

/// Header carrying a per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Timing knobs for polling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollOptions {
    /// Give up after this long.
    pub max_wait: Duration,
    /// Pause between attempts.
    pub retry_interval: Duration,
    /// Upper bound for a single GET.
    pub request_timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_secs(3),
            retry_interval: Duration::from_millis(200),
            request_timeout: Duration::from_secs(2),
        }
    }
}

/// HTTP client used for readiness polling and load generation.
#[derive(Debug, Clone)]
pub struct PollingClient {
    http: Client,
    options: PollOptions,
}

impl PollingClient {
    pub fn new(options: PollOptions) -> Result<Self> {
        let http = Client::builder()
            .pool_max_idle_per_host(0)
            .no_proxy()
            .timeout(options.request_timeout)
            .build()
            .map_err(HarnessError::Client)?;
        Ok(Self { http, options })
    }

    pub fn options(&self) -> &PollOptions {
        &self.options
    }

    /// The underlying reqwest client, for control calls.
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Issue one GET and classify it. Transport failures are outcomes, not errors.
    pub async fn get(&self, url: &str) -> Outcome {
        let request_id = uuid::Uuid::new_v4().to_string();
        let result = self
            .http
            .get(url)
            .header(X_REQUEST_ID, &request_id)
            .send()
            .await;

        let outcome = match result {
            // Drain the body so truncated responses are classified too.
            Ok(res) => {
                let status = res.status().as_u16();
                match res.bytes().await {
                    Ok(_) => Outcome::from_status(status),
                    Err(e) => Outcome::from_error(&e),
                }
            }
            Err(e) => Outcome::from_error(&e),
        };

        tracing::trace!(url = %url, request_id = %request_id, outcome = %outcome, "GET");
        outcome
    }

    /// Poll with the client's default timing.
    pub async fn poll_until(&self, url: &str, expect: Expect) -> Result<Outcome> {
        self.poll_until_with(url, expect, self.options.max_wait, self.options.retry_interval)
            .await
    }

    /// Poll `url` until `expect` holds.
    ///
    /// Each iteration performs exactly one GET. Fails with `PollTimeout` once
    /// `max_wait` has elapsed without a match.
    pub async fn poll_until_with(
        &self,
        url: &str,
        expect: Expect,
        max_wait: Duration,
        retry_interval: Duration,
    ) -> Result<Outcome> {
        let start = Instant::now();
        let deadline = start + max_wait;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let outcome = if remaining.is_zero() {
                self.get(url).await
            } else {
                tokio::time::timeout(remaining, self.get(url))
                    .await
                    .unwrap_or(Outcome::TimedOut)
            };

            if expect.matches(outcome) {
                tracing::debug!(
                    url = %url,
                    expected = %expect,
                    elapsed = ?start.elapsed(),
                    "Poll condition met"
                );
                return Ok(outcome);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(HarnessError::PollTimeout {
                    url: url.to_string(),
                    expected: expect,
                    last: outcome,
                    waited: start.elapsed(),
                });
            }

            tokio::time::sleep(retry_interval.min(deadline - now)).await;
        }
    }

    /// Issue `count` sequential GETs and tabulate the outcomes.
    pub async fn burst(&self, url: &str, count: u64) -> OutcomeCounts {
        let mut counts = OutcomeCounts::new();
        for _ in 0..count {
            counts.record(self.get(url).await);
        }
        counts
    }

    /// Issue `count` GETs with at most `concurrency` in flight.
    pub async fn burst_concurrent(&self, url: &str, count: u64, concurrency: usize) -> OutcomeCounts {
        if concurrency <= 1 {
            return self.burst(url, count).await;
        }

        stream::iter(0..count)
            .map(|_| self.get(url))
            .buffer_unordered(concurrency)
            .collect::<OutcomeCounts>()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_client() -> PollingClient {
        PollingClient::new(PollOptions {
            max_wait: Duration::from_millis(500),
            retry_interval: Duration::from_millis(50),
            request_timeout: Duration::from_millis(200),
        })
        .unwrap()
    }

    /// Grab a port that is free right now and nothing listens on.
    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn closed_port_is_couldnt_connect() {
        let client = fast_client();
        let url = format!("http://127.0.0.1:{}/ready", closed_port());
        assert_eq!(client.get(&url).await, Outcome::CouldntConnect);
    }

    #[tokio::test]
    async fn poll_for_down_returns_immediately_on_closed_port() {
        let client = fast_client();
        let url = format!("http://127.0.0.1:{}/ready", closed_port());
        let started = Instant::now();
        let outcome = client.poll_until(&url, Expect::Not(Outcome::Ok)).await.unwrap();
        assert_eq!(outcome, Outcome::CouldntConnect);
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn poll_times_out_near_deadline() {
        let client = fast_client();
        let url = format!("http://127.0.0.1:{}/ready", closed_port());
        let started = Instant::now();
        let err = client
            .poll_until_with(
                &url,
                Expect::Is(Outcome::Ok),
                Duration::from_millis(500),
                Duration::from_millis(200),
            )
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(450), "returned too early: {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1500), "returned too late: {:?}", elapsed);
        match err {
            HarnessError::PollTimeout { last, expected, .. } => {
                assert_eq!(last, Outcome::CouldntConnect);
                assert_eq!(expected, Expect::Is(Outcome::Ok));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn burst_counts_every_request() {
        let client = fast_client();
        let url = format!("http://127.0.0.1:{}/x", closed_port());
        let counts = client.burst(&url, 5).await;
        assert_eq!(counts.get(Outcome::CouldntConnect), 5);

        let counts = client.burst_concurrent(&url, 7, 3).await;
        assert_eq!(counts.total(), 7);
    }
}
