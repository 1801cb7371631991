//! Handle on the reverse proxy under test.
//!
//! # Responsibilities
//! - Start and stop the proxy process through configured commands
//! - Confirm both transitions through the proxy's readiness endpoint
//! - Push peer weight updates over HTTP
//!
//! # Design Decisions
//! - All process state lives in this struct; the driver owns it and passes
//!   it to whatever needs to stop the proxy
//! - A spawned child is killed when the handle is dropped

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tokio::process::{Child, Command};
use url::Url;

use crate::config::schema::ProxyConfig;
use crate::error::{HarnessError, Result};
use crate::polling::{Expect, Outcome, PollingClient};

#[derive(Debug)]
pub struct ProxyHandle {
    base: Url,
    ready_url: Url,
    start_command: Vec<String>,
    stop_command: Vec<String>,
    client: PollingClient,
    child: Option<Child>,
}

impl ProxyHandle {
    pub fn new(config: &ProxyConfig, client: PollingClient) -> Result<Self> {
        let base = Url::parse(&config.url)?;
        let ready_url = base.join(&config.ready_path)?;
        Ok(Self {
            base,
            ready_url,
            start_command: config.start_command.clone(),
            stop_command: config.stop_command.clone(),
            client,
            child: None,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn ready_url(&self) -> &Url {
        &self.ready_url
    }

    /// Whether this handle can start the proxy itself.
    pub fn is_managed(&self) -> bool {
        !self.start_command.is_empty()
    }

    pub async fn is_ready(&self) -> bool {
        self.client.get(self.ready_url.as_str()).await == Outcome::Ok
    }

    /// Launch the start command and wait for the readiness endpoint.
    /// Without a start command this only waits for readiness.
    pub async fn start(&mut self) -> Result<()> {
        if let Some((program, args)) = self.start_command.split_first() {
            let child = Command::new(program)
                .args(args)
                .kill_on_drop(true)
                .spawn()
                .map_err(|source| HarnessError::ProxyCommand {
                    command: self.start_command.join(" "),
                    source,
                })?;
            tracing::info!(command = %self.start_command.join(" "), pid = ?child.id(), "Proxy starting");
            self.child = Some(child);
        }

        self.client
            .poll_until(self.ready_url.as_str(), Expect::Is(Outcome::Ok))
            .await?;
        tracing::info!(url = %self.base, "Proxy ready");
        Ok(())
    }

    /// Stop the proxy and wait until its readiness endpoint refuses connections.
    ///
    /// Runs the stop command when one is configured, otherwise kills the child
    /// spawned by `start`. With neither, only waits.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some((program, args)) = self.stop_command.split_first() {
            let status = Command::new(program)
                .args(args)
                .status()
                .await
                .map_err(|source| HarnessError::ProxyCommand {
                    command: self.stop_command.join(" "),
                    source,
                })?;
            if !status.success() {
                tracing::warn!(command = %self.stop_command.join(" "), status = %status, "Proxy stop command failed");
            }
            if let Some(mut child) = self.child.take() {
                let max_wait = self.client.options().max_wait;
                if tokio::time::timeout(max_wait, child.wait()).await.is_err() {
                    tracing::warn!("Proxy did not exit after stop command, killing it");
                    let _ = child.kill().await;
                }
            }
        } else if let Some(mut child) = self.child.take() {
            child.kill().await.map_err(|source| HarnessError::ProxyCommand {
                command: self.start_command.join(" "),
                source,
            })?;
        }

        self.client
            .poll_until(self.ready_url.as_str(), Expect::Is(Outcome::CouldntConnect))
            .await?;
        tracing::info!(url = %self.base, "Proxy stopped");
        Ok(())
    }

    /// `POST /set_peer_weight/<pool>` with a `{ "host:port": weight }` body.
    /// Success is the HTTP status alone; the response body is ignored.
    pub async fn set_peer_weight(&self, pool: &str, weights: &BTreeMap<String, f64>) -> Result<()> {
        let url = self.base.join(&format!("/set_peer_weight/{}", pool))?;
        let body = weights_body(weights);

        let res = self
            .client
            .http()
            .post(url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|source| HarnessError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = res.status();
        if !status.is_success() {
            return Err(HarnessError::WeightUpdateRejected {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        tracing::info!(pool = %pool, weights = ?weights, "Peer weights updated");
        Ok(())
    }
}

/// Whole weights are sent as integers, the rest as floats.
fn weights_body(weights: &BTreeMap<String, f64>) -> Value {
    let map: Map<String, Value> = weights
        .iter()
        .map(|(name, weight)| {
            let value = if weight.fract() == 0.0 && *weight >= 0.0 && *weight <= u64::MAX as f64 {
                Value::from(*weight as u64)
            } else {
                Value::from(*weight)
            };
            (name.clone(), value)
        })
        .collect();
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polling::PollOptions;
    use std::time::Duration;

    fn client() -> PollingClient {
        PollingClient::new(PollOptions {
            max_wait: Duration::from_millis(300),
            retry_interval: Duration::from_millis(50),
            request_timeout: Duration::from_millis(200),
        })
        .unwrap()
    }

    #[test]
    fn weights_serialize_whole_numbers_as_integers() {
        let weights: BTreeMap<String, f64> = [
            ("127.0.0.1:8084".to_string(), 6.0),
            ("127.0.0.1:8085".to_string(), 1.5),
        ]
        .into();
        assert_eq!(
            weights_body(&weights).to_string(),
            r#"{"127.0.0.1:8084":6,"127.0.0.1:8085":1.5}"#
        );
    }

    #[test]
    fn urls_are_derived_from_config() {
        let config = ProxyConfig {
            url: "http://127.0.0.1:8082".into(),
            ..ProxyConfig::default()
        };
        let handle = ProxyHandle::new(&config, client()).unwrap();
        assert_eq!(handle.ready_url().as_str(), "http://127.0.0.1:8082/ready");
        assert!(!handle.is_managed());
    }

    #[tokio::test]
    async fn unmanaged_stop_of_absent_proxy_succeeds() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config = ProxyConfig {
            url: format!("http://127.0.0.1:{}", port),
            ..ProxyConfig::default()
        };
        let mut handle = ProxyHandle::new(&config, client()).unwrap();
        assert!(!handle.is_ready().await);
        handle.stop().await.unwrap();
        assert!(matches!(
            handle.start().await,
            Err(HarnessError::PollTimeout { .. })
        ));
    }
}
