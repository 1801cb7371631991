//! Shared utilities for integration tests.
//!
//! `TestProxy` stands in for the reverse proxy under test: it balances each
//! named upstream with smooth weighted round-robin, skips peers that refuse
//! connections, and accepts `POST /set_peer_weight/{pool}`.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use url::Url;

use balance_harness::lifecycle::Shutdown;
use balance_harness::polling::{PollOptions, PollingClient};
use balance_harness::upstream::UpstreamOptions;

/// Peer name the way mock servers report it.
pub fn peer(port: u16) -> String {
    format!("127.0.0.1:{}", port)
}

/// Polling client with short deadlines so failing tests fail fast.
pub fn fast_client() -> PollingClient {
    PollingClient::new(PollOptions {
        max_wait: Duration::from_secs(2),
        retry_interval: Duration::from_millis(50),
        request_timeout: Duration::from_secs(1),
    })
    .unwrap()
}

/// Upstream options aimed at `proxy`, sending load 8 requests at a time.
pub fn options(proxy: &TestProxy) -> UpstreamOptions {
    UpstreamOptions::new(proxy.url(), fast_client()).concurrency(8)
}

/// Weights and smooth weighted round-robin state for one upstream.
struct PeerTable {
    peers: Vec<String>,
    weights: ArcSwap<HashMap<String, f64>>,
    state: Mutex<SwrrState>,
}

#[derive(Default)]
struct SwrrState {
    current: HashMap<String, f64>,
    down: HashSet<String>,
}

impl PeerTable {
    fn new(peers: &[(u16, f64)]) -> Self {
        Self {
            peers: peers.iter().map(|(port, _)| peer(*port)).collect(),
            weights: ArcSwap::from_pointee(
                peers.iter().map(|(port, w)| (peer(*port), *w)).collect(),
            ),
            state: Mutex::new(SwrrState::default()),
        }
    }

    fn select(&self) -> Option<String> {
        let weights = self.weights.load();
        let mut state = self.state.lock().unwrap();

        let live: Vec<&String> = self
            .peers
            .iter()
            .filter(|p| !state.down.contains(*p))
            .collect();
        let total: f64 = live.iter().map(|p| weights[*p]).sum();

        let mut best: Option<(&String, f64)> = None;
        for p in live {
            let current = state.current.entry(p.clone()).or_insert(0.0);
            *current += weights[p];
            if best.map_or(true, |(_, c)| *current > c) {
                best = Some((p, *current));
            }
        }

        let (chosen, _) = best?;
        if let Some(current) = state.current.get_mut(chosen) {
            *current -= total;
        }
        Some(chosen.clone())
    }

    fn mark_down(&self, peer: &str) {
        let mut state = self.state.lock().unwrap();
        state.down.insert(peer.to_string());
        state.current.clear();
    }

    fn update(&self, changes: HashMap<String, f64>) -> bool {
        let mut next = (**self.weights.load()).clone();
        for (name, weight) in changes {
            if !self.peers.contains(&name) || weight <= 0.0 {
                return false;
            }
            next.insert(name, weight);
        }
        self.weights.store(Arc::new(next));
        self.state.lock().unwrap().current.clear();
        true
    }
}

#[derive(Clone)]
struct ProxyState {
    pools: Arc<HashMap<String, Arc<PeerTable>>>,
    client: reqwest::Client,
}

/// In-process weighted reverse proxy.
pub struct TestProxy {
    addr: SocketAddr,
    pools: Arc<HashMap<String, Arc<PeerTable>>>,
    shutdown: Shutdown,
}

impl TestProxy {
    /// Listen on `127.0.0.1:port` balancing each `(name, [(peer port, weight)])`.
    pub async fn start(port: u16, upstreams: &[(&str, &[(u16, f64)])]) -> Self {
        let pools: Arc<HashMap<String, Arc<PeerTable>>> = Arc::new(
            upstreams
                .iter()
                .map(|(name, peers)| (name.to_string(), Arc::new(PeerTable::new(peers))))
                .collect(),
        );
        let state = ProxyState {
            pools: Arc::clone(&pools),
            client: reqwest::Client::builder()
                .pool_max_idle_per_host(0)
                .no_proxy()
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap(),
        };

        let router = Router::new()
            .route("/ready", get(|| async { "ready" }))
            .route("/set_peer_weight/{pool}", post(set_peer_weight))
            .route("/{pool}", get(forward))
            .with_state(state);

        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let mut signal = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router)
                .with_graceful_shutdown(async move { signal.recv().await })
                .await;
        });

        Self {
            addr,
            pools,
            shutdown,
        }
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).unwrap()
    }

    /// Current weights of `pool`, by peer name.
    pub fn weights(&self, pool: &str) -> BTreeMap<String, f64> {
        self.pools[pool]
            .weights
            .load()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

async fn forward(
    State(state): State<ProxyState>,
    Path(pool): Path<String>,
    uri: Uri,
) -> Response {
    let Some(table) = state.pools.get(&pool) else {
        return (StatusCode::NOT_FOUND, "unknown upstream").into_response();
    };
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

    while let Some(peer) = table.select() {
        match state.client.get(format!("http://{}{}", peer, path)).send().await {
            Ok(res) => {
                let status = res.status();
                let body = res.bytes().await.unwrap_or_else(|_| Bytes::new());
                return (status, body).into_response();
            }
            Err(e) if e.is_connect() => table.mark_down(&peer),
            Err(_) => return StatusCode::GATEWAY_TIMEOUT.into_response(),
        }
    }
    StatusCode::BAD_GATEWAY.into_response()
}

async fn set_peer_weight(
    State(state): State<ProxyState>,
    Path(pool): Path<String>,
    Json(changes): Json<HashMap<String, f64>>,
) -> StatusCode {
    match state.pools.get(&pool) {
        Some(table) if table.update(changes) => StatusCode::OK,
        Some(_) => StatusCode::BAD_REQUEST,
        None => StatusCode::NOT_FOUND,
    }
}
