//! Disposable HTTP backend.
//!
//! # Responsibilities
//! - Bind `host:port` and serve HTTP/1.1 until stopped
//! - Answer the readiness path with `ready`, everything else with its path
//! - Hand every non-readiness request to the observer
//! - Honour `MockResponse::Drop` by writing nothing and moving on to the
//!   next request on the same connection
//!
//! # Design Decisions
//! - Each server owns its own shutdown coordinator; stopping one never
//!   touches its siblings
//! - `stop()` only requests the stop; the listener closes shortly after on
//!   the accept task, so callers confirm "down" by polling

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use crate::error::{HarnessError, Result};
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::mock::codec::{FrameError, RequestReader};
use crate::mock::connection::{ConnectionGuard, ConnectionTracker};
use crate::mock::observer::{RequestInfo, RequestObserver, ServerInfo};
use crate::mock::response::MockResponse;

/// Reserved liveness path.
pub const READY_PATH: &str = "/ready";

/// Body of a successful readiness check.
pub const READY_BODY: &str = "ready";

/// How much a mock server logs per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestLogging {
    /// Quiet.
    #[default]
    Off,
    /// One line per request.
    Access,
    /// Access line plus request body.
    Verbose,
    /// Verbose plus every request header.
    VeryVerbose,
}

/// Lifecycle state of a mock server.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Starting = 0,
    Serving = 1,
    Stopping = 2,
    Stopped = 3,
}

impl From<u8> for ServerState {
    fn from(val: u8) -> Self {
        match val {
            1 => ServerState::Serving,
            2 => ServerState::Stopping,
            3 => ServerState::Stopped,
            _ => ServerState::Starting,
        }
    }
}

/// Startup parameters for a mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockServerConfig {
    pub host: String,
    /// `0` binds an ephemeral port.
    pub port: u16,
    pub logging: RequestLogging,
}

impl MockServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            logging: RequestLogging::Off,
        }
    }

    pub fn logging(mut self, logging: RequestLogging) -> Self {
        self.logging = logging;
        self
    }
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", 8053)
    }
}

/// A running mock backend.
#[derive(Debug)]
pub struct MockServer {
    info: ServerInfo,
    shutdown: Shutdown,
    state: Arc<AtomicU8>,
    connections: ConnectionTracker,
}

impl MockServer {
    /// Bind and start serving without an observer.
    pub async fn start(config: MockServerConfig) -> Result<Self> {
        Self::spawn(config, None).await
    }

    /// Bind and start serving, reporting every non-readiness request to `observer`.
    pub async fn start_observed(
        config: MockServerConfig,
        observer: Arc<dyn RequestObserver>,
    ) -> Result<Self> {
        Self::spawn(config, Some(observer)).await
    }

    async fn spawn(
        config: MockServerConfig,
        observer: Option<Arc<dyn RequestObserver>>,
    ) -> Result<Self> {
        let state = Arc::new(AtomicU8::new(ServerState::Starting as u8));

        let bind_error = |source| HarnessError::Bind {
            addr: format!("{}:{}", config.host, config.port),
            source,
        };
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let info = ServerInfo::new(&config.host, local_addr);
        let shutdown = Shutdown::new();
        let connections = ConnectionTracker::new();
        let handler = Arc::new(Handler {
            info: info.clone(),
            logging: config.logging,
            observer,
        });

        state.store(ServerState::Serving as u8, Ordering::SeqCst);
        tracing::debug!(server = %info.name(), address = %local_addr, "Mock server listening");

        tokio::spawn(accept_loop(
            listener,
            handler,
            shutdown.subscribe(),
            Arc::clone(&state),
            connections.clone(),
        ));

        Ok(Self {
            info,
            shutdown,
            state,
            connections,
        })
    }

    /// Canonical `host:port` name.
    pub fn name(&self) -> &str {
        self.info.name()
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn addr(&self) -> SocketAddr {
        self.info.addr()
    }

    pub fn port(&self) -> u16 {
        self.info.port()
    }

    /// URL of the readiness endpoint.
    pub fn ready_url(&self) -> String {
        self.info.url(READY_PATH)
    }

    pub fn state(&self) -> ServerState {
        ServerState::from(self.state.load(Ordering::SeqCst))
    }

    /// Connections currently open, stalled drop-mode ones included.
    pub fn open_connections(&self) -> u64 {
        self.connections.open()
    }

    /// Connections accepted since start.
    pub fn accepted_connections(&self) -> u64 {
        self.connections.accepted()
    }

    /// Request a stop. Returns before the listener is necessarily closed.
    pub fn stop(&self) {
        if self.shutdown.is_triggered() {
            return;
        }
        let _ = self.state.compare_exchange(
            ServerState::Serving as u8,
            ServerState::Stopping as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        self.shutdown.trigger();
        tracing::debug!(server = %self.info.name(), "Mock server stop requested");
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn accept_loop(
    listener: TcpListener,
    handler: Arc<Handler>,
    mut stop: ShutdownSignal,
    state: Arc<AtomicU8>,
    connections: ConnectionTracker,
) {
    let conn_stop = stop.clone();
    loop {
        tokio::select! {
            _ = stop.recv() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let guard = connections.track();
                    tracing::trace!(
                        server = %handler.info.name(),
                        peer_addr = %peer,
                        connection = guard.seq(),
                        "Connection accepted"
                    );
                    tokio::spawn(serve_connection(
                        stream,
                        Arc::clone(&handler),
                        conn_stop.clone(),
                        guard,
                    ));
                }
                Err(e) => {
                    // Usually fd exhaustion; back off instead of spinning.
                    tracing::warn!(server = %handler.info.name(), error = %e, "Accept failed");
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    drop(listener);
    state.store(ServerState::Stopped as u8, Ordering::SeqCst);
    tracing::debug!(server = %handler.info.name(), "Mock server stopped");
}

async fn serve_connection(
    stream: TcpStream,
    handler: Arc<Handler>,
    mut stop: ShutdownSignal,
    guard: ConnectionGuard,
) {
    let (read, mut write) = stream.into_split();
    let mut reader = RequestReader::new(read);

    loop {
        let framed = tokio::select! {
            _ = stop.recv() => {
                tracing::trace!(connection = guard.seq(), "Connection closed by server stop");
                break;
            }
            next = reader.next_request() => next,
        };

        let (response, keep_alive) = match framed {
            Ok(Some(framed)) => (handler.handle(&framed.request), framed.keep_alive),
            Ok(None) => break,
            Err(FrameError::TooLarge) => (
                MockResponse::with_status(StatusCode::PAYLOAD_TOO_LARGE, "request too large"),
                false,
            ),
            Err(e) => {
                tracing::trace!(connection = guard.seq(), error = %e, "Connection ended with error");
                break;
            }
        };

        let Some(wire) = response.encode(keep_alive) else {
            tracing::trace!(connection = guard.seq(), "Response dropped");
            continue;
        };
        if let Err(e) = write.write_all(&wire).await {
            tracing::trace!(connection = guard.seq(), error = %e, "Write failed");
            break;
        }
        if !keep_alive {
            break;
        }
    }

    let _ = write.shutdown().await;
}

/// Per-server request handler shared by all connections.
struct Handler {
    info: ServerInfo,
    logging: RequestLogging,
    observer: Option<Arc<dyn RequestObserver>>,
}

impl Handler {
    fn handle(&self, request: &RequestInfo) -> MockResponse {
        let response = if request.path() == READY_PATH {
            MockResponse::ok(READY_BODY)
        } else {
            let computed = MockResponse::ok(request.path().to_string());
            match &self.observer {
                Some(observer) => observer
                    .on_request(request, &self.info)
                    .unwrap_or(computed),
                None => computed,
            }
        };

        self.log(request, &response);
        response
    }

    fn log(&self, request: &RequestInfo, response: &MockResponse) {
        let status = response
            .status()
            .map(|s| s.as_u16().to_string())
            .unwrap_or_else(|| "dropped".to_string());

        match self.logging {
            RequestLogging::Off => {}
            RequestLogging::Access => {
                tracing::info!(
                    server = %self.info.name(),
                    method = %request.method,
                    path = %request.path_and_query(),
                    status = %status,
                    bytes = response.body_len(),
                    "Request"
                );
            }
            RequestLogging::Verbose => {
                tracing::info!(
                    server = %self.info.name(),
                    method = %request.method,
                    path = %request.path_and_query(),
                    status = %status,
                    body = %String::from_utf8_lossy(&request.body),
                    "Request"
                );
            }
            RequestLogging::VeryVerbose => {
                let headers: Vec<String> = request
                    .headers
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.to_str().unwrap_or("<binary>")))
                    .collect();
                tracing::info!(
                    server = %self.info.name(),
                    method = %request.method,
                    path = %request.path_and_query(),
                    status = %status,
                    host = request.host().unwrap_or("-"),
                    headers = ?headers,
                    body = %String::from_utf8_lossy(&request.body),
                    "Request"
                );
            }
        }
    }
}
