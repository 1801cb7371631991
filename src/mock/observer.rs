//! Per-request observation hook.

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, Uri};

use crate::mock::response::MockResponse;

/// Everything a mock server knows about one request.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RequestInfo {
    /// Request path without the query string.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Path plus `?query` when present, as written to logs.
    pub fn path_and_query(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path())
    }

    /// Value of the `Host` header.
    pub fn host(&self) -> Option<&str> {
        self.headers.get(header::HOST).and_then(|v| v.to_str().ok())
    }
}

/// Identity of a running mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    name: String,
    addr: SocketAddr,
}

impl ServerInfo {
    pub(crate) fn new(host: &str, addr: SocketAddr) -> Self {
        Self {
            name: format!("{}:{}", host, addr.port()),
            addr,
        }
    }

    /// Canonical `host:port` name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Absolute URL for `path` on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.name, path)
    }
}

/// Hook invoked for every request outside the readiness path.
///
/// Returning `Some` replaces the computed response, which is how a test
/// switches a backend into drop mode.
pub trait RequestObserver: Send + Sync + 'static {
    fn on_request(&self, request: &RequestInfo, server: &ServerInfo) -> Option<MockResponse>;
}

impl<F> RequestObserver for F
where
    F: Fn(&RequestInfo, &ServerInfo) -> Option<MockResponse> + Send + Sync + 'static,
{
    fn on_request(&self, request: &RequestInfo, server: &ServerInfo) -> Option<MockResponse> {
        self(request, server)
    }
}
