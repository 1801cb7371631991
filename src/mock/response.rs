//! Response construction for mock servers.
//!
//! `MockResponse::Drop` is a first-class variant: the transport layer sees it
//! and writes nothing at all, instead of emitting a fake status code.

use axum::body::Bytes;
use axum::http::{header, HeaderMap, StatusCode};

/// What a mock server sends back for one request.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// A regular HTTP response. `Content-Length` is always set from `body`.
    Respond {
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
    },
    /// Send nothing. The connection goes on reading its next request.
    Drop,
}

impl MockResponse {
    /// `200 OK` with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::with_status(StatusCode::OK, body)
    }

    pub fn with_status(status: StatusCode, body: impl Into<Bytes>) -> Self {
        MockResponse::Respond {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Status code, or `None` for `Drop`.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            MockResponse::Respond { status, .. } => Some(*status),
            MockResponse::Drop => None,
        }
    }

    /// Body length in bytes; zero for `Drop`.
    pub fn body_len(&self) -> usize {
        match self {
            MockResponse::Respond { body, .. } => body.len(),
            MockResponse::Drop => 0,
        }
    }

    pub fn is_drop(&self) -> bool {
        matches!(self, MockResponse::Drop)
    }

    /// HTTP/1.1 wire form. `None` means write nothing.
    ///
    /// `Content-Length` and `Connection` are always written by the server;
    /// values for them in `headers` are ignored.
    pub(crate) fn encode(&self, keep_alive: bool) -> Option<Vec<u8>> {
        let MockResponse::Respond {
            status,
            headers,
            body,
        } = self
        else {
            return None;
        };

        let mut out = Vec::with_capacity(128 + body.len());
        out.extend_from_slice(
            format!(
                "HTTP/1.1 {} {}\r\n",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            )
            .as_bytes(),
        );
        for (name, value) in headers {
            if *name == header::CONTENT_LENGTH || *name == header::CONNECTION {
                continue;
            }
            out.extend_from_slice(name.as_str().as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("content-length: {}\r\n", body.len()).as_bytes());
        if !keep_alive {
            out.extend_from_slice(b"connection: close\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(body);
        Some(out)
    }
}
