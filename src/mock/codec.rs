//! HTTP/1.1 request framing for mock servers.
//!
//! Requests are taken off the socket one at a time, so a request answered
//! with `MockResponse::Drop` leaves the connection positioned at the next
//! request instead of waiting on a response that will never be written.

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use httparse::Status;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::mock::observer::RequestInfo;

/// Largest request head accepted.
const MAX_HEAD_BYTES: usize = 64 * 1024;

const MAX_HEADERS: usize = 64;

/// Largest request body a mock server buffers.
pub(crate) const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Error)]
pub(crate) enum FrameError {
    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("request exceeds size limit")]
    TooLarge,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn malformed(e: impl ToString) -> FrameError {
    FrameError::Malformed(e.to_string())
}

/// One framed request.
#[derive(Debug)]
pub(crate) struct Framed {
    pub request: RequestInfo,
    /// Whether the client expects the connection to stay open.
    pub keep_alive: bool,
}

/// Reads consecutive requests from one connection.
pub(crate) struct RequestReader<R> {
    io: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> RequestReader<R> {
    pub fn new(io: R) -> Self {
        Self {
            io,
            buf: Vec::with_capacity(4096),
        }
    }

    /// Next request, or `None` once the client closed between requests.
    pub async fn next_request(&mut self) -> Result<Option<Framed>, FrameError> {
        let (method, uri, headers, version) = loop {
            if let Some(head) = self.parse_head()? {
                break head;
            }
            if self.buf.len() > MAX_HEAD_BYTES {
                return Err(FrameError::TooLarge);
            }
            if self.fill().await? == 0 {
                return if self.buf.is_empty() {
                    Ok(None)
                } else {
                    Err(malformed("connection closed inside request head"))
                };
            }
        };

        let body = if is_chunked(&headers) {
            self.read_chunked().await?
        } else {
            self.read_sized(content_length(&headers)?).await?
        };

        Ok(Some(Framed {
            keep_alive: keep_alive(&headers, version),
            request: RequestInfo {
                method,
                uri,
                headers,
                body,
            },
        }))
    }

    fn parse_head(&mut self) -> Result<Option<(Method, Uri, HeaderMap, u8)>, FrameError> {
        let mut slots = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut slots);
        let len = match req.parse(&self.buf).map_err(malformed)? {
            Status::Partial => return Ok(None),
            Status::Complete(len) => len,
        };

        let method = Method::from_bytes(req.method.unwrap_or("GET").as_bytes()).map_err(malformed)?;
        let uri: Uri = req.path.unwrap_or("/").parse().map_err(malformed)?;
        let version = req.version.unwrap_or(1);
        let mut headers = HeaderMap::with_capacity(req.headers.len());
        for h in req.headers.iter() {
            headers.append(
                HeaderName::from_bytes(h.name.as_bytes()).map_err(malformed)?,
                HeaderValue::from_bytes(h.value).map_err(malformed)?,
            );
        }

        self.buf.drain(..len);
        Ok(Some((method, uri, headers, version)))
    }

    async fn read_sized(&mut self, len: usize) -> Result<Bytes, FrameError> {
        if len > MAX_BODY_BYTES {
            return Err(FrameError::TooLarge);
        }
        while self.buf.len() < len {
            self.fill_or_eof().await?;
        }
        Ok(Bytes::from(self.buf.drain(..len).collect::<Vec<u8>>()))
    }

    async fn read_chunked(&mut self) -> Result<Bytes, FrameError> {
        let mut body = Vec::new();
        loop {
            let (consumed, size) = loop {
                match httparse::parse_chunk_size(&self.buf) {
                    Ok(Status::Complete(found)) => break found,
                    Ok(Status::Partial) => self.fill_or_eof().await?,
                    Err(_) => return Err(malformed("invalid chunk size")),
                }
            };
            self.buf.drain(..consumed);

            if size == 0 {
                // Trailer section ends with an empty line.
                loop {
                    match self.buf.windows(2).position(|w| w == b"\r\n") {
                        Some(0) => {
                            self.buf.drain(..2);
                            return Ok(Bytes::from(body));
                        }
                        Some(pos) => {
                            self.buf.drain(..pos + 2);
                        }
                        None => self.fill_or_eof().await?,
                    }
                }
            }

            let size = usize::try_from(size).map_err(|_| FrameError::TooLarge)?;
            if body.len() + size > MAX_BODY_BYTES {
                return Err(FrameError::TooLarge);
            }
            while self.buf.len() < size + 2 {
                self.fill_or_eof().await?;
            }
            body.extend_from_slice(&self.buf[..size]);
            self.buf.drain(..size + 2);
        }
    }

    async fn fill(&mut self) -> std::io::Result<usize> {
        let mut chunk = [0u8; 8192];
        let n = self.io.read(&mut chunk).await?;
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    async fn fill_or_eof(&mut self) -> Result<(), FrameError> {
        if self.fill().await? == 0 {
            return Err(malformed("connection closed inside request body"));
        }
        Ok(())
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn is_chunked(headers: &HeaderMap) -> bool {
    header_str(headers, &header::TRANSFER_ENCODING)
        .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"))
}

fn content_length(headers: &HeaderMap) -> Result<usize, FrameError> {
    match header_str(headers, &header::CONTENT_LENGTH) {
        Some(v) => v.trim().parse().map_err(malformed),
        None => Ok(0),
    }
}

fn keep_alive(headers: &HeaderMap, version: u8) -> bool {
    let connection = header_str(headers, &header::CONNECTION).map(str::to_ascii_lowercase);
    match version {
        0 => connection.is_some_and(|v| v.contains("keep-alive")),
        _ => !connection.is_some_and(|v| v.contains("close")),
    }
}
