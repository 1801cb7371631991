//! Mock backend subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (one task per connection)
//!     → codec.rs (httparse head, sized or chunked body) → RequestInfo
//!     → /ready            → 200 "ready"
//!     → any other path    → 200 <path>, then observer.rs hook
//!     → response.rs       → Respond (written) | Drop (nothing written, next request read)
//! ```
//!
//! # Design Decisions
//! - The hook sees every non-readiness request, so a pool learns which
//!   backend served a request without parsing bodies
//! - Drop mode is a response variant, not a magic status code

mod codec;
pub mod connection;
pub mod observer;
pub mod response;
pub mod server;

pub use observer::{RequestInfo, RequestObserver, ServerInfo};
pub use response::MockResponse;
pub use server::{MockServer, MockServerConfig, RequestLogging, ServerState, READY_BODY, READY_PATH};
