//! External proxy control.
//!
//! # Data Flow
//! ```text
//! Driver
//!     → handle.rs start()  → spawn start command → poll /ready until ok
//!     → handle.rs set_peer_weight() → POST /set_peer_weight/<pool>
//!     → handle.rs stop()   → stop command / kill → poll /ready until couldnt_connect
//! ```

pub mod handle;

pub use handle::ProxyHandle;
