//! Connection accounting for one mock server.
//!
//! Every accepted socket gets a sequence number, local to its server, for log
//! correlation. The open count includes connections stalled in drop mode.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Counts {
    accepted: AtomicU64,
    open: AtomicU64,
}

/// Shared between a `MockServer` handle and its accept task.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    counts: Arc<Counts>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accepted connection; it counts as open until the guard drops.
    pub fn track(&self) -> ConnectionGuard {
        let seq = self.counts.accepted.fetch_add(1, Ordering::Relaxed) + 1;
        self.counts.open.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            counts: Arc::clone(&self.counts),
            seq,
        }
    }

    pub fn open(&self) -> u64 {
        self.counts.open.load(Ordering::SeqCst)
    }

    /// Connections accepted since the server started.
    pub fn accepted(&self) -> u64 {
        self.counts.accepted.load(Ordering::Relaxed)
    }
}

/// Lives as long as the connection task.
#[derive(Debug)]
pub struct ConnectionGuard {
    counts: Arc<Counts>,
    seq: u64,
}

impl ConnectionGuard {
    /// 1-based position of this connection in accept order.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counts.open.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection = self.seq, "Connection closed");
    }
}
