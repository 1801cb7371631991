//! Shared per-pool counters.
//!
//! Hits are written from every backend's connection tasks at once, so each
//! server gets its own `DashMap` entry; the outcome histogram is only touched
//! by the load generator and sits behind a plain mutex.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;

use crate::mock::{MockResponse, RequestInfo, RequestObserver, ServerInfo};
use crate::polling::{Outcome, OutcomeCounts};

#[derive(Debug, Default)]
pub struct PoolCounters {
    hits: DashMap<String, u64>,
    responses: Mutex<OutcomeCounts>,
}

impl PoolCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request served by `server`.
    pub fn hit(&self, server: &str) {
        *self.hits.entry(server.to_string()).or_insert(0) += 1;
    }

    /// Snapshot of hits per server.
    pub fn hits(&self) -> BTreeMap<String, u64> {
        self.hits
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    pub fn total_hits(&self) -> u64 {
        self.hits.iter().map(|entry| *entry.value()).sum()
    }

    /// Fold a burst's histogram into the running totals.
    pub fn record_responses(&self, counts: &OutcomeCounts) {
        self.lock_responses().merge(counts);
    }

    pub fn responses(&self) -> OutcomeCounts {
        self.lock_responses().clone()
    }

    pub fn ok_responses(&self) -> u64 {
        self.lock_responses().get(Outcome::Ok)
    }

    /// Drop every hit and response.
    pub fn reset(&self) {
        self.hits.clear();
        *self.lock_responses() = OutcomeCounts::new();
    }

    /// Remove a server that left the pool.
    pub fn forget(&self, server: &str) {
        self.hits.remove(server);
    }

    fn lock_responses(&self) -> MutexGuard<'_, OutcomeCounts> {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Observer installed on every pool member: records the hit, then lets an
/// optional inner observer override the response.
pub struct HitRecorder {
    counters: Arc<PoolCounters>,
    inner: Option<Arc<dyn RequestObserver>>,
}

impl HitRecorder {
    pub fn new(counters: Arc<PoolCounters>, inner: Option<Arc<dyn RequestObserver>>) -> Self {
        Self { counters, inner }
    }
}

impl RequestObserver for HitRecorder {
    fn on_request(&self, request: &RequestInfo, server: &ServerInfo) -> Option<MockResponse> {
        self.counters.hit(server.name());
        self.inner
            .as_ref()
            .and_then(|inner| inner.on_request(request, server))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hits_accumulate_per_server() {
        let counters = PoolCounters::new();
        counters.hit("a");
        counters.hit("a");
        counters.hit("b");
        assert_eq!(counters.hits().get("a"), Some(&2));
        assert_eq!(counters.total_hits(), 3);

        counters.forget("a");
        assert_eq!(counters.total_hits(), 1);
    }

    #[test]
    fn responses_merge_and_reset() {
        let counters = PoolCounters::new();
        let burst: OutcomeCounts = [Outcome::Ok, Outcome::Ok, Outcome::ServerError]
            .into_iter()
            .collect();
        counters.record_responses(&burst);
        counters.record_responses(&burst);
        assert_eq!(counters.ok_responses(), 4);
        assert_eq!(counters.responses().total(), 6);

        counters.hit("a");
        counters.reset();
        assert_eq!(counters.total_hits(), 0);
        assert!(counters.responses().is_empty());
    }

    #[test]
    fn concurrent_hits_are_not_lost() {
        let counters = Arc::new(PoolCounters::new());
        let threads: Vec<_> = (0..8)
            .map(|i| {
                let counters = Arc::clone(&counters);
                std::thread::spawn(move || {
                    let name = format!("server-{}", i % 3);
                    for _ in 0..1000 {
                        counters.hit(&name);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(counters.total_hits(), 8000);
    }
}
