use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

/// Per-key flight coordination: the first task to ask for a key becomes its
/// leader and performs the fetch; every other task parks until the leader
/// finishes, then re-reads the local store.
#[derive(Debug, Default)]
pub(crate) struct Singleflight {
    flights: Mutex<HashMap<String, Arc<Notify>>>,
}

impl Singleflight {
    /// Returns true when the caller is now the leader for `key` and must
    /// call `finish` once done. Returns false after having waited out an
    /// existing leader.
    pub(crate) async fn begin(&self, key: &str) -> bool {
        let mut flights = self.flights.lock().await;
        if let Some(notify) = flights.get(key).cloned() {
            let notified = notify.notified();
            tokio::pin!(notified);
            // Register before releasing the map lock so a notify_waiters
            // racing with this task cannot slip past unseen.
            notified.as_mut().enable();
            drop(flights);
            notified.await;
            return false;
        }
        flights.insert(key.to_string(), Arc::new(Notify::new()));
        true
    }

    pub(crate) async fn finish(&self, key: &str) {
        let mut flights = self.flights.lock().await;
        if let Some(notify) = flights.remove(key) {
            notify.notify_waiters();
        }
    }
}

/// Counters for what the store actually did, kept lock-free so fetch paths
/// never serialize on bookkeeping.
#[derive(Debug, Default)]
pub struct FetchStats {
    cache_hits: AtomicU64,
    remote_fetches: AtomicU64,
    metadata_fetches: AtomicU64,
    flight_waits: AtomicU64,
    checksum_failures: AtomicU64,
}

impl FetchStats {
    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_remote_fetch(&self) {
        self.remote_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_metadata_fetch(&self) {
        self.metadata_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_flight_wait(&self) {
        self.flight_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_checksum_failure(&self) {
        self.checksum_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn remote_fetches(&self) -> u64 {
        self.remote_fetches.load(Ordering::Relaxed)
    }

    pub fn metadata_fetches(&self) -> u64 {
        self.metadata_fetches.load(Ordering::Relaxed)
    }

    pub fn flight_waits(&self) -> u64 {
        self.flight_waits.load(Ordering::Relaxed)
    }

    pub fn checksum_failures(&self) -> u64 {
        self.checksum_failures.load(Ordering::Relaxed)
    }
}
