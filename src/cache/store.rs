//! In-memory TTL store for serialized responses.
//!
//! # Responsibilities
//! - Concurrent get/set keyed by fingerprint
//! - Per-entry expiry (lazy on read) plus a periodic janitor sweep
//!
//! # Design Decisions
//! - Last-writer-wins on racing misses; the store does not guarantee
//!   at-most-one-upstream-call per fingerprint, only eventual population
//! - Entries never persist across restarts

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::observability::metrics;

struct Entry {
    blob: Bytes,
    expires_at: Instant,
}

/// A thread-safe, time-expiring blob store.
pub struct Store {
    entries: DashMap<String, Entry>,
    ttl: Duration,
}

impl Store {
    /// Create a store whose entries expire `ttl` after insertion.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Look up a live entry. Expired entries are removed and reported as a
    /// miss.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Some(entry.blob.clone());
            }
            drop(entry);
            self.entries.remove(key);
        }
        None
    }

    /// Insert a blob under `key` with the store's default TTL.
    pub fn insert(&self, key: String, blob: Bytes) {
        self.entries.insert(
            key,
            Entry {
                blob,
                expires_at: Instant::now() + self.ttl,
            },
        );
        metrics::record_cache_size(self.entries.len());
    }

    /// Drop an entry outright (e.g., one that no longer decodes).
    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Remove every expired entry.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
        metrics::record_cache_size(self.entries.len());
    }

    /// Number of entries currently held, including not-yet-swept expired
    /// ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawn the background sweep task. It runs until the shutdown signal
    /// fires.
    pub fn spawn_janitor(
        self: Arc<Self>,
        every: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut sweep = tokio::time::interval(every);
            sweep.tick().await; // immediate first tick
            loop {
                tokio::select! {
                    _ = sweep.tick() => {
                        let before = self.len();
                        self.purge_expired();
                        tracing::debug!(
                            removed = before.saturating_sub(self.len()),
                            remaining = self.len(),
                            "cache sweep"
                        );
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("cache janitor stopping");
                        return;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = Store::new(Duration::from_secs(60));
        store.insert("k".into(), Bytes::from_static(b"blob"));
        assert_eq!(store.get("k").unwrap(), Bytes::from_static(b"blob"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(store.get("k").is_none());
        // lazy expiry removed the entry
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn insert_refreshes_expiry() {
        let store = Store::new(Duration::from_secs(60));
        store.insert("k".into(), Bytes::from_static(b"old"));
        tokio::time::advance(Duration::from_secs(50)).await;
        store.insert("k".into(), Bytes::from_static(b"new"));
        tokio::time::advance(Duration::from_secs(50)).await;
        assert_eq!(store.get("k").unwrap(), Bytes::from_static(b"new"));
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired() {
        let store = Store::new(Duration::from_secs(60));
        store.insert("old".into(), Bytes::new());
        tokio::time::advance(Duration::from_secs(40)).await;
        store.insert("fresh".into(), Bytes::new());
        tokio::time::advance(Duration::from_secs(30)).await;

        store.purge_expired();
        assert_eq!(store.len(), 1);
        assert!(store.get("fresh").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn janitor_sweeps_and_stops_on_shutdown() {
        let store = Arc::new(Store::new(Duration::from_secs(1)));
        store.insert("k".into(), Bytes::new());

        let (tx, rx) = broadcast::channel(1);
        let handle = store.clone().spawn_janitor(Duration::from_secs(10), rx);

        tokio::time::advance(Duration::from_secs(11)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(store.is_empty());

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
