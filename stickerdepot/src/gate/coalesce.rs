//! In-flight request coalescing.
//!
//! The first caller for a key becomes the leader: its work is spawned as a
//! task whose single result is broadcast to every caller that joined while
//! it was pending. The entry is removed before the result is sent, so a
//! caller arriving after completion starts fresh.
//!
//! Check-and-insert happens under one `DashMap` entry lock.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

/// Failure of the coalescing machinery itself (not of the work).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoalesceError {
    /// The leader task ended without producing a result (it panicked or the
    /// runtime shut down).
    #[error("in-flight operation was abandoned")]
    Abandoned,
}

/// Snapshot of coalescing statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoalescerStats {
    /// Total requests received
    pub total_requests: u64,
    /// Requests that joined existing work
    pub coalesced_requests: u64,
    /// Requests that started new work
    pub new_requests: u64,
}

impl CoalescerStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    total: AtomicU64,
    coalesced: AtomicU64,
    new: AtomicU64,
}

/// Merges concurrent operations keyed by `K` that produce a `V`.
pub struct InFlightCoalescer<K, V>
where
    K: Eq + Hash,
{
    in_flight: Arc<DashMap<K, broadcast::Sender<V>>>,
    counters: Counters,
}

/// Removes the in-flight entry when the leader task finishes or unwinds.
struct EntryGuard<K: Eq + Hash, V> {
    in_flight: Arc<DashMap<K, broadcast::Sender<V>>>,
    key: Option<K>,
}

impl<K: Eq + Hash, V> Drop for EntryGuard<K, V> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.in_flight.remove(&key);
        }
    }
}

impl<K, V> InFlightCoalescer<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
            counters: Counters::default(),
        }
    }

    /// Run `work` for `key`, or join the operation already running for it.
    ///
    /// `work` is only invoked by the leader. Every caller, leader included,
    /// receives a clone of the same result.
    pub async fn run_or_join<F, Fut>(&self, key: K, work: F) -> Result<V, CoalesceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        self.counters.total.fetch_add(1, Ordering::Relaxed);

        let (mut rx, leader) = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(key = ?key, "Joining in-flight operation");
                (entry.get().subscribe(), None)
            }
            Entry::Vacant(entry) => {
                self.counters.new.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = broadcast::channel(1);
                entry.insert(tx.clone());
                (rx, Some(tx))
            }
        };

        if let Some(tx) = leader {
            let fut = work();
            let guard = EntryGuard {
                in_flight: Arc::clone(&self.in_flight),
                key: Some(key),
            };
            tokio::spawn(async move {
                let value = fut.await;
                drop(guard);
                let _ = tx.send(value);
            });
        }

        rx.recv().await.map_err(|_| CoalesceError::Abandoned)
    }

    /// Whether an operation for `key` is pending.
    pub fn is_in_flight(&self, key: &K) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Number of pending operations.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn stats(&self) -> CoalescerStats {
        CoalescerStats {
            total_requests: self.counters.total.load(Ordering::Relaxed),
            coalesced_requests: self.counters.coalesced.load(Ordering::Relaxed),
            new_requests: self.counters.new.load(Ordering::Relaxed),
        }
    }
}

impl<K, V> Default for InFlightCoalescer<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_single_request_runs_work() {
        let coalescer: InFlightCoalescer<String, u32> = InFlightCoalescer::new();
        let result = coalescer
            .run_or_join("a".to_string(), || async { 7 })
            .await;
        assert_eq!(result, Ok(7));
        assert_eq!(coalescer.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_run() {
        let coalescer: Arc<InFlightCoalescer<&'static str, u32>> =
            Arc::new(InFlightCoalescer::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(Notify::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coalescer = Arc::clone(&coalescer);
            let runs = Arc::clone(&runs);
            let release = Arc::clone(&release);
            handles.push(tokio::spawn(async move {
                coalescer
                    .run_or_join("k", move || async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        release.notified().await;
                        42
                    })
                    .await
            }));
        }

        // Let every caller register before the work completes.
        while coalescer.stats().total_requests < 8 {
            tokio::task::yield_now().await;
        }
        release.notify_one();

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(42));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let stats = coalescer.stats();
        assert_eq!(stats.new_requests, 1);
        assert_eq!(stats.coalesced_requests, 7);
        assert!(stats.coalescing_ratio() > 0.8);
    }

    #[tokio::test]
    async fn test_completed_entry_starts_fresh() {
        let coalescer: InFlightCoalescer<u8, usize> = InFlightCoalescer::new();
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let runs = Arc::clone(&runs);
            coalescer
                .run_or_join(1, move || async move { runs.fetch_add(1, Ordering::SeqCst) })
                .await
                .unwrap();
        }
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert!(!coalescer.is_in_flight(&1));
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_coalesce() {
        let coalescer: InFlightCoalescer<u8, u8> = InFlightCoalescer::new();
        let (a, b) = tokio::join!(
            coalescer.run_or_join(1, || async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                1
            }),
            coalescer.run_or_join(2, || async { 2 }),
        );
        assert_eq!((a, b), (Ok(1), Ok(2)));
        assert_eq!(coalescer.stats().new_requests, 2);
    }

    #[tokio::test]
    async fn test_errors_are_shared_too() {
        let coalescer: InFlightCoalescer<u8, Result<u8, String>> = InFlightCoalescer::new();
        let result = coalescer
            .run_or_join(9, || async { Err("boom".to_string()) })
            .await;
        assert_eq!(result, Ok(Err("boom".to_string())));
    }

    async fn explode() -> u8 {
        panic!("work failed")
    }

    #[tokio::test]
    async fn test_panicking_work_is_abandoned_and_cleared() {
        let coalescer: InFlightCoalescer<u8, u8> = InFlightCoalescer::new();
        let result = coalescer.run_or_join(3, explode).await;
        assert_eq!(result, Err(CoalesceError::Abandoned));
        assert!(!coalescer.is_in_flight(&3));

        let retry = coalescer.run_or_join(3, || async { 5 }).await;
        assert_eq!(retry, Ok(5));
    }
}
