//! Metrics collection module
//!
//! Tracks search calls, downloads, uploads and failures for one run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

const RESPONSE_TIME_WINDOW: usize = 100;

/// Run-wide counters shared by every worker
#[derive(Default)]
pub struct Metrics {
    searches: AtomicU64,
    images_fetched: AtomicU64,
    images_stored: AtomicU64,
    bytes_stored: AtomicU64,
    /// Failures by stage and error kind, e.g. ("fetch", "network")
    failures: RwLock<HashMap<(&'static str, &'static str), u64>>,
    /// Search response times in ms (rolling window)
    search_times: RwLock<Vec<u64>>,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed search call
    pub fn record_search(&self, elapsed: Duration) {
        self.searches.fetch_add(1, Ordering::Relaxed);

        let mut times = write(&self.search_times);
        if times.len() >= RESPONSE_TIME_WINDOW {
            times.remove(0);
        }
        times.push(elapsed.as_millis() as u64);
    }

    pub fn record_fetch(&self) {
        self.images_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_store(&self, bytes: u64) {
        self.images_stored.fetch_add(1, Ordering::Relaxed);
        self.bytes_stored.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a failure of `stage` ("search", "fetch", "store", "worker")
    pub fn record_failure(&self, stage: &'static str, kind: &'static str) {
        *write(&self.failures).entry((stage, kind)).or_insert(0) += 1;
    }

    /// Failures recorded for a stage across all kinds
    pub fn failures_for(&self, stage: &str) -> u64 {
        read(&self.failures)
            .iter()
            .filter(|((s, _), _)| *s == stage)
            .map(|(_, count)| count)
            .sum()
    }

    /// Average search response time
    pub fn avg_search_time(&self) -> Option<Duration> {
        let times = read(&self.search_times);
        if times.is_empty() {
            None
        } else {
            Some(Duration::from_millis(
                times.iter().sum::<u64>() / times.len() as u64,
            ))
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            searches: self.searches.load(Ordering::Relaxed),
            images_fetched: self.images_fetched.load(Ordering::Relaxed),
            images_stored: self.images_stored.load(Ordering::Relaxed),
            bytes_stored: self.bytes_stored.load(Ordering::Relaxed),
            search_failures: self.failures_for("search"),
            fetch_failures: self.failures_for("fetch"),
            store_failures: self.failures_for("store"),
            worker_failures: self.failures_for("worker"),
            avg_search_time: self.avg_search_time(),
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub searches: u64,
    pub images_fetched: u64,
    pub images_stored: u64,
    pub bytes_stored: u64,
    pub search_failures: u64,
    pub fetch_failures: u64,
    pub store_failures: u64,
    pub worker_failures: u64,
    pub avg_search_time: Option<Duration>,
}
