use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-bus delivery counters. All counters are monotonic for the lifetime
/// of the bus; a dropped or throttled event always increments exactly one
/// counter, so nothing is ever lost silently.
#[derive(Debug, Default)]
pub struct BusMetrics {
    published: AtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
    throttled: AtomicU64,
    failed: AtomicU64,
}

impl BusMetrics {
    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_throttled(&self) {
        self.throttled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a bus's counters, also used as the process-wide
/// aggregate across buses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Events accepted onto the queue.
    pub published: u64,
    /// Events fully delivered to listeners (including zero-listener events).
    pub processed: u64,
    /// Events dropped because the queue was full, the bus was disabled, or
    /// the bus was closed.
    pub dropped: u64,
    /// Events rejected by the token-bucket throttle.
    pub throttled: u64,
    /// Listener invocations that returned an error or panicked.
    pub failed: u64,
}

impl MetricsSnapshot {
    /// Every event that was published but never reached a listener.
    pub fn total_dropped(&self) -> u64 {
        self.dropped + self.throttled
    }

    /// Fold another snapshot into this one.
    pub fn merge(&mut self, other: &MetricsSnapshot) {
        self.published += other.published;
        self.processed += other.processed;
        self.dropped += other.dropped;
        self.throttled += other.throttled;
        self.failed += other.failed;
    }
}
