//! Live sink counters, readable from other threads while a sink runs

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a single sink.
///
/// `succeeded` is rendered (display) or stored (store); `dropped` counts
/// pairs the sink could not process at all.
#[derive(Debug, Default)]
pub struct SinkMetrics {
    received: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    dropped: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn inc_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn inc_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn skipped(&self) -> u64 {
        self.skipped.load(Ordering::Relaxed)
    }

    pub fn inc_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SinkMetricsSnapshot {
        SinkMetricsSnapshot {
            received: self.received(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            skipped: self.skipped(),
            dropped: self.dropped(),
        }
    }
}

/// Point-in-time copy of [`SinkMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkMetricsSnapshot {
    pub received: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub dropped: u64,
}

impl SinkMetricsSnapshot {
    /// Received pairs not yet accounted for by any outcome
    pub fn pending(&self) -> u64 {
        self.received
            .saturating_sub(self.succeeded + self.failed + self.skipped + self.dropped)
    }
}
