//! Queue metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters for a single queue
#[derive(Debug, Default)]
pub struct QueueMetrics {
    /// Items accepted (including those that displaced another)
    pushed: AtomicU64,
    /// Items handed to the consumer
    popped: AtomicU64,
    /// Items evicted by `DropOldest`
    displaced: AtomicU64,
    /// Items refused by `DropNewest`
    rejected: AtomicU64,
    /// Largest depth observed after a push
    high_water: AtomicUsize,
}

impl QueueMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_pushed(&self, depth: usize) {
        self.pushed.fetch_add(1, Ordering::Relaxed);
        self.high_water.fetch_max(depth, Ordering::Relaxed);
    }

    pub(crate) fn record_popped(&self) {
        self.popped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_displaced(&self) {
        self.displaced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            pushed: self.pushed.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            displaced: self.displaced.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            high_water: self.high_water.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of queue metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueMetricsSnapshot {
    pub pushed: u64,
    pub popped: u64,
    pub displaced: u64,
    pub rejected: u64,
    pub high_water: usize,
}

impl QueueMetricsSnapshot {
    /// Items accepted but neither consumed nor evicted
    pub fn in_flight(&self) -> u64 {
        self.pushed.saturating_sub(self.popped + self.displaced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_water_keeps_maximum() {
        let m = QueueMetrics::new();
        m.record_pushed(1);
        m.record_pushed(3);
        m.record_pushed(2);
        assert_eq!(m.snapshot().high_water, 3);
        assert_eq!(m.snapshot().pushed, 3);
    }

    #[test]
    fn test_in_flight_accounting() {
        let m = QueueMetrics::new();
        for depth in 1..=4 {
            m.record_pushed(depth);
        }
        m.record_popped();
        m.record_displaced();
        assert_eq!(m.snapshot().in_flight(), 2);
    }
}
