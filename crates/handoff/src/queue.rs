//! BoundedQueue - blocking FIFO hand-off between pipeline threads

use std::fmt;
use std::sync::Arc;

use async_channel::{Receiver, Sender, TrySendError};
use contracts::{OverflowPolicy, QueueConfig};
use thiserror::Error;
use tracing::{debug, trace};

use crate::stats::{QueueMetrics, QueueMetricsSnapshot};

/// Successful push result
#[derive(Debug, PartialEq, Eq)]
pub enum PushOutcome<T> {
    /// Item appended, nothing lost
    Enqueued,
    /// Item appended after evicting the returned head (`DropOldest`)
    Displaced(T),
}

/// Failed push; the item is handed back
#[derive(Error, PartialEq, Eq)]
pub enum QueueError<T> {
    /// Queue at capacity under `DropNewest`
    #[error("queue is full")]
    Full(T),
    /// Queue closed; no further items are accepted
    #[error("queue is closed")]
    Closed(T),
}

impl<T> QueueError<T> {
    /// Recover the rejected item
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::Closed(item) => item,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

impl<T> fmt::Debug for QueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => f.write_str("Full(..)"),
            Self::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

/// Thread-safe, bounded FIFO channel with an explicit overflow policy.
///
/// Backed by an `async-channel` bounded channel driven through its blocking
/// API, so plain OS threads can use it without a runtime. One queue is
/// shared between its producer and consumer behind an `Arc`.
///
/// Ordering: a single producer and single consumer see exact emission order.
pub struct BoundedQueue<T> {
    name: Arc<str>,
    policy: OverflowPolicy,
    tx: Sender<T>,
    rx: Receiver<T>,
    metrics: QueueMetrics,
}

impl<T> BoundedQueue<T> {
    /// Create a queue; a zero capacity is raised to one.
    pub fn new(name: impl Into<Arc<str>>, config: QueueConfig) -> Self {
        let (tx, rx) = async_channel::bounded(config.capacity.max(1));
        Self {
            name: name.into(),
            policy: config.overflow,
            tx,
            rx,
            metrics: QueueMetrics::new(),
        }
    }

    /// Queue name (used for logging/metrics)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Enqueue `item` according to the overflow policy.
    ///
    /// `Block` waits for room; `DropOldest` evicts the head; `DropNewest`
    /// hands the item back as [`QueueError::Full`].
    ///
    /// # Errors
    /// [`QueueError::Closed`] once [`close`](Self::close) was called.
    pub fn push(&self, item: T) -> Result<PushOutcome<T>, QueueError<T>> {
        let result = match self.policy {
            OverflowPolicy::Block => self
                .tx
                .send_blocking(item)
                .map(|()| PushOutcome::Enqueued)
                .map_err(|e| QueueError::Closed(e.into_inner())),
            OverflowPolicy::DropOldest => match self.tx.force_send(item) {
                Ok(None) => Ok(PushOutcome::Enqueued),
                Ok(Some(old)) => Ok(PushOutcome::Displaced(old)),
                Err(e) => Err(QueueError::Closed(e.into_inner())),
            },
            OverflowPolicy::DropNewest => match self.tx.try_send(item) {
                Ok(()) => Ok(PushOutcome::Enqueued),
                Err(TrySendError::Full(item)) => Err(QueueError::Full(item)),
                Err(TrySendError::Closed(item)) => Err(QueueError::Closed(item)),
            },
        };

        match &result {
            Ok(outcome) => {
                let depth = self.size();
                self.metrics.record_pushed(depth);
                if matches!(outcome, PushOutcome::Displaced(_)) {
                    self.metrics.record_displaced();
                    debug!(queue = %self.name, depth, "oldest item displaced");
                    metrics::counter!("pairgrab_queue_displaced_total", "queue" => self.name.to_string())
                        .increment(1);
                }
                trace!(queue = %self.name, depth, "item enqueued");
                self.record_depth(depth);
            }
            Err(QueueError::Full(_)) => {
                self.metrics.record_rejected();
                debug!(queue = %self.name, "queue full, newest item rejected");
                metrics::counter!("pairgrab_queue_rejected_total", "queue" => self.name.to_string())
                    .increment(1);
            }
            Err(QueueError::Closed(_)) => {
                trace!(queue = %self.name, "push on closed queue");
            }
        }
        result
    }

    /// Block until an item is available and return the oldest one.
    ///
    /// Returns `None` only once the queue is closed **and** empty, so a
    /// consumer looping on this drains every buffered item before stopping.
    pub fn wait_pop(&self) -> Option<T> {
        let item = self.rx.recv_blocking().ok()?;
        self.on_popped();
        Some(item)
    }

    /// Pop the oldest item without blocking
    pub fn try_pop(&self) -> Option<T> {
        let item = self.rx.try_recv().ok()?;
        self.on_popped();
        Some(item)
    }

    /// Number of buffered items (snapshot)
    pub fn size(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is empty (snapshot)
    pub fn empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.rx.capacity().unwrap_or(usize::MAX)
    }

    /// Stop accepting items and wake every blocked producer and consumer.
    ///
    /// Buffered items stay poppable. Returns `true` if this call closed it.
    pub fn close(&self) -> bool {
        let closed = self.tx.close();
        if closed {
            debug!(queue = %self.name, remaining = self.size(), "queue closed");
        }
        closed
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn metrics(&self) -> QueueMetricsSnapshot {
        self.metrics.snapshot()
    }

    fn on_popped(&self) {
        self.metrics.record_popped();
        self.record_depth(self.size());
    }

    fn record_depth(&self, depth: usize) {
        metrics::gauge!("pairgrab_queue_depth", "queue" => self.name.to_string()).set(depth as f64);
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("size", &self.size())
            .field("capacity", &self.capacity())
            .field("closed", &self.is_closed())
            .finish()
    }
}
