//! # Handoff
//!
//! Bounded, blocking FIFO channels connecting the pipeline threads.
//!
//! Each stage owns one end of a [`BoundedQueue`]: the scheduler feeds the
//! acquirer, the acquirer feeds the display, the display feeds the store.
//! Closing a queue is the shutdown signal: blocked consumers wake up, drain
//! what is left, then observe the end of the stream. The [`ExitFlag`] tells
//! producers to stop starting new work.
//!
//! # Example
//!
//! ```
//! use handoff::{BoundedQueue, PushOutcome};
//! use contracts::{OverflowPolicy, QueueConfig};
//!
//! let queue = BoundedQueue::new("demo", QueueConfig::new(2, OverflowPolicy::Block));
//! assert!(matches!(queue.push(1), Ok(PushOutcome::Enqueued)));
//! queue.close();
//! assert_eq!(queue.wait_pop(), Some(1));
//! assert_eq!(queue.wait_pop(), None);
//! ```

mod exit;
mod queue;
mod stats;

pub use exit::ExitFlag;
pub use queue::{BoundedQueue, PushOutcome, QueueError};
pub use stats::{QueueMetrics, QueueMetricsSnapshot};
