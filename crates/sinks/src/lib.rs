//! # Sinks
//!
//! Consumer end of the pipeline.
//!
//! - [`DisplaySink`]: converts and renders every acquired pair, watches for
//!   operator input and forwards pairs selected for saving
//! - [`StoreSink`]: persists forwarded pairs until its queue is closed and empty
//!
//! Both drain their queue completely before stopping, so every pair that
//! entered the pipeline is either handled or counted.

pub mod backends;
pub mod compose;
pub mod display;
pub mod metrics;
pub mod store;

pub use backends::{
    build_display, build_store, FileStore, InterruptSignal, LogDisplay, LogStore, SnapshotDisplay,
};
pub use compose::concat_horizontal;
pub use display::{DisplayReport, DisplaySink};
pub use metrics::{SinkMetrics, SinkMetricsSnapshot};
pub use store::{StoreReport, StoreSink};
