//! StoreSink - persistence consumer
//!
//! Persists every forwarded pair until the store queue is closed and empty.
//! The backend is called once per pair; failures are counted, never retried.

use std::sync::Arc;

use contracts::{ConvertedFramePair, FrameStore};
use handoff::BoundedQueue;
use observability::StoreStatus;
use tracing::{error, info, instrument, warn};

use crate::metrics::SinkMetrics;

/// Outcome of a store run; `stored + skipped + failed == received`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreReport {
    pub received: u64,
    pub stored: u64,
    /// Pairs not persisted because saving is disabled
    pub skipped: u64,
    pub failed: u64,
}

/// Store consumer thread body
pub struct StoreSink {
    store: Box<dyn FrameStore>,
    input: Arc<BoundedQueue<ConvertedFramePair>>,
    enabled: bool,
    metrics: Arc<SinkMetrics>,
}

impl StoreSink {
    pub fn new(store: Box<dyn FrameStore>, input: Arc<BoundedQueue<ConvertedFramePair>>) -> Self {
        Self {
            store,
            input,
            enabled: true,
            metrics: Arc::new(SinkMetrics::new()),
        }
    }

    /// Disabled sinks still drain their queue, counting every pair as skipped
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Live counters: `succeeded` = stored
    pub fn metrics(&self) -> Arc<SinkMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Store loop; call on a dedicated thread
    #[instrument(
        name = "store_sink",
        skip(self),
        fields(store = %self.store.name(), enabled = self.enabled)
    )]
    pub fn run(mut self) -> StoreReport {
        info!("store sink started");

        while let Some(pair) = self.input.wait_pop() {
            self.metrics.inc_received();

            if !self.enabled {
                self.metrics.inc_skipped();
                observability::record_pair_stored(self.store.name(), StoreStatus::Skipped);
                continue;
            }

            match self.store.save(&pair) {
                Ok(()) => {
                    self.metrics.inc_succeeded();
                    observability::record_pair_stored(self.store.name(), StoreStatus::Stored);
                }
                Err(e) => {
                    self.metrics.inc_failed();
                    observability::record_pair_stored(self.store.name(), StoreStatus::Failed);
                    error!(
                        sequence = pair.trigger().sequence,
                        image_number = ?pair.image_number(),
                        error = %e,
                        "store failed"
                    );
                }
            }
        }

        if let Err(e) = self.store.flush() {
            warn!(error = %e, "store flush failed");
        }
        if let Err(e) = self.store.close() {
            warn!(error = %e, "store close failed");
        }

        let counts = self.metrics.snapshot();
        let report = StoreReport {
            received: counts.received,
            stored: counts.succeeded,
            skipped: counts.skipped,
            failed: counts.failed,
        };
        info!(
            received = report.received,
            stored = report.stored,
            skipped = report.skipped,
            failed = report.failed,
            "store sink stopped"
        );
        report
    }
}
