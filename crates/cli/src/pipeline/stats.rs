//! Pipeline statistics and drain accounting.

use std::time::Duration;

use capture::{AcquirerReport, SchedulerReport};
use handoff::QueueMetricsSnapshot;
use sinks::{DisplayReport, StoreReport};

/// Statistics from a pipeline run
#[derive(Debug)]
pub struct PipelineStats {
    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Active sensors
    pub sensors: usize,

    /// Absent in external-line trigger mode
    pub scheduler: Option<SchedulerReport>,
    pub acquirer: AcquirerReport,
    pub display: DisplayReport,
    pub store: StoreReport,

    pub trigger_queue: QueueMetricsSnapshot,
    pub display_queue: QueueMetricsSnapshot,
    pub store_queue: QueueMetricsSnapshot,
}

impl PipelineStats {
    /// Pairs per second published by the acquirer
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.acquirer.pairs as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Every queued trigger was acquired, skipped or counted as abandoned.
    /// Always true in line-trigger mode, where the queue is unused.
    pub fn trigger_balanced(&self) -> bool {
        if self.scheduler.is_none() {
            return true;
        }
        self.trigger_queue.in_flight() == 0
            && self.trigger_queue.popped == self.acquirer.triggers_consumed()
    }

    /// Every produced pair reached the display, was lost to a full display
    /// queue, or is still buffered
    pub fn display_balanced(&self) -> bool {
        self.acquirer.pairs
            == self.display.received + self.acquirer.displaced + self.display_queue.in_flight()
    }

    /// Every pair the store received has exactly one outcome
    pub fn store_balanced(&self) -> bool {
        self.store.stored + self.store.skipped + self.store.failed == self.store.received
            && self.store.received == self.store_queue.popped
    }

    pub fn is_balanced(&self) -> bool {
        self.trigger_balanced() && self.display_balanced() && self.store_balanced()
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Pipeline Statistics ===\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Sensors: {}", self.sensors);
        println!("   ├─ Pairs acquired: {}", self.acquirer.pairs);
        println!("   └─ Pairs/s: {:.2}", self.fps());

        println!("\nTrigger");
        match &self.scheduler {
            Some(scheduler) => {
                println!("   ├─ Fired: {}", scheduler.fired);
                println!("   ├─ Failed issues: {}", scheduler.failed);
                println!("   └─ Dropped (queue full): {}", scheduler.displaced);
            }
            None => println!("   └─ External line trigger"),
        }

        println!("\nAcquisition");
        println!("   ├─ Skipped ticks: {}", self.acquirer.skipped);
        println!("   ├─ Dropped (queue full): {}", self.acquirer.displaced);
        println!("   ├─ Stale buffers discarded: {}", self.acquirer.stale);
        println!("   ├─ Abandoned triggers: {}", self.acquirer.abandoned);
        match &self.acquirer.fatal {
            Some(fatal) => println!("   └─ Stopped by: {fatal}"),
            None => println!("   └─ Stopped cleanly"),
        }

        println!("\nDisplay");
        println!("   ├─ Received: {}", self.display.received);
        println!("   ├─ Rendered: {}", self.display.rendered);
        println!("   ├─ Render failures: {}", self.display.render_failed);
        println!("   ├─ Conversion failures: {}", self.display.conversion_failed);
        println!("   ├─ Forwarded to store: {}", self.display.forwarded);
        println!("   └─ Lost forwarding: {}", self.display.forward_lost);

        println!("\nStore");
        println!("   ├─ Received: {}", self.store.received);
        println!("   ├─ Stored: {}", self.store.stored);
        println!("   ├─ Skipped: {}", self.store.skipped);
        println!("   └─ Failed: {}", self.store.failed);

        println!("\nQueues (high water / capacity used)");
        println!("   ├─ trigger: {}", self.trigger_queue.high_water);
        println!("   ├─ display: {}", self.display_queue.high_water);
        println!("   └─ store: {}", self.store_queue.high_water);

        println!("\n{}", self.display.summary);
        println!(
            "Drain accounting: {}",
            if self.is_balanced() { "balanced" } else { "UNBALANCED" }
        );
        println!();
    }
}
