//! Pipeline metrics
//!
//! Thin `record_*` wrappers over the `metrics` facade, one per pipeline
//! event, plus an in-memory aggregator for the end-of-run summary.

use contracts::TriggerEvent;
use metrics::{counter, gauge, histogram};

/// Trigger issued; `lateness_ms` is how far past its deadline the tick ran
pub fn record_trigger_fired(lateness_ms: f64) {
    counter!("pairgrab_triggers_total").increment(1);
    histogram!("pairgrab_trigger_lateness_ms").record(lateness_ms);
}

/// Action command rejected by a device; tick skipped
pub fn record_trigger_failure() {
    counter!("pairgrab_trigger_failures_total").increment(1);
}

/// One pair assembled by the acquirer
pub fn record_pair_acquired(frames: usize, acquire_ms: f64) {
    counter!("pairgrab_pairs_acquired_total").increment(1);
    gauge!("pairgrab_pair_frames").set(frames as f64);
    histogram!("pairgrab_acquire_ms").record(acquire_ms);
}

/// Acquisition failure, labelled by error kind
pub fn record_acquisition_failure(kind: &str, fatal: bool) {
    counter!(
        "pairgrab_acquisition_failures_total",
        "kind" => kind.to_string(),
        "fatal" => fatal.to_string()
    )
    .increment(1);
}

/// Buffer dropped because it belonged to an earlier capture
pub fn record_stale_buffer() {
    counter!("pairgrab_stale_buffers_total").increment(1);
}

/// Raw-to-undistorted conversion time of one pair
pub fn record_conversion_ms(ms: f64) {
    histogram!("pairgrab_conversion_ms").record(ms);
}

/// Pair presented by a display backend
pub fn record_pair_rendered(display: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "pairgrab_pairs_rendered_total",
        "display" => display.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Store outcome of one pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Stored,
    Skipped,
    Failed,
}

impl StoreStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stored => "stored",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

/// Pair handled by a store backend
pub fn record_pair_stored(store: &str, status: StoreStatus) {
    counter!(
        "pairgrab_pairs_stored_total",
        "store" => store.to_string(),
        "status" => status.as_str()
    )
    .increment(1);
}

/// Capture statistics aggregator
///
/// Fed once per converted pair by the display stage.
#[derive(Debug, Clone, Default)]
pub struct CaptureStatsAggregator {
    /// Pairs observed
    pub total_pairs: u64,

    /// Pairs without a secondary frame
    pub single_frame_pairs: u64,

    /// Trigger sequences never observed between two observed ones
    pub sequence_gaps: u64,

    /// Host-time spacing between consecutive pairs (ms)
    pub interval_stats: RunningStats,

    /// Conversion time per pair (ms)
    pub conversion_stats: RunningStats,

    last: Option<TriggerEvent>,
}

impl CaptureStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account one pair
    pub fn update(&mut self, trigger: &TriggerEvent, frames: usize, conversion_ms: f64) {
        self.total_pairs += 1;
        if frames < 2 {
            self.single_frame_pairs += 1;
        }
        self.conversion_stats.push(conversion_ms);

        if let Some(last) = &self.last {
            let interval = trigger.fired_at - last.fired_at;
            self.interval_stats
                .push(interval.num_microseconds().unwrap_or(i64::MAX) as f64 / 1000.0);
            self.sequence_gaps += trigger.sequence.saturating_sub(last.sequence + 1);
        }
        self.last = Some(*trigger);
    }

    pub fn summary(&self) -> CaptureSummary {
        CaptureSummary {
            total_pairs: self.total_pairs,
            single_frame_pairs: self.single_frame_pairs,
            sequence_gaps: self.sequence_gaps,
            interval_ms: StatsSummary::from(&self.interval_stats),
            conversion_ms: StatsSummary::from(&self.conversion_stats),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// End-of-run capture summary
#[derive(Debug, Clone, Default)]
pub struct CaptureSummary {
    pub total_pairs: u64,
    pub single_frame_pairs: u64,
    pub sequence_gaps: u64,
    pub interval_ms: StatsSummary,
    pub conversion_ms: StatsSummary,
}

impl std::fmt::Display for CaptureSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Capture Summary ===")?;
        writeln!(f, "Total pairs: {}", self.total_pairs)?;
        writeln!(f, "Single-frame pairs: {}", self.single_frame_pairs)?;
        writeln!(f, "Sequence gaps: {}", self.sequence_gaps)?;
        writeln!(f, "Pair interval (ms): {}", self.interval_ms)?;
        writeln!(f, "Conversion (ms): {}", self.conversion_ms)?;
        Ok(())
    }
}

/// Summary of one [`RunningStats`]
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean/variance (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
