//! TriggerScheduler - fixed-rate simultaneous capture
//!
//! Sleeps to an absolute deadline and advances it by the fixed period, so the
//! issuing thread's own jitter never accumulates into drift.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use contracts::{ActionTrigger, CaptureConfig, GroupKey, TriggerEvent};
use handoff::{BoundedQueue, ExitFlag, PushOutcome, QueueError};
use tracing::{debug, info, instrument, trace, warn};

/// Longest uninterrupted sleep; bounds exit-flag reaction time
const SLEEP_SLICE: Duration = Duration::from_millis(20);

/// Scheduler parameters
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Fixed trigger period
    pub period: Duration,
    /// Action-command group
    pub group: GroupKey,
    /// Stop after this many successful triggers
    pub max_triggers: Option<u64>,
}

impl SchedulerConfig {
    pub fn from_capture(capture: &CaptureConfig) -> Self {
        Self {
            period: capture.period(),
            group: capture.group_key,
            max_triggers: None,
        }
    }

    pub fn with_max_triggers(mut self, max: u64) -> Self {
        self.max_triggers = Some(max);
        self
    }
}

/// Counters returned when the scheduler stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerReport {
    /// Triggers issued and published
    pub fired: u64,
    /// Ticks skipped because the issue failed
    pub failed: u64,
    /// Trigger events lost to a full trigger queue
    pub displaced: u64,
}

/// Periodic simultaneous-capture issuer.
///
/// Runs until the exit flag is raised (or `max_triggers` is reached), then
/// closes the trigger queue so a blocked acquirer wakes up. It owns no
/// downstream backlog, so there is nothing to drain.
pub struct TriggerScheduler {
    trigger: Arc<dyn ActionTrigger>,
    queue: Arc<BoundedQueue<TriggerEvent>>,
    exit: ExitFlag,
    config: SchedulerConfig,
}

impl TriggerScheduler {
    pub fn new(
        trigger: Arc<dyn ActionTrigger>,
        queue: Arc<BoundedQueue<TriggerEvent>>,
        exit: ExitFlag,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            trigger,
            queue,
            exit,
            config,
        }
    }

    /// Scheduler loop; call on a dedicated thread
    #[instrument(
        name = "trigger_scheduler",
        skip(self),
        fields(period_ms = self.config.period.as_millis() as u64, group = %self.config.group)
    )]
    pub fn run(self) -> SchedulerReport {
        let mut report = SchedulerReport::default();
        let mut deadline = Instant::now();
        let mut sequence: u64 = 0;

        info!("trigger scheduler started");

        loop {
            if self
                .config
                .max_triggers
                .is_some_and(|max| report.fired >= max)
            {
                debug!(fired = report.fired, "trigger budget reached");
                break;
            }
            if !self.sleep_until(deadline) {
                break;
            }

            let lateness = Instant::now().saturating_duration_since(deadline);
            deadline += self.config.period;

            let fired_at = Utc::now();
            if let Err(e) = self.trigger.issue_simultaneous_capture(self.config.group) {
                report.failed += 1;
                observability::record_trigger_failure();
                warn!(error = %e, next_sequence = sequence, "action command failed, tick skipped");
                continue;
            }

            let event = TriggerEvent::new(sequence, fired_at);
            sequence += 1;
            report.fired += 1;
            observability::record_trigger_fired(lateness.as_secs_f64() * 1000.0);
            trace!(sequence = event.sequence, lateness_us = lateness.as_micros() as u64, "trigger fired");

            match self.queue.push(event) {
                Ok(PushOutcome::Enqueued) => {}
                Ok(PushOutcome::Displaced(old)) => {
                    report.displaced += 1;
                    warn!(dropped = old.sequence, "trigger queue full, oldest trigger dropped");
                }
                Err(QueueError::Full(event)) => {
                    report.displaced += 1;
                    warn!(dropped = event.sequence, "trigger queue full, trigger dropped");
                }
                Err(QueueError::Closed(_)) => {
                    debug!("trigger queue closed by consumer");
                    break;
                }
            }
        }

        self.queue.close();
        info!(
            fired = report.fired,
            failed = report.failed,
            displaced = report.displaced,
            "trigger scheduler stopped"
        );
        report
    }

    /// Sleep to `deadline` in slices; `false` if the exit flag cut it short
    fn sleep_until(&self, deadline: Instant) -> bool {
        loop {
            if self.exit.is_raised() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}
