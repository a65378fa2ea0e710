//! DisplaySink - convert, render, watch the operator
//!
//! Pops raw pairs from the display queue, converts them to undistorted
//! pairs, renders them and polls for operator input. Pairs selected for
//! saving are numbered and forwarded to the store queue.

use std::sync::Arc;
use std::time::Instant;

use contracts::{ConvertedFramePair, FrameDisplay, FramePair, OperatorKey};
use conversion::ConversionStage;
use handoff::{BoundedQueue, ExitFlag, PushOutcome, QueueError};
use observability::{CaptureStatsAggregator, CaptureSummary};
use tracing::{debug, error, info, instrument, warn};

use crate::metrics::SinkMetrics;

/// Outcome of a display run
#[derive(Debug, Clone, Default)]
pub struct DisplayReport {
    /// Pairs popped from the display queue
    pub received: u64,
    pub rendered: u64,
    pub render_failed: u64,
    /// Pairs lost because conversion failed
    pub conversion_failed: u64,
    /// Pairs handed to the store queue
    pub forwarded: u64,
    /// Pairs shown but not selected for saving
    pub not_forwarded: u64,
    /// Forwarded pairs lost to a full or closed store queue
    pub forward_lost: u64,
    /// The operator asked to stop
    pub exit_requested: bool,
    pub summary: CaptureSummary,
}

/// Display consumer thread body
pub struct DisplaySink {
    display: Box<dyn FrameDisplay>,
    converter: ConversionStage,
    input: Arc<BoundedQueue<FramePair>>,
    output: Arc<BoundedQueue<ConvertedFramePair>>,
    exit: ExitFlag,
    recording: bool,
    image_number: u64,
    metrics: Arc<SinkMetrics>,
}

impl DisplaySink {
    pub fn new(
        display: Box<dyn FrameDisplay>,
        converter: ConversionStage,
        input: Arc<BoundedQueue<FramePair>>,
        output: Arc<BoundedQueue<ConvertedFramePair>>,
        exit: ExitFlag,
    ) -> Self {
        Self {
            display,
            converter,
            input,
            output,
            exit,
            recording: false,
            image_number: 0,
            metrics: Arc::new(SinkMetrics::new()),
        }
    }

    /// Forward every pair from the start instead of waiting for the operator
    pub fn with_recording(mut self, recording: bool) -> Self {
        self.recording = recording;
        self
    }

    /// Live counters: `succeeded` = rendered, `failed` = render errors,
    /// `dropped` = conversion errors
    pub fn metrics(&self) -> Arc<SinkMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Display loop; call on a dedicated thread.
    ///
    /// Runs until the display queue is closed and empty. Once the exit flag
    /// is up every remaining pair is forwarded. Closes the store queue on
    /// the way out.
    #[instrument(
        name = "display_sink",
        skip(self),
        fields(display = %self.display.name())
    )]
    pub fn run(mut self) -> DisplayReport {
        let mut report = DisplayReport::default();
        let mut stats = CaptureStatsAggregator::new();

        info!(recording = self.recording, "display sink started");

        while let Some(pair) = self.input.wait_pop() {
            report.received += 1;
            self.metrics.inc_received();
            let draining = self.exit.is_raised();
            let sequence = pair.trigger().sequence;

            let started = Instant::now();
            let converted = match self.converter.convert_pair(pair) {
                Ok(converted) => converted,
                Err(e) => {
                    report.conversion_failed += 1;
                    self.metrics.inc_dropped();
                    error!(sequence, error = %e, "conversion failed, pair dropped");
                    continue;
                }
            };
            stats.update(
                converted.trigger(),
                converted.len(),
                started.elapsed().as_secs_f64() * 1000.0,
            );

            match self.display.render(&converted) {
                Ok(()) => {
                    report.rendered += 1;
                    self.metrics.inc_succeeded();
                    observability::record_pair_rendered(self.display.name(), true);
                }
                Err(e) => {
                    report.render_failed += 1;
                    self.metrics.inc_failed();
                    observability::record_pair_rendered(self.display.name(), false);
                    warn!(sequence, error = %e, "render failed");
                }
            }

            let forward = if draining {
                true
            } else {
                match self.display.poll_key() {
                    Some(OperatorKey::Exit) => {
                        report.exit_requested = true;
                        if self.exit.raise() {
                            info!(sequence, "operator exit, draining");
                        }
                        true
                    }
                    Some(OperatorKey::StartSaving) => {
                        if !self.recording {
                            info!(sequence, "operator started saving");
                        }
                        self.recording = true;
                        true
                    }
                    None => self.recording,
                }
            };

            if forward {
                self.forward(converted, &mut report);
            } else {
                report.not_forwarded += 1;
            }
        }

        self.output.close();
        report.summary = stats.summary();

        info!(
            received = report.received,
            rendered = report.rendered,
            forwarded = report.forwarded,
            forward_lost = report.forward_lost,
            "display sink stopped"
        );
        report
    }

    fn forward(&mut self, mut pair: ConvertedFramePair, report: &mut DisplayReport) {
        if pair.image_number().is_none() {
            self.image_number += 1;
            pair.set_image_number(self.image_number);
        }

        match self.output.push(pair) {
            Ok(PushOutcome::Enqueued) => report.forwarded += 1,
            Ok(PushOutcome::Displaced(old)) => {
                report.forwarded += 1;
                report.forward_lost += 1;
                warn!(dropped = old.trigger().sequence, "store queue full, oldest pair dropped");
            }
            Err(QueueError::Full(pair)) => {
                report.forward_lost += 1;
                warn!(dropped = pair.trigger().sequence, "store queue full, pair dropped");
            }
            Err(QueueError::Closed(pair)) => {
                report.forward_lost += 1;
                debug!(dropped = pair.trigger().sequence, "store queue closed");
            }
        }
    }
}
