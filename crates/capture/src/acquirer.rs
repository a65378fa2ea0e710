//! FrameAcquirer - trigger-to-pair correlation
//!
//! For every trigger event, retrieves one buffer per active sensor, maps it
//! to its slot through the startup [`SlotMap`], copies it out of the driver
//! buffer and assembles a [`FramePair`] stamped with the trigger's host time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use contracts::{
    BayerImage, CameraDriver, CaptureBlueprint, DriverError, FailurePolicy, Frame, FrameImage,
    FrameMeta, FramePair, GrabResult, SensorSettings, Slot, TriggerEvent, TriggerMode,
};
use handoff::{BoundedQueue, ExitFlag, PushOutcome, QueueError};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::{AcquisitionError, Severity};
use crate::slot_map::SlotMap;

/// Idle wait granularity while listening for an external line trigger
const LINE_IDLE_SLICE: Duration = Duration::from_millis(100);

/// Acquirer parameters
#[derive(Debug, Clone)]
pub struct AcquirerConfig {
    pub trigger_mode: TriggerMode,
    /// Per-buffer retrieval deadline
    pub retrieve_timeout: Duration,
    pub failure_policy: FailurePolicy,
    /// Consecutive skipped ticks that become fatal; 0 = unlimited
    pub max_consecutive_failures: u32,
    /// Metadata defaults when the driver reports no chunk values
    pub sensor: SensorSettings,
}

impl AcquirerConfig {
    pub fn from_blueprint(blueprint: &CaptureBlueprint) -> Self {
        Self {
            trigger_mode: blueprint.capture.trigger_mode,
            retrieve_timeout: blueprint.capture.retrieve_timeout(),
            failure_policy: blueprint.capture.failure_policy,
            max_consecutive_failures: blueprint.capture.max_consecutive_failures,
            sensor: blueprint.sensor.clone(),
        }
    }
}

/// Outcome of an acquirer run
#[derive(Debug, Default)]
pub struct AcquirerReport {
    /// Pairs assembled and published
    pub pairs: u64,
    /// Ticks dropped by a retryable failure
    pub skipped: u64,
    /// Pairs lost to a full display queue
    pub displaced: u64,
    /// Buffers discarded because they belonged to an earlier capture
    pub stale: u64,
    /// Triggers still queued when the acquirer stopped early
    pub abandoned: u64,
    /// Most recent retryable failure
    pub last_error: Option<String>,
    /// Error that terminated the acquirer, if any
    pub fatal: Option<AcquisitionError>,
}

impl AcquirerReport {
    /// Software triggers taken off the trigger queue, whatever their outcome
    pub fn triggers_consumed(&self) -> u64 {
        let fatal_tick = match &self.fatal {
            // the limit's last tick is already in `skipped`
            Some(AcquisitionError::FailureLimit { .. }) | None => 0,
            Some(_) => 1,
        };
        self.pairs + self.skipped + self.abandoned + fatal_tick
    }
}

/// Trigger consumer and pair producer
pub struct FrameAcquirer {
    driver: Arc<dyn CameraDriver>,
    slots: Arc<SlotMap>,
    triggers: Arc<BoundedQueue<TriggerEvent>>,
    output: Arc<BoundedQueue<FramePair>>,
    exit: ExitFlag,
    config: AcquirerConfig,
    /// Sequence source for line-triggered captures
    next_line_sequence: u64,
    /// Lowest capture index still eligible for a pair
    next_frame_id: u64,
    /// Per-slot buffers that belong to a later capture
    held: [Option<GrabResult>; 2],
    stale: u64,
}

impl FrameAcquirer {
    pub fn new(
        driver: Arc<dyn CameraDriver>,
        slots: Arc<SlotMap>,
        triggers: Arc<BoundedQueue<TriggerEvent>>,
        output: Arc<BoundedQueue<FramePair>>,
        exit: ExitFlag,
        config: AcquirerConfig,
    ) -> Self {
        Self {
            driver,
            slots,
            triggers,
            output,
            exit,
            config,
            next_line_sequence: 0,
            next_frame_id: 0,
            held: [None, None],
            stale: 0,
        }
    }

    /// Acquisition loop; call on a dedicated thread.
    ///
    /// In software mode the trigger queue is drained until the scheduler
    /// closes it; in line mode the exit flag stops the loop. A closed display
    /// queue or a fatal error stops it early, and any triggers left queued
    /// are counted as abandoned. Always closes both queues on the way out; a
    /// fatal error also raises the exit flag so the other stages wind down.
    #[instrument(
        name = "frame_acquirer",
        skip(self),
        fields(sensors = self.slots.len(), mode = ?self.config.trigger_mode)
    )]
    pub fn run(mut self) -> AcquirerReport {
        let mut report = AcquirerReport::default();
        let mut consecutive: u32 = 0;

        info!(policy = ?self.config.failure_policy, "frame acquirer started");

        loop {
            let trigger = match self.config.trigger_mode {
                TriggerMode::Software => match self.triggers.wait_pop() {
                    Some(trigger) => Some(trigger),
                    None => {
                        debug!("trigger queue closed");
                        break;
                    }
                },
                TriggerMode::ExternalLine => None,
            };

            let started = Instant::now();
            match self.acquire(trigger) {
                Ok(None) => break,
                Ok(Some(pair)) => {
                    consecutive = 0;
                    report.pairs += 1;
                    observability::record_pair_acquired(
                        pair.len(),
                        started.elapsed().as_secs_f64() * 1000.0,
                    );
                    trace!(sequence = pair.trigger().sequence, "pair acquired");

                    match self.output.push(pair) {
                        Ok(PushOutcome::Enqueued) => {}
                        Ok(PushOutcome::Displaced(old)) => {
                            report.displaced += 1;
                            warn!(dropped = old.trigger().sequence, "display queue full, oldest pair dropped");
                        }
                        Err(QueueError::Full(pair)) => {
                            report.displaced += 1;
                            warn!(dropped = pair.trigger().sequence, "display queue full, pair dropped");
                        }
                        Err(QueueError::Closed(_)) => {
                            debug!("display queue closed");
                            break;
                        }
                    }
                }
                Err(e) => {
                    let severity = e.severity(self.config.failure_policy);
                    observability::record_acquisition_failure(e.kind(), severity == Severity::Fatal);

                    if severity == Severity::Fatal {
                        error!(error = %e, "acquisition failed, acquirer stopping");
                        report.fatal = Some(e);
                        break;
                    }

                    consecutive += 1;
                    report.skipped += 1;
                    warn!(error = %e, consecutive, "acquisition failed, tick skipped");

                    let limit = self.config.max_consecutive_failures;
                    if limit > 0 && consecutive >= limit {
                        let fatal = AcquisitionError::FailureLimit {
                            count: consecutive,
                            last: Box::new(e),
                        };
                        error!(error = %fatal, "failure limit reached, acquirer stopping");
                        report.fatal = Some(fatal);
                        break;
                    }
                    report.last_error = Some(e.to_string());
                }
            }
        }

        self.triggers.close();
        self.output.close();
        if report.fatal.is_some() {
            self.exit.raise();
        }

        while let Some(trigger) = self.triggers.try_pop() {
            report.abandoned += 1;
            trace!(sequence = trigger.sequence, "trigger abandoned");
        }
        if report.abandoned > 0 {
            warn!(abandoned = report.abandoned, "queued triggers abandoned");
        }
        report.stale = self.stale;

        info!(
            pairs = report.pairs,
            skipped = report.skipped,
            displaced = report.displaced,
            stale = report.stale,
            abandoned = report.abandoned,
            fatal = report.fatal.is_some(),
            "frame acquirer stopped"
        );
        report
    }

    /// Turn one trigger into one pair.
    ///
    /// `None` trigger means line-trigger mode: the host time is stamped when
    /// the first buffer arrives. Returns `Ok(None)` if the exit flag was
    /// raised while idle.
    fn acquire(
        &mut self,
        trigger: Option<TriggerEvent>,
    ) -> Result<Option<FramePair>, AcquisitionError> {
        let (trigger, first) = match trigger {
            Some(trigger) => (trigger, None),
            None => match self.wait_line_trigger()? {
                Some(grab) => {
                    let trigger = TriggerEvent::new(self.next_line_sequence, Utc::now());
                    self.next_line_sequence += 1;
                    (trigger, Some(grab))
                }
                None => return Ok(None),
            },
        };

        let capture = match &first {
            Some(grab) => grab.frame_id,
            None => Some(trigger.sequence),
        };
        let result = self.collect(&trigger, capture, first);
        // whatever happened, older buffers no longer belong to any pair
        if let Some(capture) = capture {
            self.next_frame_id = self.next_frame_id.max(capture + 1);
        }
        let [primary, secondary] = result?;

        let primary = primary.ok_or(AcquisitionError::Timeout {
            sequence: trigger.sequence,
            waited_ms: 0,
            missing: vec![Slot::Primary],
        })?;
        FramePair::new(trigger, primary, secondary)
            .map(Some)
            .map_err(AcquisitionError::Pairing)
    }

    /// Gather one buffer per active slot for `capture`.
    ///
    /// Buffers from earlier captures are discarded; a buffer from a later
    /// capture is held for its own tick and its slot counts as missing here.
    /// The deadline restarts after every accepted buffer.
    fn collect(
        &mut self,
        trigger: &TriggerEvent,
        capture: Option<u64>,
        first: Option<GrabResult>,
    ) -> Result<[Option<Frame>; 2], AcquisitionError> {
        let active = &Slot::ALL[..self.slots.len()];
        let mut frames: [Option<Frame>; 2] = [None, None];
        let mut answered = [false; 2];
        let mut ahead = [false; 2];
        let mut incomplete: Option<AcquisitionError> = None;

        let mut queued: Vec<GrabResult> = first.into_iter().collect();
        for slot in active {
            queued.extend(self.held[slot.index()].take());
        }

        let timeout = self.config.retrieve_timeout;
        let mut deadline = Instant::now() + timeout;
        while active
            .iter()
            .any(|s| !answered[s.index()] && !ahead[s.index()])
        {
            let grab = match queued.pop() {
                Some(grab) => grab,
                None => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match self.driver.retrieve_next(remaining) {
                        Ok(grab) => grab,
                        Err(DriverError::Timeout { .. }) => {
                            return Err(AcquisitionError::Timeout {
                                sequence: trigger.sequence,
                                waited_ms: timeout.as_millis() as u64,
                                missing: missing(active, &answered),
                            });
                        }
                        Err(e) => return Err(AcquisitionError::Device(e)),
                    }
                }
            };

            let slot = self
                .slots
                .slot_for_context(grab.camera_context)
                .ok_or(AcquisitionError::UnknownContext {
                    context: grab.camera_context,
                })?;

            if let (Some(id), Some(capture)) = (grab.frame_id, capture) {
                if id < capture {
                    self.discard(&grab);
                    continue;
                }
                if id > capture {
                    trace!(%slot, frame_id = id, capture, "buffer held for a later capture");
                    ahead[slot.index()] = true;
                    if let Some(older) = self.held[slot.index()].replace(grab) {
                        self.discard(&older);
                    }
                    continue;
                }
            }

            if answered[slot.index()] {
                return Err(AcquisitionError::DuplicateSlot {
                    sequence: trigger.sequence,
                    slot,
                });
            }
            answered[slot.index()] = true;
            deadline = Instant::now() + timeout;

            // keep consuming the other slots so their buffers do not go stale
            match self.build_frame(slot, trigger, grab) {
                Ok(frame) => frames[slot.index()] = Some(frame),
                Err(e) => {
                    incomplete.get_or_insert(e);
                }
            }
        }

        if let Some(e) = incomplete {
            return Err(e);
        }
        if active.iter().any(|s| !answered[s.index()]) {
            return Err(AcquisitionError::Timeout {
                sequence: trigger.sequence,
                waited_ms: 0,
                missing: missing(active, &answered),
            });
        }
        Ok(frames)
    }

    fn discard(&mut self, grab: &GrabResult) {
        self.stale += 1;
        observability::record_stale_buffer();
        debug!(
            context = grab.camera_context,
            frame_id = ?grab.frame_id,
            "stale buffer discarded"
        );
    }

    /// Wait for the first buffer of a line-triggered capture
    fn wait_line_trigger(&mut self) -> Result<Option<GrabResult>, AcquisitionError> {
        let earliest = (0..self.held.len())
            .filter(|&i| self.held[i].is_some())
            .min_by_key(|&i| self.held[i].as_ref().and_then(|g| g.frame_id));
        if let Some(grab) = earliest.and_then(|i| self.held[i].take()) {
            return Ok(Some(grab));
        }

        let slice = self.config.retrieve_timeout.min(LINE_IDLE_SLICE);
        loop {
            if self.exit.is_raised() {
                return Ok(None);
            }
            match self.driver.retrieve_next(slice) {
                Ok(grab) => match grab.frame_id {
                    Some(id) if id < self.next_frame_id => self.discard(&grab),
                    _ => return Ok(Some(grab)),
                },
                Err(DriverError::Timeout { .. }) => continue,
                Err(e) => return Err(AcquisitionError::Device(e)),
            }
        }
    }

    /// Copy a grab result out of the driver buffer and attach metadata
    fn build_frame(
        &self,
        slot: Slot,
        trigger: &TriggerEvent,
        grab: GrabResult,
    ) -> Result<Frame, AcquisitionError> {
        let device = self
            .slots
            .device(slot)
            .ok_or(AcquisitionError::UnknownContext {
                context: grab.camera_context,
            })?;

        if !grab.success {
            return Err(AcquisitionError::IncompleteFrame {
                sequence: trigger.sequence,
                slot,
                serial: device.serial.clone(),
                code: grab.error_code,
                description: grab
                    .error_description
                    .unwrap_or_else(|| "buffer marked incomplete".into()),
            });
        }

        let raw = BayerImage::new(
            grab.width,
            grab.height,
            self.config.sensor.bayer_pattern,
            Bytes::copy_from_slice(&grab.buffer),
        )
        .map_err(|e| AcquisitionError::IncompleteFrame {
            sequence: trigger.sequence,
            slot,
            serial: device.serial.clone(),
            code: None,
            description: e.to_string(),
        })?;

        let meta = FrameMeta {
            slot,
            serial: device.serial.clone(),
            sequence: trigger.sequence,
            host_time: trigger.fired_at,
            device_time: grab.device_timestamp,
            exposure_us: grab.exposure_us.unwrap_or(self.config.sensor.exposure_us),
            gain: grab.gain.unwrap_or(self.config.sensor.gain),
            white_balance: device.white_balance,
            auto_exposure: self.config.sensor.auto_exposure,
            auto_gain: self.config.sensor.auto_gain,
            image_number: None,
        };
        Ok(Frame::new(meta, FrameImage::Raw(raw)))
    }
}

/// Active slots that have not answered yet
fn missing(active: &[Slot], answered: &[bool; 2]) -> Vec<Slot> {
    active
        .iter()
        .copied()
        .filter(|s| !answered[s.index()])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ArrivalOrder, MockBehavior, MockCameraConfig, MockCameraDriver};
    use contracts::{ActionTrigger, GroupKey, OverflowPolicy, QueueConfig};
    use std::thread;

    struct Harness {
        driver: MockCameraDriver,
        triggers: Arc<BoundedQueue<TriggerEvent>>,
        output: Arc<BoundedQueue<FramePair>>,
        exit: ExitFlag,
        acquirer: FrameAcquirer,
    }

    fn harness(
        mock: MockCameraConfig,
        sensor_count: usize,
        mode: TriggerMode,
        policy: FailurePolicy,
        max_failures: u32,
    ) -> Harness {
        harness_with_timeout(
            mock,
            sensor_count,
            mode,
            policy,
            max_failures,
            Duration::from_millis(50),
        )
    }

    fn harness_with_timeout(
        mock: MockCameraConfig,
        sensor_count: usize,
        mode: TriggerMode,
        policy: FailurePolicy,
        max_failures: u32,
        retrieve_timeout: Duration,
    ) -> Harness {
        let driver = MockCameraDriver::new(mock);
        driver.open().unwrap();
        driver.start_streaming().unwrap();
        let slots = Arc::new(SlotMap::from_devices(driver.devices().unwrap(), sensor_count).unwrap());
        let triggers = Arc::new(BoundedQueue::new(
            "trigger",
            QueueConfig::new(16, OverflowPolicy::Block),
        ));
        let output = Arc::new(BoundedQueue::new(
            "display",
            QueueConfig::new(16, OverflowPolicy::Block),
        ));
        let exit = ExitFlag::new();
        let acquirer = FrameAcquirer::new(
            Arc::new(driver.clone()),
            slots,
            Arc::clone(&triggers),
            Arc::clone(&output),
            exit.clone(),
            AcquirerConfig {
                trigger_mode: mode,
                retrieve_timeout,
                failure_policy: policy,
                max_consecutive_failures: max_failures,
                sensor: SensorSettings {
                    width: 8,
                    height: 8,
                    ..SensorSettings::default()
                },
            },
        );
        Harness {
            driver,
            triggers,
            output,
            exit,
            acquirer,
        }
    }

    /// Issue `n` captures and queue their trigger events, then close the queue
    fn fire(h: &Harness, n: u64) {
        for seq in 0..n {
            h.driver.issue_simultaneous_capture(GroupKey::default()).unwrap();
            h.triggers.push(TriggerEvent::new(seq, Utc::now())).unwrap();
        }
        h.triggers.close();
    }

    fn drain(queue: &BoundedQueue<FramePair>) -> Vec<FramePair> {
        std::iter::from_fn(|| queue.try_pop()).collect()
    }

    fn raw_bytes(frame: &Frame) -> Bytes {
        match &frame.image {
            FrameImage::Raw(raw) => raw.data.clone(),
            other => panic!("expected raw frame, got {other:?}"),
        }
    }

    #[test]
    fn test_pairs_follow_serial_order_not_arrival() {
        let h = harness(
            MockCameraConfig::pair(8, 8).with_arrival(ArrivalOrder::Reversed),
            2,
            TriggerMode::Software,
            FailurePolicy::Abort,
            0,
        );
        fire(&h, 3);
        let report = h.acquirer.run();
        assert_eq!(report.pairs, 3);
        assert!(report.fatal.is_none());
        assert!(h.output.is_closed());

        let pairs = drain(&h.output);
        assert_eq!(pairs.len(), 3);
        for (seq, pair) in pairs.iter().enumerate() {
            assert_eq!(pair.trigger().sequence, seq as u64);
            assert_eq!(pair.primary().meta.serial, "22954321");
            let secondary = pair.secondary().unwrap();
            assert_eq!(secondary.meta.serial, "40012345");
            assert_eq!(pair.primary().meta.host_time, pair.trigger().fired_at);
            assert_eq!(secondary.meta.host_time, pair.trigger().fired_at);
            assert!(pair.primary().meta.device_time.is_some());
        }
    }

    #[test]
    fn test_single_sensor_leaves_secondary_absent() {
        let h = harness(
            MockCameraConfig::single(8, 8),
            1,
            TriggerMode::Software,
            FailurePolicy::Abort,
            0,
        );
        fire(&h, 2);
        let report = h.acquirer.run();
        assert_eq!(report.pairs, 2);
        assert!(drain(&h.output).iter().all(|p| p.secondary().is_none()));
    }

    #[test]
    fn test_abort_policy_timeout_is_fatal() {
        let h = harness(
            MockCameraConfig::pair(8, 8).with_behavior(0, MockBehavior::Silent),
            2,
            TriggerMode::Software,
            FailurePolicy::Abort,
            0,
        );
        fire(&h, 3);
        let exit = h.exit.clone();
        let report = h.acquirer.run();

        assert_eq!(report.pairs, 0);
        match report.fatal {
            Some(AcquisitionError::Timeout { sequence, ref missing, .. }) => {
                assert_eq!(sequence, 0);
                assert_eq!(missing, &vec![Slot::Secondary]);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(exit.is_raised());
        assert!(h.output.is_closed());
        assert!(h.output.empty());
        assert_eq!(report.abandoned, 2);
        assert_eq!(h.triggers.metrics().in_flight(), 0);
        assert_eq!(report.triggers_consumed(), 3);
    }

    #[test]
    fn test_exit_flag_still_drains_queued_triggers() {
        let h = harness(
            MockCameraConfig::pair(8, 8),
            2,
            TriggerMode::Software,
            FailurePolicy::Abort,
            0,
        );
        fire(&h, 3);
        h.exit.raise();
        let report = h.acquirer.run();

        assert_eq!(report.pairs, 3);
        assert_eq!(report.abandoned, 0);
        assert_eq!(h.triggers.metrics().in_flight(), 0);
        assert_eq!(drain(&h.output).len(), 3);
    }

    #[test]
    fn test_late_buffers_never_pair_with_next_trigger() {
        // buffers arrive after the retrieval deadline of their own trigger
        let h = harness_with_timeout(
            MockCameraConfig::pair(8, 8).with_latency(Duration::from_millis(60)),
            2,
            TriggerMode::Software,
            FailurePolicy::Skip,
            0,
            Duration::from_millis(30),
        );
        let driver = h.driver.clone();
        let triggers = Arc::clone(&h.triggers);
        let acquirer = h.acquirer;
        let handle = thread::spawn(move || acquirer.run());

        // trigger 0 is consumed at once and times out
        driver.issue_simultaneous_capture(GroupKey::default()).unwrap();
        triggers.push(TriggerEvent::new(0, Utc::now())).unwrap();
        thread::sleep(Duration::from_millis(150));

        // trigger 1 is consumed late enough for its own buffers to arrive
        driver.issue_simultaneous_capture(GroupKey::default()).unwrap();
        let fired_at = Utc::now();
        thread::sleep(Duration::from_millis(45));
        triggers.push(TriggerEvent::new(1, fired_at)).unwrap();
        triggers.close();

        let report = handle.join().unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.pairs, 1);
        assert_eq!(report.stale, 2);

        let pairs = drain(&h.output);
        assert_eq!(pairs.len(), 1);
        let pair = &pairs[0];
        assert_eq!(pair.trigger().sequence, 1);
        // primary is enumeration index 1, secondary index 0
        assert_eq!(
            raw_bytes(pair.primary()),
            MockCameraDriver::pattern_bytes(8, 8, 1, 1)
        );
        assert_eq!(
            raw_bytes(pair.secondary().unwrap()),
            MockCameraDriver::pattern_bytes(8, 8, 0, 1)
        );
    }

    #[test]
    fn test_buffers_of_dropped_triggers_are_discarded() {
        let h = harness(
            MockCameraConfig::pair(8, 8),
            2,
            TriggerMode::Software,
            FailurePolicy::Abort,
            0,
        );
        // captures 0 and 1 happen but only trigger 1 reaches the acquirer
        h.driver.issue_simultaneous_capture(GroupKey::default()).unwrap();
        h.driver.issue_simultaneous_capture(GroupKey::default()).unwrap();
        thread::sleep(Duration::from_millis(20));
        h.triggers.push(TriggerEvent::new(1, Utc::now())).unwrap();
        h.triggers.close();

        let report = h.acquirer.run();
        assert_eq!(report.pairs, 1);
        assert_eq!(report.stale, 2);
        let pairs = drain(&h.output);
        assert_eq!(
            raw_bytes(pairs[0].primary()),
            MockCameraDriver::pattern_bytes(8, 8, 1, 1)
        );
    }

    #[test]
    fn test_skip_policy_continues_past_timeouts() {
        let h = harness(
            MockCameraConfig::pair(8, 8).with_behavior(0, MockBehavior::Silent),
            2,
            TriggerMode::Software,
            FailurePolicy::Skip,
            0,
        );
        fire(&h, 3);
        let report = h.acquirer.run();
        assert_eq!(report.pairs, 0);
        assert_eq!(report.skipped, 3);
        assert!(report.fatal.is_none());
        assert!(report.last_error.is_some());
        assert!(!h.exit.is_raised());
    }

    #[test]
    fn test_incomplete_frame_skipped() {
        let h = harness(
            MockCameraConfig::pair(8, 8).with_behavior(0, MockBehavior::IncompleteOn(1)),
            2,
            TriggerMode::Software,
            FailurePolicy::Skip,
            0,
        );
        fire(&h, 3);
        let report = h.acquirer.run();
        assert_eq!(report.pairs, 2);
        assert_eq!(report.skipped, 1);
        let sequences: Vec<_> = drain(&h.output).iter().map(|p| p.trigger().sequence).collect();
        assert_eq!(sequences, vec![0, 2]);
    }

    #[test]
    fn test_consecutive_failure_limit() {
        let h = harness(
            MockCameraConfig::pair(8, 8).with_behavior(1, MockBehavior::Silent),
            2,
            TriggerMode::Software,
            FailurePolicy::Skip,
            2,
        );
        fire(&h, 5);
        let report = h.acquirer.run();
        assert_eq!(report.skipped, 2);
        assert!(matches!(
            report.fatal,
            Some(AcquisitionError::FailureLimit { count: 2, .. })
        ));
    }

    #[test]
    fn test_line_trigger_stamps_at_receipt() {
        let h = harness(
            MockCameraConfig::pair(8, 8).with_line_trigger(Duration::from_millis(10)),
            2,
            TriggerMode::ExternalLine,
            FailurePolicy::Skip,
            0,
        );
        let exit = h.exit.clone();
        let output = Arc::clone(&h.output);
        let acquirer = h.acquirer;
        let handle = thread::spawn(move || acquirer.run());
        thread::sleep(Duration::from_millis(80));
        exit.raise();
        let report = handle.join().unwrap();
        h.driver.stop_streaming().unwrap();

        assert!(report.pairs >= 2, "pairs {}", report.pairs);
        let pairs = drain(&output);
        for (seq, pair) in pairs.iter().enumerate() {
            assert_eq!(pair.trigger().sequence, seq as u64);
            assert!(pair.secondary().is_some());
        }
    }
}
