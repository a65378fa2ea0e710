//! # Integration Tests
//!
//! End-to-end runs of the four stages against the mock camera driver.
//! Stages are wired by hand here, so these tests exercise the stage
//! contracts (close cascade, drain accounting, numbering) without the CLI.

#[cfg(test)]
mod harness {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;

    use capture::{
        AcquirerConfig, AcquirerReport, FrameAcquirer, MockCameraDriver, SchedulerConfig,
        SchedulerReport, SlotMap, TriggerScheduler,
    };
    use contracts::{
        CameraDriver, CaptureBlueprint, ContractError, ConvertedFramePair, FrameDisplay,
        FramePair, FrameStore, SerialNumber, Slot, TriggerEvent,
    };
    use conversion::{CalibrationSet, ConversionStage};
    use handoff::{BoundedQueue, ExitFlag, QueueMetricsSnapshot};
    use sinks::{DisplayReport, DisplaySink, StoreReport, StoreSink};

    pub fn blueprint(rate: f64, sensors: u8) -> CaptureBlueprint {
        let toml = format!(
            r#"
            [capture]
            frame_rate_hz = {rate}
            sensor_count = {sensors}
            retrieve_timeout_ms = 300

            [sensor]
            width = 16
            height = 12

            [calibration]
            directory = "/nonexistent/calibration"

            [store]
            start_saving = true
            "#
        );
        config_loader::ConfigLoader::load_from_str(&toml, config_loader::ConfigFormat::Toml)
            .unwrap()
    }

    /// Open the driver and assign slots, as the orchestrator does at startup
    pub fn open(driver: &MockCameraDriver, blueprint: &CaptureBlueprint) -> SlotMap {
        driver.open().unwrap();
        SlotMap::from_devices(
            driver.devices().unwrap(),
            usize::from(blueprint.capture.sensor_count),
        )
        .unwrap()
    }

    pub fn identity(slots: &SlotMap, blueprint: &CaptureBlueprint) -> CalibrationSet {
        CalibrationSet::identity(
            slots.len(),
            blueprint.sensor.width,
            blueprint.sensor.height,
            blueprint.calibration.interpolation,
        )
    }

    /// What the store saw of one pair
    #[derive(Debug, Clone)]
    pub struct Saved {
        pub sequence: u64,
        pub image_number: Option<u64>,
        pub slots: Vec<Slot>,
        pub serials: Vec<SerialNumber>,
    }

    /// Store that keeps a record of every saved pair
    #[derive(Clone, Default)]
    pub struct RecordingStore {
        pub saved: Arc<Mutex<Vec<Saved>>>,
        pub closed: Arc<AtomicBool>,
    }

    impl RecordingStore {
        pub fn saved(&self) -> Vec<Saved> {
            self.saved.lock().unwrap().clone()
        }
    }

    impl FrameStore for RecordingStore {
        fn name(&self) -> &str {
            "recording"
        }

        fn save(&mut self, pair: &ConvertedFramePair) -> Result<(), ContractError> {
            self.saved.lock().unwrap().push(Saved {
                sequence: pair.trigger().sequence,
                image_number: pair.image_number(),
                slots: pair.frames().map(|f| f.meta.slot).collect(),
                serials: pair.frames().map(|f| f.meta.serial.clone()).collect(),
            });
            Ok(())
        }

        fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        fn close(&mut self) -> Result<(), ContractError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    pub struct Outcome {
        pub scheduler: SchedulerReport,
        pub acquirer: AcquirerReport,
        pub display: DisplayReport,
        pub store: StoreReport,
        pub trigger_queue: QueueMetricsSnapshot,
        pub display_queue: QueueMetricsSnapshot,
        pub store_queue: QueueMetricsSnapshot,
    }

    impl Outcome {
        /// Every issued trigger was taken off the queue and accounted for
        pub fn trigger_balanced(&self) -> bool {
            self.trigger_queue.in_flight() == 0
                && self.trigger_queue.popped == self.acquirer.triggers_consumed()
        }

        /// Every acquired pair was received, displaced or is still queued
        pub fn display_balanced(&self) -> bool {
            self.acquirer.pairs
                == self.display.received + self.acquirer.displaced + self.display_queue.in_flight()
        }

        /// Every popped pair was stored, skipped or failed
        pub fn store_balanced(&self) -> bool {
            self.store.stored + self.store.skipped + self.store.failed == self.store.received
                && self.store.received == self.store_queue.popped
        }
    }

    /// Run all four stages until the store stops.
    ///
    /// The driver must already be open; it is stopped and closed on return.
    pub fn run(
        driver: &MockCameraDriver,
        blueprint: &CaptureBlueprint,
        slots: SlotMap,
        calibration: CalibrationSet,
        display: Box<dyn FrameDisplay>,
        store: Box<dyn FrameStore>,
        max_triggers: Option<u64>,
    ) -> Outcome {
        let exit = ExitFlag::new();
        let queues = &blueprint.queues;
        let trigger_queue = Arc::new(BoundedQueue::<TriggerEvent>::new("trigger", queues.trigger));
        let display_queue = Arc::new(BoundedQueue::<FramePair>::new("display", queues.display));
        let store_queue = Arc::new(BoundedQueue::<ConvertedFramePair>::new("store", queues.store));

        let shared: Arc<MockCameraDriver> = Arc::new(driver.clone());
        shared.start_streaming().unwrap();

        let store_sink = StoreSink::new(store, Arc::clone(&store_queue))
            .with_enabled(blueprint.store.enabled);
        let display_sink = DisplaySink::new(
            display,
            ConversionStage::new(Arc::new(calibration)),
            Arc::clone(&display_queue),
            Arc::clone(&store_queue),
            exit.clone(),
        )
        .with_recording(blueprint.store.start_saving);
        let acquirer = FrameAcquirer::new(
            shared.clone(),
            Arc::new(slots),
            Arc::clone(&trigger_queue),
            Arc::clone(&display_queue),
            exit.clone(),
            AcquirerConfig::from_blueprint(blueprint),
        );
        let mut scheduler_config = SchedulerConfig::from_capture(&blueprint.capture);
        if let Some(max) = max_triggers {
            scheduler_config = scheduler_config.with_max_triggers(max);
        }
        let scheduler = TriggerScheduler::new(
            shared.clone(),
            Arc::clone(&trigger_queue),
            exit.clone(),
            scheduler_config,
        );

        let store_handle = thread::spawn(move || store_sink.run());
        let display_handle = thread::spawn(move || display_sink.run());
        let acquire_handle = thread::spawn(move || acquirer.run());
        let scheduler_handle = thread::spawn(move || scheduler.run());

        let store = store_handle.join().unwrap();
        exit.raise();
        let outcome = Outcome {
            scheduler: scheduler_handle.join().unwrap(),
            acquirer: acquire_handle.join().unwrap(),
            display: display_handle.join().unwrap(),
            store,
            trigger_queue: trigger_queue.metrics(),
            display_queue: display_queue.metrics(),
            store_queue: store_queue.metrics(),
        };

        shared.stop_streaming().unwrap();
        shared.close().unwrap();
        outcome
    }
}

#[cfg(test)]
mod contract_tests {
    use contracts::{CaptureBlueprint, FailurePolicy, OverflowPolicy, TriggerMode};

    #[test]
    fn test_minimal_config_defaults() {
        let blueprint: CaptureBlueprint = config_loader::ConfigLoader::load_from_str(
            r#"
            [capture]
            frame_rate_hz = 4.0

            [calibration]
            directory = "calib"
            "#,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        assert_eq!(blueprint.capture.sensor_count, 2);
        assert_eq!(blueprint.capture.trigger_mode, TriggerMode::Software);
        assert_eq!(blueprint.capture.failure_policy, FailurePolicy::Skip);
        assert_eq!(blueprint.queues.display.overflow, OverflowPolicy::Block);
        assert!(blueprint.store.enabled);
        assert!(!blueprint.store.start_saving);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::thread;
    use std::time::Duration;

    use capture::{AcquisitionError, MockBehavior, MockCameraConfig, MockCameraDriver};
    use contracts::{ContractError, FailurePolicy, Slot, StoreFormat};
    use conversion::{CalibrationMaps, CalibrationSet};
    use sinks::{FileStore, InterruptSignal, LogDisplay};

    use crate::harness::{self, RecordingStore};

    /// 4 Hz for ten triggers: ordered, numbered, evenly spaced, fully drained
    #[test]
    fn test_fixed_rate_pairs_in_order() {
        let blueprint = harness::blueprint(4.0, 2);
        let driver = MockCameraDriver::new(MockCameraConfig::pair(16, 12));
        let slots = harness::open(&driver, &blueprint);
        let calibration = harness::identity(&slots, &blueprint);
        let store = RecordingStore::default();

        let outcome = harness::run(
            &driver,
            &blueprint,
            slots,
            calibration,
            Box::new(LogDisplay::new("log", InterruptSignal::new())),
            Box::new(store.clone()),
            Some(10),
        );

        assert_eq!(outcome.scheduler.fired, 10);
        assert_eq!(outcome.acquirer.pairs, 10);
        assert_eq!(outcome.display.received, 10);
        assert_eq!(outcome.store.stored, 10);
        assert!(outcome.display_balanced());
        assert!(outcome.store_balanced());
        assert!(store.closed.load(std::sync::atomic::Ordering::SeqCst));

        let saved = store.saved();
        let sequences: Vec<u64> = saved.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, (0..10).collect::<Vec<_>>());
        let numbers: Vec<Option<u64>> = saved.iter().map(|s| s.image_number).collect();
        assert_eq!(numbers, (1..=10).map(Some).collect::<Vec<_>>());

        // slot order is serial order, not enumeration order
        for pair in &saved {
            assert_eq!(pair.slots, [Slot::Primary, Slot::Secondary]);
            assert_eq!(pair.serials[0], "22954321");
            assert_eq!(pair.serials[1], "40012345");
        }

        let summary = &outcome.display.summary;
        assert_eq!(summary.total_pairs, 10);
        assert_eq!(summary.sequence_gaps, 0);
        assert_eq!(summary.interval_ms.count, 9);
        assert!(
            (summary.interval_ms.mean - 250.0).abs() < 25.0,
            "mean interval {} ms",
            summary.interval_ms.mean
        );
    }

    /// A silent secondary under the abort policy stops the run with no pair
    #[test]
    fn test_abort_policy_on_silent_sensor() {
        let mut blueprint = harness::blueprint(10.0, 2);
        blueprint.capture.failure_policy = FailurePolicy::Abort;
        // enumeration index 0 is serial 40012345, the secondary slot
        let driver = MockCameraDriver::new(
            MockCameraConfig::pair(16, 12).with_behavior(0, MockBehavior::Silent),
        );
        let slots = harness::open(&driver, &blueprint);
        let calibration = harness::identity(&slots, &blueprint);
        let store = RecordingStore::default();

        let outcome = harness::run(
            &driver,
            &blueprint,
            slots,
            calibration,
            Box::new(LogDisplay::new("log", InterruptSignal::new())),
            Box::new(store.clone()),
            Some(20),
        );

        match outcome.acquirer.fatal {
            Some(AcquisitionError::Timeout { ref missing, .. }) => {
                assert_eq!(missing, &[Slot::Secondary]);
            }
            ref other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(outcome.acquirer.pairs, 0);
        assert_eq!(outcome.display.received, 0);
        assert!(store.saved().is_empty());
        assert!(outcome.scheduler.fired < 20);
    }

    /// Under the skip policy an incomplete buffer costs one tick only
    #[test]
    fn test_skip_policy_continues_after_incomplete_buffer() {
        let blueprint = harness::blueprint(20.0, 2);
        let driver = MockCameraDriver::new(
            MockCameraConfig::pair(16, 12).with_behavior(0, MockBehavior::IncompleteOn(1)),
        );
        let slots = harness::open(&driver, &blueprint);
        let calibration = harness::identity(&slots, &blueprint);
        let store = RecordingStore::default();

        let outcome = harness::run(
            &driver,
            &blueprint,
            slots,
            calibration,
            Box::new(LogDisplay::new("log", InterruptSignal::new())),
            Box::new(store.clone()),
            Some(5),
        );

        assert!(outcome.acquirer.fatal.is_none());
        assert_eq!(outcome.acquirer.skipped, 1);
        assert_eq!(outcome.acquirer.pairs, 4);
        assert!(outcome.acquirer.last_error.is_some());

        let sequences: Vec<u64> = store.saved().iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, [0, 2, 3, 4]);
        // numbering stays dense across the skipped tick
        let numbers: Vec<Option<u64>> = store.saved().iter().map(|s| s.image_number).collect();
        assert_eq!(numbers, [Some(1), Some(2), Some(3), Some(4)]);
        assert_eq!(outcome.display.summary.sequence_gaps, 1);
    }

    /// Operator exit mid-stream drains every queued pair into the store
    #[test]
    fn test_operator_exit_drains_pipeline() {
        let blueprint = harness::blueprint(20.0, 2);
        let driver = MockCameraDriver::new(MockCameraConfig::pair(16, 12));
        let slots = harness::open(&driver, &blueprint);
        let calibration = harness::identity(&slots, &blueprint);
        let store = RecordingStore::default();
        let signal = InterruptSignal::new();

        let trigger = signal.clone();
        let interrupter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(400));
            trigger.request_exit();
        });

        let outcome = harness::run(
            &driver,
            &blueprint,
            slots,
            calibration,
            Box::new(LogDisplay::new("log", signal.clone())),
            Box::new(store.clone()),
            Some(1000),
        );
        interrupter.join().unwrap();

        assert!(outcome.display.exit_requested);
        assert!(!signal.exit_pending());
        assert!(outcome.scheduler.fired > 0);
        assert!(outcome.scheduler.fired < 1000);
        assert_eq!(outcome.trigger_queue.in_flight(), 0);
        assert_eq!(outcome.acquirer.abandoned, 0);
        assert!(outcome.trigger_balanced());
        assert_eq!(outcome.display_queue.in_flight(), 0);
        assert_eq!(outcome.store_queue.in_flight(), 0);
        assert!(outcome.display_balanced());
        assert!(outcome.store_balanced());
        assert_eq!(outcome.store.stored, outcome.display.forwarded);
        assert_eq!(store.saved().len() as u64, outcome.display.received);
    }

    /// Without the saving switch nothing reaches the store until the operator asks
    #[test]
    fn test_saving_starts_on_operator_request() {
        let mut blueprint = harness::blueprint(20.0, 2);
        blueprint.store.start_saving = false;
        let driver = MockCameraDriver::new(MockCameraConfig::pair(16, 12));
        let slots = harness::open(&driver, &blueprint);
        let calibration = harness::identity(&slots, &blueprint);
        let store = RecordingStore::default();
        let signal = InterruptSignal::new();

        let trigger = signal.clone();
        let operator = thread::spawn(move || {
            thread::sleep(Duration::from_millis(250));
            trigger.request_saving();
        });

        let outcome = harness::run(
            &driver,
            &blueprint,
            slots,
            calibration,
            Box::new(LogDisplay::new("log", signal)),
            Box::new(store.clone()),
            Some(20),
        );
        operator.join().unwrap();

        assert_eq!(outcome.display.received, 20);
        assert!(outcome.display.not_forwarded > 0);
        assert_eq!(
            outcome.display.forwarded + outcome.display.not_forwarded,
            outcome.display.received
        );

        let saved = store.saved();
        assert_eq!(saved.len() as u64, outcome.display.forwarded);
        assert_eq!(saved.first().and_then(|s| s.image_number), Some(1));
        assert_eq!(saved.last().map(|s| s.sequence), Some(19));
    }

    /// A missing calibration file fails before any trigger is issued
    #[test]
    fn test_missing_calibration_fails_at_startup() {
        let blueprint = harness::blueprint(10.0, 2);
        let driver = MockCameraDriver::new(MockCameraConfig::pair(16, 12));
        let slots = harness::open(&driver, &blueprint);

        let err = CalibrationSet::load(&blueprint.calibration, &slots.serials()).unwrap_err();

        assert!(matches!(err, ContractError::CalibrationLoad { .. }));
        assert!(err.to_string().contains("calibration_22954321"));
        assert_eq!(driver.captured(), 0);
    }

    /// One sensor: the secondary is absent from acquisition to storage
    #[test]
    fn test_single_sensor_run() {
        let blueprint = harness::blueprint(20.0, 1);
        let driver = MockCameraDriver::new(MockCameraConfig::single(16, 12));
        let slots = harness::open(&driver, &blueprint);
        let calibration = harness::identity(&slots, &blueprint);
        let store = RecordingStore::default();

        let outcome = harness::run(
            &driver,
            &blueprint,
            slots,
            calibration,
            Box::new(LogDisplay::new("log", InterruptSignal::new())),
            Box::new(store.clone()),
            Some(5),
        );

        assert_eq!(outcome.acquirer.pairs, 5);
        assert_eq!(outcome.display.summary.single_frame_pairs, 5);
        for pair in store.saved() {
            assert_eq!(pair.slots, [Slot::Primary]);
            assert_eq!(pair.serials[0], "22954321");
        }
    }

    /// Calibration maps loaded from disk, pairs written by the file store
    #[test]
    fn test_file_store_run_with_loaded_calibration() {
        let calib_dir = tempfile::tempdir().unwrap();
        let out_dir = tempfile::tempdir().unwrap();

        for serial in ["22954321", "40012345"] {
            let dir = calib_dir.path().join(format!("calibration_{serial}"));
            std::fs::create_dir_all(&dir).unwrap();
            let maps = CalibrationMaps::identity(16, 12);
            maps.map_x().save(&dir.join("map1.bin")).unwrap();
            maps.map_y().save(&dir.join("map2.json")).unwrap();
        }

        let mut blueprint = harness::blueprint(20.0, 2);
        blueprint.calibration.directory = Some(calib_dir.path().to_path_buf());
        let driver = MockCameraDriver::new(MockCameraConfig::pair(16, 12));
        let slots = harness::open(&driver, &blueprint);
        let calibration = CalibrationSet::load(&blueprint.calibration, &slots.serials()).unwrap();
        assert_eq!(calibration.len(), 2);

        let store = FileStore::new("files", out_dir.path(), StoreFormat::Png).unwrap();
        let outcome = harness::run(
            &driver,
            &blueprint,
            slots,
            calibration,
            Box::new(LogDisplay::new("log", InterruptSignal::new())),
            Box::new(store),
            Some(3),
        );

        assert_eq!(outcome.store.stored, 3);
        for number in 1..=3 {
            assert!(out_dir.path().join(format!("22954321/{number}.png")).is_file());
            assert!(out_dir.path().join(format!("40012345/{number}.png")).is_file());
            assert!(out_dir.path().join(format!("meta/{number}.json")).is_file());
        }
        let image = image_dimensions(&out_dir.path().join("22954321/1.png"));
        assert_eq!(image, (16, 12));
    }

    fn image_dimensions(path: &std::path::Path) -> (u32, u32) {
        let bytes = std::fs::read(path).unwrap();
        // PNG IHDR: width and height big-endian at offsets 16 and 20
        let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
        (width, height)
    }
}
