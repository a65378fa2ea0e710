//! Pipeline orchestrator - wires the four stage threads together.
//!
//! ```text
//! trigger ──▶ [trigger queue] ──▶ acquire ──▶ [display queue] ──▶ display ──▶ [store queue] ──▶ store
//! ```
//!
//! Everything that can fail at startup (devices, slot map, calibration,
//! backends) is resolved before the first thread is spawned. Shutdown is a
//! close cascade: each stage closes its output queue when it stops, so the
//! next one drains and stops in turn.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use capture::{AcquirerConfig, FrameAcquirer, SchedulerConfig, SlotMap, TriggerScheduler};
use contracts::{
    ActionTrigger, CameraDriver, CaptureBlueprint, ConvertedFramePair, FrameDisplay, FramePair,
    FrameStore, TriggerEvent, TriggerMode,
};
use conversion::{CalibrationSet, ConversionStage};
use handoff::{BoundedQueue, ExitFlag};
use sinks::{DisplaySink, InterruptSignal, StoreSink};
use tracing::{debug, error, info, instrument, warn};

use super::PipelineStats;
use crate::error::CliError;

/// Supervisor polling interval
const WATCH_INTERVAL: Duration = Duration::from_millis(50);

/// How long an operator interrupt may wait for the display to pick it up
const INTERRUPT_GRACE: Duration = Duration::from_secs(1);

/// Period of the progress log line
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Validated capture configuration
    pub blueprint: CaptureBlueprint,

    /// Maximum number of triggers (None = unlimited)
    pub max_frames: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Use identity maps instead of loading calibration files
    pub identity_calibration: bool,
}

/// Everything resolved before any thread starts
struct Prepared {
    slots: Arc<SlotMap>,
    calibration: Arc<CalibrationSet>,
    display: Box<dyn FrameDisplay>,
    store: Box<dyn FrameStore>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
    driver: Arc<dyn CameraDriver>,
    trigger: Arc<dyn ActionTrigger>,
    exit: ExitFlag,
    interrupt: InterruptSignal,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        driver: Arc<dyn CameraDriver>,
        trigger: Arc<dyn ActionTrigger>,
    ) -> Self {
        Self {
            config,
            driver,
            trigger,
            exit: ExitFlag::new(),
            interrupt: InterruptSignal::new(),
        }
    }

    /// Operator input handle (Ctrl+C handler)
    pub fn interrupt(&self) -> InterruptSignal {
        self.interrupt.clone()
    }

    /// Run the pipeline to completion; blocks the calling thread
    #[instrument(name = "pipeline", skip(self), fields(driver = %self.driver.name()))]
    pub fn run(self) -> Result<PipelineStats, CliError> {
        let started = Instant::now();

        self.driver.open()?;
        let prepared = match self.prepare() {
            Ok(prepared) => prepared,
            Err(e) => {
                error!(error = %e, "startup failed, no stage started");
                self.shutdown_driver();
                return Err(e);
            }
        };

        if let Err(e) = self.driver.start_streaming() {
            self.shutdown_driver();
            return Err(e.into());
        }

        let result = self.run_stages(prepared, started);
        self.shutdown_driver();
        result
    }

    /// Devices, slot map, calibration and backends
    fn prepare(&self) -> Result<Prepared, CliError> {
        let blueprint = &self.config.blueprint;

        let devices = self.driver.devices()?;
        let slots = SlotMap::from_devices(devices, usize::from(blueprint.capture.sensor_count))?;
        for (slot, device) in slots.iter() {
            info!(
                %slot,
                serial = %device.serial,
                model = %device.model,
                address = %device.address,
                "sensor assigned"
            );
        }

        let calibration = if self.config.identity_calibration {
            warn!("using identity calibration maps");
            CalibrationSet::identity(
                slots.len(),
                blueprint.sensor.width,
                blueprint.sensor.height,
                blueprint.calibration.interpolation,
            )
        } else {
            CalibrationSet::load(&blueprint.calibration, &slots.serials())?
        };
        info!(slots = calibration.len(), "calibration loaded");

        let display = sinks::build_display(&blueprint.display, self.interrupt.clone())?;
        let store = sinks::build_store(&blueprint.store)?;

        Ok(Prepared {
            slots: Arc::new(slots),
            calibration: Arc::new(calibration),
            display,
            store,
        })
    }

    fn run_stages(&self, prepared: Prepared, started: Instant) -> Result<PipelineStats, CliError> {
        let blueprint = &self.config.blueprint;
        let queues = &blueprint.queues;
        let line_mode = blueprint.capture.trigger_mode == TriggerMode::ExternalLine;

        let trigger_queue = Arc::new(BoundedQueue::<TriggerEvent>::new("trigger", queues.trigger));
        let display_queue = Arc::new(BoundedQueue::<FramePair>::new("display", queues.display));
        let store_queue = Arc::new(BoundedQueue::<ConvertedFramePair>::new("store", queues.store));

        let store_sink = StoreSink::new(prepared.store, Arc::clone(&store_queue))
            .with_enabled(blueprint.store.enabled);
        let display_sink = DisplaySink::new(
            prepared.display,
            ConversionStage::new(prepared.calibration),
            Arc::clone(&display_queue),
            Arc::clone(&store_queue),
            self.exit.clone(),
        )
        .with_recording(blueprint.store.start_saving);
        let display_metrics = display_sink.metrics();

        let acquirer = FrameAcquirer::new(
            Arc::clone(&self.driver),
            Arc::clone(&prepared.slots),
            Arc::clone(&trigger_queue),
            Arc::clone(&display_queue),
            self.exit.clone(),
            AcquirerConfig::from_blueprint(blueprint),
        );

        let abort = |e: CliError| {
            self.exit.raise();
            trigger_queue.close();
            display_queue.close();
            store_queue.close();
            e
        };

        // consumers first, so nothing is produced into a queue without a reader
        let store_handle = spawn("store", move || store_sink.run()).map_err(abort)?;
        let display_handle = spawn("display", move || display_sink.run()).map_err(abort)?;
        let acquire_handle = spawn("acquire", move || acquirer.run()).map_err(abort)?;

        let scheduler_handle = if line_mode {
            info!("external line trigger, scheduler not started");
            None
        } else {
            let mut scheduler_config = SchedulerConfig::from_capture(&blueprint.capture);
            if let Some(max) = self.config.max_frames {
                scheduler_config = scheduler_config.with_max_triggers(max);
            }
            let scheduler = TriggerScheduler::new(
                Arc::clone(&self.trigger),
                Arc::clone(&trigger_queue),
                self.exit.clone(),
                scheduler_config,
            );
            Some(spawn("trigger", move || scheduler.run()).map_err(abort)?)
        };

        info!(
            sensors = prepared.slots.len(),
            frame_rate_hz = blueprint.capture.frame_rate_hz,
            max_frames = ?self.config.max_frames,
            "pipeline running"
        );

        let deadline = self.config.timeout.map(|t| started + t);
        let mut interrupt_since: Option<Instant> = None;
        let mut last_progress = Instant::now();

        while !store_handle.is_finished() {
            thread::sleep(WATCH_INTERVAL);
            let now = Instant::now();

            if deadline.is_some_and(|d| now >= d) && self.exit.raise() {
                info!("timeout reached, stopping");
            }

            if self.interrupt.exit_pending() {
                let since = *interrupt_since.get_or_insert(now);
                if now - since >= INTERRUPT_GRACE && self.exit.raise() {
                    warn!("no pair to carry the interrupt, stopping directly");
                }
            } else {
                interrupt_since = None;
            }

            if line_mode
                && self
                    .config
                    .max_frames
                    .is_some_and(|max| display_metrics.received() >= max)
                && self.exit.raise()
            {
                info!("frame limit reached, stopping");
            }

            if now - last_progress >= PROGRESS_INTERVAL {
                last_progress = now;
                let shown = display_metrics.snapshot();
                info!(
                    received = shown.received,
                    rendered = shown.succeeded,
                    trigger_depth = trigger_queue.size(),
                    display_depth = display_queue.size(),
                    store_depth = store_queue.size(),
                    "pipeline progress"
                );
            }
        }

        // Natural end of stream leaves the flag down; make every stage agree.
        self.exit.raise();
        debug!("store finished, joining stages");

        let scheduler = scheduler_handle
            .map(|h| h.join().map_err(|_| CliError::stage_panicked("trigger")))
            .transpose();
        let acquirer = acquire_handle
            .join()
            .map_err(|_| CliError::stage_panicked("acquire"));
        let display = display_handle
            .join()
            .map_err(|_| CliError::stage_panicked("display"));
        let store = store_handle
            .join()
            .map_err(|_| CliError::stage_panicked("store"));

        let stats = PipelineStats {
            duration: started.elapsed(),
            sensors: prepared.slots.len(),
            scheduler: scheduler?,
            acquirer: acquirer?,
            display: display?,
            store: store?,
            trigger_queue: trigger_queue.metrics(),
            display_queue: display_queue.metrics(),
            store_queue: store_queue.metrics(),
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            pairs = stats.acquirer.pairs,
            stored = stats.store.stored,
            balanced = stats.is_balanced(),
            "pipeline stopped"
        );
        Ok(stats)
    }

    fn shutdown_driver(&self) {
        if let Err(e) = self.driver.stop_streaming() {
            warn!(error = %e, "stop streaming failed");
        }
        if let Err(e) = self.driver.close() {
            warn!(error = %e, "driver close failed");
        }
    }
}

/// Start a named stage thread
fn spawn<T, F>(stage: &'static str, body: F) -> Result<JoinHandle<T>, CliError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(stage.to_string())
        .spawn(body)
        .map_err(|e| CliError::thread_spawn(stage, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture::{MockBehavior, MockCameraConfig, MockCameraDriver};
    use contracts::FailurePolicy;

    fn blueprint(rate: f64, sensors: u8) -> CaptureBlueprint {
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
            "#
        );
        config_loader::ConfigLoader::load_from_str(&toml, config_loader::ConfigFormat::Toml)
            .unwrap()
    }

    fn pipeline(config: PipelineConfig, mock: MockCameraConfig) -> (Pipeline, MockCameraDriver) {
        let driver = MockCameraDriver::new(mock);
        let shared = Arc::new(driver.clone());
        (Pipeline::new(config, shared.clone(), shared), driver)
    }

    #[test]
    fn test_mock_run_is_balanced() {
        let mut blueprint = blueprint(50.0, 2);
        blueprint.store.start_saving = true;
        let config = PipelineConfig {
            blueprint,
            max_frames: Some(6),
            timeout: Some(Duration::from_secs(20)),
            identity_calibration: true,
        };
        let (pipeline, driver) = pipeline(config, MockCameraConfig::pair(16, 12));

        let stats = pipeline.run().unwrap();

        assert_eq!(stats.scheduler.as_ref().unwrap().fired, 6);
        assert_eq!(stats.acquirer.pairs, 6);
        assert_eq!(stats.display.received, 6);
        assert_eq!(stats.store.received, 6);
        assert_eq!(stats.store.stored, 6);
        assert!(stats.is_balanced());
        assert_eq!(driver.captured(), 6);
    }

    #[test]
    fn test_missing_calibration_fails_before_start() {
        let config = PipelineConfig {
            blueprint: blueprint(10.0, 2),
            max_frames: Some(3),
            timeout: None,
            identity_calibration: false,
        };
        let (pipeline, driver) = pipeline(config, MockCameraConfig::pair(16, 12));

        let err = pipeline.run().unwrap_err();
        assert!(matches!(err, CliError::Contract(ref e) if e.is_config_load()));
        assert_eq!(driver.captured(), 0);
    }

    #[test]
    fn test_abort_policy_reports_fatal() {
        let mut blueprint = blueprint(20.0, 2);
        blueprint.capture.failure_policy = FailurePolicy::Abort;
        let config = PipelineConfig {
            blueprint,
            max_frames: Some(10),
            timeout: Some(Duration::from_secs(20)),
            identity_calibration: true,
        };
        let (pipeline, _driver) = pipeline(
            config,
            MockCameraConfig::pair(16, 12).with_behavior(1, MockBehavior::Silent),
        );

        let stats = pipeline.run().unwrap();
        assert!(stats.acquirer.fatal.is_some());
        assert_eq!(stats.acquirer.pairs, 0);
        assert!(stats.is_balanced());
    }
}
