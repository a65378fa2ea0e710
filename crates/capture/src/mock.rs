//! Mock camera driver
//!
//! Implements `CameraDriver` and `ActionTrigger` in-process, generating
//! deterministic Bayer buffers per trigger. Used for testing and `--mock`
//! runs without hardware. Each camera can be scripted to misbehave.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use contracts::{
    ActionTrigger, CameraDriver, DeviceInfo, DriverError, GrabResult, GroupKey,
    WhiteBalance,
};
use tracing::{debug, trace};

/// Driver-reported code for an incomplete buffer
const INCOMPLETE_BUFFER_CODE: u32 = 0xE100_0014;

/// Scripted behavior of one mock camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockBehavior {
    /// Deliver a complete buffer for every trigger
    #[default]
    Responsive,
    /// Never deliver anything
    Silent,
    /// Deliver an incomplete buffer for the given trigger (0-based)
    IncompleteOn(u64),
    /// Be unreachable when the given issue attempt (0-based) is made
    FailIssueOn(u64),
}

/// Order in which the cameras' buffers for one trigger become available
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrivalOrder {
    /// Enumeration order
    #[default]
    DeviceOrder,
    /// Reverse enumeration order
    Reversed,
}

/// One simulated camera
#[derive(Debug, Clone)]
pub struct MockCamera {
    pub serial: String,
    pub behavior: MockBehavior,
    pub white_balance: WhiteBalance,
}

impl MockCamera {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            behavior: MockBehavior::Responsive,
            white_balance: WhiteBalance::default(),
        }
    }
}

/// Mock driver configuration
#[derive(Debug, Clone)]
pub struct MockCameraConfig {
    /// Cameras in enumeration order
    pub cameras: Vec<MockCamera>,
    pub width: u32,
    pub height: u32,
    /// Delay between trigger and buffer availability
    pub latency: Duration,
    pub arrival: ArrivalOrder,
    /// Self-triggering period, simulating an external line trigger
    pub line_period: Option<Duration>,
}

impl Default for MockCameraConfig {
    fn default() -> Self {
        Self {
            // enumeration order deliberately differs from serial order
            cameras: vec![MockCamera::new("40012345"), MockCamera::new("22954321")],
            width: 64,
            height: 48,
            latency: Duration::from_millis(2),
            arrival: ArrivalOrder::DeviceOrder,
            line_period: None,
        }
    }
}

impl MockCameraConfig {
    /// Two responsive cameras of the given geometry
    pub fn pair(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// One responsive camera of the given geometry
    pub fn single(width: u32, height: u32) -> Self {
        Self {
            cameras: vec![MockCamera::new("22954321")],
            width,
            height,
            ..Self::default()
        }
    }

    /// Script the camera at enumeration index `idx`
    pub fn with_behavior(mut self, idx: usize, behavior: MockBehavior) -> Self {
        if let Some(camera) = self.cameras.get_mut(idx) {
            camera.behavior = behavior;
        }
        self
    }

    pub fn with_arrival(mut self, arrival: ArrivalOrder) -> Self {
        self.arrival = arrival;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_line_trigger(mut self, period: Duration) -> Self {
        self.line_period = Some(period);
        self
    }
}

#[derive(Debug, Default)]
struct MockState {
    open: bool,
    streaming: bool,
    /// Issue attempts so far
    issued: u64,
    /// Triggers actually captured
    captured: u64,
    /// Buffers waiting for retrieval, in availability order
    pending: VecDeque<(Instant, GrabResult)>,
}

#[derive(Debug)]
struct MockInner {
    config: MockCameraConfig,
    state: Mutex<MockState>,
    ready: Condvar,
    epoch: Instant,
    line_running: AtomicBool,
}

/// In-process camera driver
#[derive(Debug, Clone)]
pub struct MockCameraDriver {
    inner: Arc<MockInner>,
}

impl MockCameraDriver {
    pub fn new(config: MockCameraConfig) -> Self {
        Self {
            inner: Arc::new(MockInner {
                config,
                state: Mutex::new(MockState::default()),
                ready: Condvar::new(),
                epoch: Instant::now(),
                line_running: AtomicBool::new(false),
            }),
        }
    }

    /// Triggers captured so far
    pub fn captured(&self) -> u64 {
        self.inner.lock().captured
    }

    /// Deterministic test pattern for one camera and trigger
    pub fn pattern_bytes(width: u32, height: u32, camera: usize, capture: u64) -> Bytes {
        let shift = (capture as usize * 7 + camera * 31) % 256;
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height as usize {
            for x in 0..width as usize {
                data.push(((x * 3 + y * 5 + shift) % 256) as u8);
            }
        }
        Bytes::from(data)
    }
}

impl MockInner {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn capture(&self) -> Result<(), DriverError> {
        let mut state = self.lock();
        if !state.open {
            return Err(DriverError::Closed);
        }
        if !state.streaming {
            return Err(DriverError::NotStreaming);
        }

        let attempt = state.issued;
        state.issued += 1;

        if let Some(camera) = self
            .config
            .cameras
            .iter()
            .find(|c| c.behavior == MockBehavior::FailIssueOn(attempt))
        {
            return Err(DriverError::unreachable(format!(
                "camera {} did not acknowledge action command",
                camera.serial
            )));
        }

        let capture = state.captured;
        state.captured += 1;

        let now = Instant::now();
        let device_timestamp = now.duration_since(self.epoch).as_nanos() as u64;
        let mut order: Vec<usize> = (0..self.config.cameras.len()).collect();
        if self.config.arrival == ArrivalOrder::Reversed {
            order.reverse();
        }

        for (rank, idx) in order.into_iter().enumerate() {
            let camera = &self.config.cameras[idx];
            let result = match camera.behavior {
                MockBehavior::Silent => continue,
                MockBehavior::IncompleteOn(n) if n == capture => GrabResult {
                    camera_context: idx,
                    success: false,
                    error_code: Some(INCOMPLETE_BUFFER_CODE),
                    error_description: Some("The buffer was incompletely grabbed".into()),
                    width: self.config.width,
                    height: self.config.height,
                    buffer: Bytes::new(),
                    frame_id: Some(capture),
                    device_timestamp: Some(device_timestamp),
                    exposure_us: None,
                    gain: None,
                },
                _ => GrabResult {
                    camera_context: idx,
                    success: true,
                    error_code: None,
                    error_description: None,
                    width: self.config.width,
                    height: self.config.height,
                    buffer: MockCameraDriver::pattern_bytes(
                        self.config.width,
                        self.config.height,
                        idx,
                        capture,
                    ),
                    frame_id: Some(capture),
                    device_timestamp: Some(device_timestamp),
                    exposure_us: Some(10_000.0),
                    gain: Some(0),
                },
            };
            // staggered by rank so arrival order is observable
            let ready_at = now + self.config.latency + Duration::from_micros(rank as u64 * 100);
            state.pending.push_back((ready_at, result));
        }

        trace!(capture, "mock capture issued");
        drop(state);
        self.ready.notify_all();
        Ok(())
    }
}

impl CameraDriver for MockCameraDriver {
    fn name(&self) -> &str {
        "mock"
    }

    fn devices(&self) -> Result<Vec<DeviceInfo>, DriverError> {
        Ok(self
            .inner
            .config
            .cameras
            .iter()
            .enumerate()
            .map(|(idx, camera)| DeviceInfo {
                context: idx,
                serial: camera.serial.as_str().into(),
                model: "MockCam BayerRG8".into(),
                address: format!("127.0.0.{}", idx + 1),
                white_balance: camera.white_balance,
            })
            .collect())
    }

    fn open(&self) -> Result<(), DriverError> {
        self.inner.lock().open = true;
        debug!(cameras = self.inner.config.cameras.len(), "mock driver opened");
        Ok(())
    }

    fn close(&self) -> Result<(), DriverError> {
        {
            let mut state = self.inner.lock();
            state.open = false;
            state.streaming = false;
            state.pending.clear();
        }
        self.inner.line_running.store(false, Ordering::SeqCst);
        self.inner.ready.notify_all();
        debug!("mock driver closed");
        Ok(())
    }

    fn start_streaming(&self) -> Result<(), DriverError> {
        {
            let mut state = self.inner.lock();
            if !state.open {
                return Err(DriverError::Closed);
            }
            state.streaming = true;
        }

        if let Some(period) = self.inner.config.line_period {
            if !self.inner.line_running.swap(true, Ordering::SeqCst) {
                let inner = Arc::clone(&self.inner);
                thread::spawn(move || {
                    debug!(period_ms = period.as_millis() as u64, "mock line trigger started");
                    while inner.line_running.load(Ordering::Relaxed) {
                        if inner.capture().is_err() {
                            break;
                        }
                        thread::sleep(period);
                    }
                    debug!("mock line trigger stopped");
                });
            }
        }
        Ok(())
    }

    fn stop_streaming(&self) -> Result<(), DriverError> {
        {
            let mut state = self.inner.lock();
            state.streaming = false;
            state.pending.clear();
        }
        self.inner.line_running.store(false, Ordering::SeqCst);
        self.inner.ready.notify_all();
        Ok(())
    }

    fn retrieve_next(&self, timeout: Duration) -> Result<GrabResult, DriverError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.lock();
        loop {
            if !state.streaming {
                return Err(DriverError::NotStreaming);
            }
            let now = Instant::now();
            let next_ready = state.pending.front().map(|(at, _)| *at);
            if let Some(at) = next_ready {
                if at <= now {
                    if let Some((_, result)) = state.pending.pop_front() {
                        return Ok(result);
                    }
                }
            }
            if now >= deadline {
                return Err(DriverError::Timeout {
                    waited_ms: timeout.as_millis() as u64,
                });
            }
            let wake = next_ready.map_or(deadline, |at| at.min(deadline));
            state = self
                .inner
                .ready
                .wait_timeout(state, wake.saturating_duration_since(now))
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }
}

impl ActionTrigger for MockCameraDriver {
    fn issue_simultaneous_capture(&self, _group: GroupKey) -> Result<(), DriverError> {
        self.inner.capture()
    }
}
