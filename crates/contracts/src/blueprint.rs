//! CaptureBlueprint - Config Loader output
//!
//! Describes the complete rig configuration: trigger timing, sensor settings,
//! queue policies, calibration sources, display and storage.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

use crate::{BayerPattern, GroupKey};

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete capture configuration blueprint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CaptureBlueprint {
    /// Config version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Trigger timing and acquisition policy
    #[validate(nested)]
    pub capture: CaptureConfig,

    /// Static sensor settings
    #[serde(default)]
    #[validate(nested)]
    pub sensor: SensorSettings,

    /// Hand-off queue policies
    #[serde(default)]
    #[validate(nested)]
    pub queues: QueuesConfig,

    /// Undistortion map sources
    pub calibration: CalibrationConfig,

    /// Display backend
    #[serde(default)]
    #[validate(nested)]
    pub display: DisplayConfig,

    /// Storage backend
    #[serde(default)]
    pub store: StoreConfig,
}

/// Trigger timing and acquisition policy
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CaptureConfig {
    /// Target trigger rate (Hz)
    #[validate(range(exclusive_min = 0.0, max = 60.0))]
    pub frame_rate_hz: f64,

    /// Number of active sensors (1 or 2)
    #[serde(default = "default_sensor_count")]
    #[validate(range(min = 1, max = 2))]
    pub sensor_count: u8,

    /// Software action command or external hardware line
    #[serde(default)]
    pub trigger_mode: TriggerMode,

    /// Action-command group key
    #[serde(default)]
    pub group_key: GroupKey,

    /// Per-buffer retrieval deadline (ms)
    #[serde(default = "default_retrieve_timeout_ms")]
    #[validate(range(min = 1))]
    pub retrieve_timeout_ms: u64,

    /// What a timeout or incomplete buffer does to the acquirer
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Consecutive skipped ticks that become fatal; 0 = unlimited
    #[serde(default)]
    pub max_consecutive_failures: u32,
}

fn default_sensor_count() -> u8 {
    2
}

fn default_retrieve_timeout_ms() -> u64 {
    5000
}

impl CaptureConfig {
    /// Fixed trigger period
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frame_rate_hz)
    }

    pub fn retrieve_timeout(&self) -> Duration {
        Duration::from_millis(self.retrieve_timeout_ms)
    }
}

/// Trigger source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Scheduler broadcasts an action command each tick
    #[default]
    Software,
    /// Sensors fire on an external line edge; host time is stamped at receipt
    ExternalLine,
}

/// Acquisition failure policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Terminate the acquirer on the first timeout or incomplete buffer
    Abort,
    /// Drop the tick and continue
    #[default]
    Skip,
}

/// Static sensor settings, recorded in frame metadata
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SensorSettings {
    /// Exposure time (µs), used when the driver reports no chunk value
    #[serde(default = "default_exposure_us")]
    #[validate(range(exclusive_min = 0.0))]
    pub exposure_us: f64,

    /// Raw gain
    #[serde(default)]
    #[validate(range(min = 0))]
    pub gain: i64,

    #[serde(default)]
    pub auto_exposure: bool,

    #[serde(default)]
    pub auto_gain: bool,

    /// Color filter array layout of the raw buffers
    #[serde(default)]
    pub bayer_pattern: BayerPattern,

    /// Sensor width (px)
    #[serde(default = "default_dimension")]
    #[validate(range(min = 2))]
    pub width: u32,

    /// Sensor height (px)
    #[serde(default = "default_dimension")]
    #[validate(range(min = 2))]
    pub height: u32,
}

fn default_exposure_us() -> f64 {
    10_000.0
}

fn default_dimension() -> u32 {
    3008
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            exposure_us: default_exposure_us(),
            gain: 0,
            auto_exposure: false,
            auto_gain: false,
            bayer_pattern: BayerPattern::default(),
            width: default_dimension(),
            height: default_dimension(),
        }
    }
}

/// Hand-off queue policies
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QueuesConfig {
    /// Scheduler -> acquirer
    #[serde(default = "QueueConfig::trigger_default")]
    #[validate(nested)]
    pub trigger: QueueConfig,

    /// Acquirer -> display
    #[serde(default = "QueueConfig::display_default")]
    #[validate(nested)]
    pub display: QueueConfig,

    /// Display -> store
    #[serde(default = "QueueConfig::store_default")]
    #[validate(nested)]
    pub store: QueueConfig,
}

impl Default for QueuesConfig {
    fn default() -> Self {
        Self {
            trigger: QueueConfig::trigger_default(),
            display: QueueConfig::display_default(),
            store: QueueConfig::store_default(),
        }
    }
}

/// Bounded queue configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct QueueConfig {
    /// Maximum buffered items
    #[validate(range(min = 1))]
    pub capacity: usize,

    /// Behavior when full
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl QueueConfig {
    pub fn new(capacity: usize, overflow: OverflowPolicy) -> Self {
        Self { capacity, overflow }
    }

    fn trigger_default() -> Self {
        Self::new(8, OverflowPolicy::Block)
    }

    fn display_default() -> Self {
        Self::new(8, OverflowPolicy::Block)
    }

    fn store_default() -> Self {
        Self::new(32, OverflowPolicy::Block)
    }
}

/// Backpressure policy of a full queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Producer waits for room
    #[default]
    Block,
    /// Evict the oldest buffered item
    DropOldest,
    /// Reject the incoming item
    DropNewest,
}

/// Undistortion map sources
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Root holding `calibration_<SERIAL>/map1.*` and `map2.*`
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Explicit per-slot map paths, in slot order; overrides `directory`
    #[serde(default)]
    pub slots: Vec<CalibrationSlotPaths>,

    /// Remap sampling kernel
    #[serde(default)]
    pub interpolation: Interpolation,
}

/// Explicit map paths for one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationSlotPaths {
    /// Source x-coordinate table (map1)
    pub map_x: PathBuf,
    /// Source y-coordinate table (map2)
    pub map_y: PathBuf,
}

/// Remap sampling kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Nearest,
    Bilinear,
    #[default]
    Bicubic,
}

/// Display backend
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DisplayConfig {
    #[serde(default)]
    pub backend: DisplayBackend,

    /// PNG written by the snapshot backend
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,

    /// Snapshot every N rendered pairs
    #[serde(default = "default_snapshot_every")]
    #[validate(range(min = 1))]
    pub snapshot_every: u32,
}

fn default_snapshot_every() -> u32 {
    1
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            backend: DisplayBackend::default(),
            snapshot_path: None,
            snapshot_every: default_snapshot_every(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayBackend {
    /// Structured log line per pair
    #[default]
    Log,
    /// Side-by-side PNG, overwritten in place
    Snapshot,
}

/// Storage backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Persist pairs at all; disabled pairs are counted as skipped
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Output root for the file backend
    #[serde(default)]
    pub base_path: Option<PathBuf>,

    #[serde(default)]
    pub format: StoreFormat,

    /// Record every pair from the first trigger instead of waiting for the operator
    #[serde(default)]
    pub start_saving: bool,
}

fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            enabled: true,
            base_path: None,
            format: StoreFormat::default(),
            start_saving: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Images + JSON metadata under `base_path`
    File,
    /// Structured log line per pair
    #[default]
    Log,
}

/// On-disk image encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreFormat {
    #[default]
    Png,
    /// Interleaved RGB8 bytes, no header
    Raw,
}

impl StoreFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Raw => "raw",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_from_rate() {
        let capture: CaptureConfig =
            serde_json::from_str(r#"{ "frame_rate_hz": 4.0 }"#).unwrap();
        assert_eq!(capture.period(), Duration::from_millis(250));
        assert_eq!(capture.sensor_count, 2);
        assert_eq!(capture.failure_policy, FailurePolicy::Skip);
        assert_eq!(capture.group_key, GroupKey(0x112233));
    }

    #[test]
    fn test_queue_defaults() {
        let queues = QueuesConfig::default();
        assert_eq!(queues.trigger.capacity, 8);
        assert_eq!(queues.display.capacity, 8);
        assert_eq!(queues.store.capacity, 32);
        assert_eq!(queues.store.overflow, OverflowPolicy::Block);
    }

    #[test]
    fn test_range_validation() {
        let capture: CaptureConfig =
            serde_json::from_str(r#"{ "frame_rate_hz": 0.0, "sensor_count": 3 }"#).unwrap();
        let errors = capture.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("frame_rate_hz"));
        assert!(fields.contains_key("sensor_count"));
    }
}
