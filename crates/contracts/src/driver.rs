//! Camera driver interface - external device layer
//!
//! The capture core talks to hardware only through these traits. Device
//! enumeration, register programming and transport are the driver's business.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::{SerialNumber, WhiteBalance};

/// Action-command group key shared by every sensor in the rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupKey(pub u32);

impl Default for GroupKey {
    fn default() -> Self {
        Self(0x11_22_33)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#08x}", self.0)
    }
}

/// Enumerated device, as reported by the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Driver-side handle echoed back in every grab result
    pub context: usize,
    pub serial: SerialNumber,
    pub model: String,
    /// Transport address (IP for GigE devices)
    pub address: String,
    /// White balance read once when the device was opened
    pub white_balance: WhiteBalance,
}

/// One retrieved buffer.
///
/// `success = false` means the driver delivered something it marked as
/// incomplete; the buffer content is then undefined.
#[derive(Debug, Clone)]
pub struct GrabResult {
    /// Which device produced the buffer (see [`DeviceInfo::context`])
    pub camera_context: usize,
    pub success: bool,
    pub error_code: Option<u32>,
    pub error_description: Option<String>,
    pub width: u32,
    pub height: u32,
    pub buffer: Bytes,
    /// Index of the capture that produced this buffer, counted from 0 per
    /// successful trigger since `start_streaming`. `None` if the driver
    /// cannot correlate buffers with captures.
    pub frame_id: Option<u64>,
    /// Device tick counter chunk
    pub device_timestamp: Option<u64>,
    /// Exposure chunk
    pub exposure_us: Option<f64>,
    /// Gain chunk
    pub gain: Option<i64>,
}

/// Driver-layer failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    /// No buffer arrived before the deadline
    #[error("no buffer within {waited_ms} ms")]
    Timeout { waited_ms: u64 },

    /// A device did not accept a command
    #[error("device unreachable: {message}")]
    Unreachable { message: String },

    /// Retrieval attempted while the stream is stopped
    #[error("devices are not streaming")]
    NotStreaming,

    /// Driver already closed
    #[error("driver closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

impl DriverError {
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Unreachable {
            message: message.into(),
        }
    }
}

/// Frame retrieval side of the driver.
///
/// Implementations use interior mutability; the acquirer and the
/// orchestrator share one instance behind an `Arc`.
pub trait CameraDriver: Send + Sync {
    /// Driver name (used for logging)
    fn name(&self) -> &str;

    /// Enumerate attached devices in driver order
    fn devices(&self) -> Result<Vec<DeviceInfo>, DriverError>;

    /// Open every device
    fn open(&self) -> Result<(), DriverError>;

    /// Close every device; idempotent
    fn close(&self) -> Result<(), DriverError>;

    /// Begin accepting triggers and queueing buffers
    fn start_streaming(&self) -> Result<(), DriverError>;

    /// Stop acquisition; pending retrievals fail with `NotStreaming`
    fn stop_streaming(&self) -> Result<(), DriverError>;

    /// Block until the next buffer from any device, or `timeout` elapses
    fn retrieve_next(&self, timeout: Duration) -> Result<GrabResult, DriverError>;
}

/// Simultaneous capture command broadcast to all devices.
pub trait ActionTrigger: Send + Sync {
    /// Fire one capture on every device of `group`.
    ///
    /// # Errors
    /// Fails if any device is unreachable; no device captures in that case.
    fn issue_simultaneous_capture(&self, group: GroupKey) -> Result<(), DriverError>;
}
