//! FramePair - Acquirer output, unit of flow through every queue
//!
//! Raw sensor frames, their conversion stages and the correlated pair.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

use crate::{ContractError, SerialNumber};

/// Logical sensor slot, assigned once at startup from the serial sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Primary,
    Secondary,
}

impl Slot {
    /// All slots in index order
    pub const ALL: [Slot; 2] = [Slot::Primary, Slot::Secondary];

    /// Slot for a logical index (0 or 1)
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Primary),
            1 => Some(Self::Secondary),
            _ => None,
        }
    }

    /// Logical index of this slot
    pub fn index(self) -> usize {
        match self {
            Self::Primary => 0,
            Self::Secondary => 1,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot{}", self.index())
    }
}

/// Capture-intent timestamp, produced once per scheduler tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// Monotonic tick number (successful issues only)
    pub sequence: u64,
    /// Host wall-clock at issue time; the pairing key
    pub fired_at: DateTime<Utc>,
}

impl TriggerEvent {
    pub fn new(sequence: u64, fired_at: DateTime<Utc>) -> Self {
        Self { sequence, fired_at }
    }

    /// Human-readable capture stamp, `YYYY-MM-DD HH:MM:SS:mmm:uuu`
    pub fn stamp(&self) -> String {
        format_stamp(&self.fired_at)
    }
}

/// Format a timestamp with millisecond and microsecond fields split out.
pub fn format_stamp(ts: &DateTime<Utc>) -> String {
    let micros = ts.timestamp_subsec_micros();
    format!(
        "{}:{:03}:{:03}",
        ts.format("%Y-%m-%d %H:%M:%S"),
        micros / 1000,
        micros % 1000
    )
}

/// White-balance ratios captured from the sensor at startup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WhiteBalance {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl Default for WhiteBalance {
    fn default() -> Self {
        Self {
            red: 1.0,
            green: 1.0,
            blue: 1.0,
        }
    }
}

/// Color filter array layout, named by the top-left 2x2 block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BayerPattern {
    #[default]
    Rggb,
    Bggr,
    Grbg,
    Gbrg,
}

/// Color channel index into an RGB pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red = 0,
    Green = 1,
    Blue = 2,
}

impl BayerPattern {
    /// Channel sampled by the photosite at `(x, y)`
    pub fn channel_at(self, x: u32, y: u32) -> Channel {
        let (odd_x, odd_y) = (x & 1 == 1, y & 1 == 1);
        let (c00, c01, c10, c11) = match self {
            Self::Rggb => (Channel::Red, Channel::Green, Channel::Green, Channel::Blue),
            Self::Bggr => (Channel::Blue, Channel::Green, Channel::Green, Channel::Red),
            Self::Grbg => (Channel::Green, Channel::Red, Channel::Blue, Channel::Green),
            Self::Gbrg => (Channel::Green, Channel::Blue, Channel::Red, Channel::Green),
        };
        match (odd_y, odd_x) {
            (false, false) => c00,
            (false, true) => c01,
            (true, false) => c10,
            (true, true) => c11,
        }
    }
}

/// Single-channel mosaiced bitmap, one byte per photosite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BayerImage {
    pub width: u32,
    pub height: u32,
    pub pattern: BayerPattern,
    /// Row-major photosites (zero-copy)
    pub data: Bytes,
}

impl BayerImage {
    /// Create a raw image, checking the buffer against its geometry.
    pub fn new(
        width: u32,
        height: u32,
        pattern: BayerPattern,
        data: Bytes,
    ) -> Result<Self, ContractError> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(ContractError::invalid_image(format!(
                "raw buffer holds {} bytes, {}x{} needs {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            pattern,
            data,
        })
    }

    /// Photosite value at `(x, y)`; caller keeps coordinates in range
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }
}

/// Which conversion stage an image has reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameStage {
    Raw,
    Color,
    Undistorted,
}

impl fmt::Display for FrameStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Raw => "raw",
            Self::Color => "color",
            Self::Undistorted => "undistorted",
        };
        f.write_str(s)
    }
}

/// Image payload of a frame, tagged by conversion stage.
#[derive(Debug, Clone)]
pub enum FrameImage {
    /// Mosaiced sensor output
    Raw(BayerImage),
    /// Demosaiced, still lens-distorted
    Color(RgbImage),
    /// Demosaiced and remapped through the slot's calibration maps
    Undistorted(RgbImage),
}

impl FrameImage {
    pub fn stage(&self) -> FrameStage {
        match self {
            Self::Raw(_) => FrameStage::Raw,
            Self::Color(_) => FrameStage::Color,
            Self::Undistorted(_) => FrameStage::Undistorted,
        }
    }

    /// `(width, height)` of the current image
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Raw(raw) => (raw.width, raw.height),
            Self::Color(rgb) | Self::Undistorted(rgb) => rgb.dimensions(),
        }
    }

    /// RGB view for color-stage images
    pub fn rgb(&self) -> Option<&RgbImage> {
        match self {
            Self::Raw(_) => None,
            Self::Color(rgb) | Self::Undistorted(rgb) => Some(rgb),
        }
    }
}

/// Per-frame metadata, persisted alongside stored images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMeta {
    pub slot: Slot,
    pub serial: SerialNumber,
    /// Trigger sequence this frame answers
    pub sequence: u64,
    /// Host capture time; equals the trigger's `fired_at`
    pub host_time: DateTime<Utc>,
    /// Device tick counter, when the driver reports one
    #[serde(default)]
    pub device_time: Option<u64>,
    pub exposure_us: f64,
    pub gain: i64,
    pub white_balance: WhiteBalance,
    pub auto_exposure: bool,
    pub auto_gain: bool,
    /// Assigned when the pair is selected for storage
    #[serde(default)]
    pub image_number: Option<u64>,
}

/// One sensor's contribution to a pair.
#[derive(Debug, Clone)]
pub struct Frame {
    pub meta: FrameMeta,
    pub image: FrameImage,
}

impl Frame {
    pub fn new(meta: FrameMeta, image: FrameImage) -> Self {
        Self { meta, image }
    }

    pub fn stage(&self) -> FrameStage {
        self.image.stage()
    }
}

/// Correlated output of one trigger: one frame per active slot.
///
/// Both members carry the trigger's host timestamp. The secondary slot is
/// absent when only one sensor is configured.
#[derive(Debug, Clone)]
pub struct FramePair {
    trigger: TriggerEvent,
    primary: Frame,
    secondary: Option<Frame>,
}

impl FramePair {
    /// Assemble a pair, enforcing slot assignment and the shared timestamp.
    pub fn new(
        trigger: TriggerEvent,
        primary: Frame,
        secondary: Option<Frame>,
    ) -> Result<Self, ContractError> {
        check_member(&trigger, &primary, Slot::Primary)?;
        if let Some(frame) = &secondary {
            check_member(&trigger, frame, Slot::Secondary)?;
        }
        Ok(Self {
            trigger,
            primary,
            secondary,
        })
    }

    pub fn trigger(&self) -> &TriggerEvent {
        &self.trigger
    }

    pub fn primary(&self) -> &Frame {
        &self.primary
    }

    pub fn secondary(&self) -> Option<&Frame> {
        self.secondary.as_ref()
    }

    /// Present frames in slot order
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        std::iter::once(&self.primary).chain(self.secondary.iter())
    }

    /// Number of present frames (1 or 2)
    pub fn len(&self) -> usize {
        1 + usize::from(self.secondary.is_some())
    }

    /// Stage of the least-converted member
    pub fn stage(&self) -> FrameStage {
        let mut stage = self.primary.stage();
        if let Some(frame) = &self.secondary {
            if frame.stage() == FrameStage::Raw
                || (frame.stage() == FrameStage::Color && stage == FrameStage::Undistorted)
            {
                stage = frame.stage();
            }
        }
        stage
    }

    /// Stamp the storage number on every present frame
    pub fn set_image_number(&mut self, number: u64) {
        self.primary.meta.image_number = Some(number);
        if let Some(frame) = &mut self.secondary {
            frame.meta.image_number = Some(number);
        }
    }

    /// Storage number, if the pair was selected for saving
    pub fn image_number(&self) -> Option<u64> {
        self.primary.meta.image_number
    }

    /// Move the members out (for in-place stage conversion)
    pub fn into_parts(self) -> (TriggerEvent, Frame, Option<Frame>) {
        (self.trigger, self.primary, self.secondary)
    }
}

fn check_member(trigger: &TriggerEvent, frame: &Frame, slot: Slot) -> Result<(), ContractError> {
    if frame.meta.slot != slot {
        return Err(ContractError::pairing(format!(
            "frame from {} ({}) placed in {}",
            frame.meta.slot, frame.meta.serial, slot
        )));
    }
    if frame.meta.host_time != trigger.fired_at {
        return Err(ContractError::pairing(format!(
            "{} host time {} differs from trigger {} at {}",
            slot,
            format_stamp(&frame.meta.host_time),
            trigger.sequence,
            format_stamp(&trigger.fired_at)
        )));
    }
    Ok(())
}

/// A pair whose present frames are all undistorted.
#[derive(Debug, Clone)]
pub struct ConvertedFramePair(FramePair);

impl ConvertedFramePair {
    pub fn into_inner(self) -> FramePair {
        self.0
    }

    /// Undistorted primary image
    pub fn primary_rgb(&self) -> &RgbImage {
        undistorted(&self.0.primary)
    }

    /// Undistorted secondary image, absent for single-sensor runs
    pub fn secondary_rgb(&self) -> Option<&RgbImage> {
        self.0.secondary.as_ref().map(undistorted)
    }

    /// Stamp the storage number on every present frame
    pub fn set_image_number(&mut self, number: u64) {
        self.0.set_image_number(number);
    }
}

fn undistorted(frame: &Frame) -> &RgbImage {
    match &frame.image {
        FrameImage::Undistorted(rgb) => rgb,
        FrameImage::Raw(_) | FrameImage::Color(_) => {
            unreachable!("ConvertedFramePair holds a non-undistorted frame")
        }
    }
}

impl TryFrom<FramePair> for ConvertedFramePair {
    type Error = ContractError;

    fn try_from(pair: FramePair) -> Result<Self, Self::Error> {
        if let Some(frame) = pair.frames().find(|f| f.stage() != FrameStage::Undistorted) {
            return Err(ContractError::pairing(format!(
                "{} of trigger {} is still {}",
                frame.meta.slot,
                pair.trigger.sequence,
                frame.stage()
            )));
        }
        Ok(Self(pair))
    }
}

impl Deref for ConvertedFramePair {
    type Target = FramePair;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Operator input observed by the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKey {
    /// Stop the pipeline, keeping the in-hand pair
    Exit,
    /// Begin numbering and storing every displayed pair
    StartSaving,
}
