//! # Capture
//!
//! Producer side of the pipeline: turns a fixed trigger rate into correlated
//! frame pairs.
//!
//! - [`TriggerScheduler`]: fires a simultaneous capture on every sensor at an
//!   absolute-deadline cadence and publishes a [`TriggerEvent`](contracts::TriggerEvent)
//! - [`FrameAcquirer`]: consumes trigger events, retrieves one buffer per
//!   sensor, maps it to its slot and publishes a [`FramePair`](contracts::FramePair)
//! - [`SlotMap`]: stable device-to-slot assignment fixed at startup
//! - [`MockCameraDriver`]: in-process driver for tests and `--mock` runs
//!
//! # Data Flow
//!
//! ```text
//! TriggerScheduler ──▶ BoundedQueue<TriggerEvent> ──▶ FrameAcquirer ──▶ BoundedQueue<FramePair>
//!        │                                                  ▲
//!        └─ ActionTrigger::issue_simultaneous_capture       └─ CameraDriver::retrieve_next
//! ```

mod acquirer;
mod error;
mod mock;
mod scheduler;
mod slot_map;

pub use acquirer::{AcquirerConfig, AcquirerReport, FrameAcquirer};
pub use error::{AcquisitionError, Severity};
pub use mock::{ArrivalOrder, MockBehavior, MockCamera, MockCameraConfig, MockCameraDriver};
pub use scheduler::{SchedulerConfig, SchedulerReport, TriggerScheduler};
pub use slot_map::SlotMap;
