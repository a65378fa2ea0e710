//! # Contracts
//!
//! Frozen interface contracts shared by every pipeline crate: the frame data
//! model, the configuration tree and the traits the capture core requires of
//! its external collaborators (camera driver, display, persistence).
//! All business crates depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Host wall-clock (`DateTime<Utc>`) stamped when a trigger fires is the
//!   pairing key; both frames of a pair carry the same value
//! - Device tick counters are optional metadata, never used for correlation

mod blueprint;
mod driver;
mod error;
mod frame;
mod serial;
mod sink;

pub use blueprint::*;
pub use driver::*;
pub use error::*;
pub use frame::*;
pub use serial::SerialNumber;
pub use sink::*;
