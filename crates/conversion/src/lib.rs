//! # Conversion
//!
//! Pure, stateless image stages applied to every acquired pair:
//!
//! 1. [`demosaic`]: single-channel Bayer mosaic to RGB
//! 2. [`remap`]: geometric undistortion through two per-sensor lookup tables
//!
//! Calibration tables are loaded once at startup into a [`CalibrationSet`] and
//! shared read-only. The same raw buffer and maps always produce
//! byte-identical output.

mod calibration;
mod demosaic;
mod remap;
mod stage;

pub use calibration::CalibrationSet;
pub use demosaic::demosaic;
pub use remap::{remap, CalibrationMaps, RemapTable};
pub use stage::ConversionStage;
