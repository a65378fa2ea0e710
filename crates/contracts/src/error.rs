//! Layered error definitions
//!
//! Categorized by source: config / calibration / device / pairing / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Calibration map could not be loaded (missing file, bad encoding, wrong shape)
    #[error("calibration load error for '{path}': {message}")]
    CalibrationLoad { path: String, message: String },

    // ===== Device Errors =====
    /// Driver-layer failure outside of frame retrieval
    #[error("device error: {message}")]
    Device { message: String },

    // ===== Data Errors =====
    /// A pair violates the slot / timestamp pairing invariant
    #[error("pairing error: {message}")]
    Pairing { message: String },

    /// Image buffer does not match its declared geometry
    #[error("invalid image: {message}")]
    InvalidImage { message: String },

    // ===== Sink Errors =====
    /// Display render error
    #[error("display '{display}' render error: {message}")]
    Display { display: String, message: String },

    /// Store write error
    #[error("store '{store}' write error: {message}")]
    StoreWrite { store: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create calibration load error
    pub fn calibration_load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CalibrationLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create device error
    pub fn device(message: impl Into<String>) -> Self {
        Self::Device {
            message: message.into(),
        }
    }

    /// Create pairing error
    pub fn pairing(message: impl Into<String>) -> Self {
        Self::Pairing {
            message: message.into(),
        }
    }

    /// Create invalid image error
    pub fn invalid_image(message: impl Into<String>) -> Self {
        Self::InvalidImage {
            message: message.into(),
        }
    }

    /// Create display render error
    pub fn display(display: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Display {
            display: display.into(),
            message: message.into(),
        }
    }

    /// Create store write error
    pub fn store_write(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreWrite {
            store: store.into(),
            message: message.into(),
        }
    }

    /// Whether this error was raised while loading startup configuration
    /// (settings or calibration maps)
    pub fn is_config_load(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse { .. } | Self::ConfigValidation { .. } | Self::CalibrationLoad { .. }
        )
    }
}
