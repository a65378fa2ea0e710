//! Error types for CLI operations.

use thiserror::Error;

/// Pipeline lifecycle errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// No camera driver for a hardware run
    #[error("no camera driver is built into this binary; rerun with --mock")]
    NoDriver,

    /// A stage thread could not be started
    #[error("failed to spawn {stage} thread: {source}")]
    ThreadSpawn {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A stage thread panicked
    #[error("{stage} thread panicked")]
    StagePanicked { stage: &'static str },

    /// Driver-level failure during startup or teardown
    #[error("camera driver error: {0}")]
    Driver(#[from] contracts::DriverError),

    /// Startup failure reported by a pipeline component
    #[error(transparent)]
    Contract(#[from] contracts::ContractError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn thread_spawn(stage: &'static str, source: std::io::Error) -> Self {
        Self::ThreadSpawn { stage, source }
    }

    pub fn stage_panicked(stage: &'static str) -> Self {
        Self::StagePanicked { stage }
    }
}
