//! Display and store backends

mod file;
mod log;
mod signal;
mod snapshot;

pub use file::FileStore;
pub use log::{LogDisplay, LogStore};
pub use signal::InterruptSignal;
pub use snapshot::SnapshotDisplay;

use contracts::{
    ContractError, DisplayBackend, DisplayConfig, FrameDisplay, FrameStore, StoreBackend,
    StoreConfig,
};

/// Build the configured display; operator keys come from `signal`
pub fn build_display(
    config: &DisplayConfig,
    signal: InterruptSignal,
) -> Result<Box<dyn FrameDisplay>, ContractError> {
    match config.backend {
        DisplayBackend::Log => Ok(Box::new(LogDisplay::new("log", signal))),
        DisplayBackend::Snapshot => {
            let path = config.snapshot_path.clone().ok_or_else(|| {
                ContractError::config_validation(
                    "display.snapshot_path",
                    "required for the snapshot backend",
                )
            })?;
            Ok(Box::new(SnapshotDisplay::new(
                "snapshot",
                path,
                config.snapshot_every,
                signal,
            )))
        }
    }
}

/// Build the configured store
pub fn build_store(config: &StoreConfig) -> Result<Box<dyn FrameStore>, ContractError> {
    match config.backend {
        StoreBackend::Log => Ok(Box::new(LogStore::new("log"))),
        StoreBackend::File => {
            let base_path = config.base_path.clone().ok_or_else(|| {
                ContractError::config_validation("store.base_path", "required for the file backend")
            })?;
            let store = FileStore::new("file", base_path, config.format)
                .map_err(|e| ContractError::store_write("file", e.to_string()))?;
            Ok(Box::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_requires_path() {
        let config = DisplayConfig {
            backend: DisplayBackend::Snapshot,
            snapshot_path: None,
            snapshot_every: 1,
        };
        let err = build_display(&config, InterruptSignal::new()).err().unwrap();
        assert!(matches!(err, ContractError::ConfigValidation { .. }));
    }

    #[test]
    fn test_file_store_created_under_base() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            backend: StoreBackend::File,
            base_path: Some(dir.path().join("out")),
            ..StoreConfig::default()
        };
        let store = build_store(&config).unwrap();
        assert_eq!(store.name(), "file");
        assert!(dir.path().join("out").is_dir());
    }
}
