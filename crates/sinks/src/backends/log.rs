//! Tracing-only backends

use contracts::{ContractError, ConvertedFramePair, FrameDisplay, FrameStore, OperatorKey};
use tracing::{debug, info, instrument};

use super::InterruptSignal;

/// Display that logs a one-line summary per pair
pub struct LogDisplay {
    name: String,
    signal: InterruptSignal,
}

impl LogDisplay {
    pub fn new(name: impl Into<String>, signal: InterruptSignal) -> Self {
        Self {
            name: name.into(),
            signal,
        }
    }
}

impl FrameDisplay for LogDisplay {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&mut self, pair: &ConvertedFramePair) -> Result<(), ContractError> {
        let (width, height) = pair.primary().image.dimensions();
        info!(
            display = %self.name,
            sequence = pair.trigger().sequence,
            stamp = %pair.trigger().stamp(),
            frames = pair.len(),
            width,
            height,
            "pair rendered"
        );
        Ok(())
    }

    fn poll_key(&mut self) -> Option<OperatorKey> {
        self.signal.take()
    }
}

/// Store that logs instead of persisting
pub struct LogStore {
    name: String,
}

impl LogStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl FrameStore for LogStore {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_store_save",
        skip(self, pair),
        fields(store = %self.name, sequence = pair.trigger().sequence)
    )]
    fn save(&mut self, pair: &ConvertedFramePair) -> Result<(), ContractError> {
        let serials: Vec<&str> = pair.frames().map(|f| f.meta.serial.as_str()).collect();
        info!(
            image_number = ?pair.image_number(),
            stamp = %pair.trigger().stamp(),
            serials = ?serials,
            "pair stored"
        );
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), ContractError> {
        debug!(store = %self.name, "LogStore closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::tests::converted_pair;

    #[test]
    fn test_log_display_forwards_signal() {
        let signal = InterruptSignal::new();
        let mut display = LogDisplay::new("log", signal.clone());
        display.render(&converted_pair(1, true)).unwrap();
        assert_eq!(display.poll_key(), None);

        signal.request_exit();
        assert_eq!(display.poll_key(), Some(OperatorKey::Exit));
    }

    #[test]
    fn test_log_store_accepts_single_frame() {
        let mut store = LogStore::new("my_store");
        assert_eq!(store.name(), "my_store");
        assert!(store.save(&converted_pair(2, false)).is_ok());
        assert!(store.close().is_ok());
    }
}
