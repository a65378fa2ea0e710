//! SnapshotDisplay - side-by-side view written to a PNG

use std::fs;
use std::path::{Path, PathBuf};

use contracts::{ContractError, ConvertedFramePair, FrameDisplay, OperatorKey};
use image::ImageFormat;
use tracing::{debug, instrument};

use super::InterruptSignal;
use crate::compose::concat_horizontal;

/// Overwrites one PNG with the concatenated pair every `every` renders.
///
/// The image is written next to the target and renamed over it, so a
/// viewer polling the file never sees a partial write.
pub struct SnapshotDisplay {
    name: String,
    path: PathBuf,
    every: u32,
    rendered: u64,
    signal: InterruptSignal,
}

impl SnapshotDisplay {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        every: u32,
        signal: InterruptSignal,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            every: every.max(1),
            rendered: 0,
            signal,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_snapshot(&self, pair: &ConvertedFramePair) -> Result<(), ContractError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let staging = self.path.with_extension("partial.png");
        concat_horizontal(pair)
            .save_with_format(&staging, ImageFormat::Png)
            .map_err(|e| ContractError::display(&self.name, e.to_string()))?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }
}

impl FrameDisplay for SnapshotDisplay {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "snapshot_render",
        skip(self, pair),
        fields(display = %self.name, sequence = pair.trigger().sequence)
    )]
    fn render(&mut self, pair: &ConvertedFramePair) -> Result<(), ContractError> {
        let due = self.rendered % u64::from(self.every) == 0;
        self.rendered += 1;
        if due {
            self.write_snapshot(pair)?;
            debug!(path = %self.path.display(), "snapshot written");
        }
        Ok(())
    }

    fn poll_key(&mut self) -> Option<OperatorKey> {
        self.signal.take()
    }
}
