//! FileStore - writes pairs to disk with a per-serial folder structure
//!
//! ```text
//! <base_path>/
//!   <serial>/<number>.png|raw
//!   meta/<number>.json
//! ```

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use contracts::{ContractError, ConvertedFramePair, FrameMeta, FrameStore, StoreFormat};
use image::{ImageFormat, RgbImage};
use serde::Serialize;
use tracing::{debug, error, instrument};

/// Sidecar metadata of one stored pair
#[derive(Debug, Serialize)]
struct PairRecord<'a> {
    image_number: u64,
    sequence: u64,
    /// Human-readable trigger stamp
    stamp: String,
    fired_at: chrono::DateTime<chrono::Utc>,
    frames: Vec<&'a FrameMeta>,
}

/// Store that writes images and JSON metadata under a base directory
pub struct FileStore {
    name: String,
    base_path: PathBuf,
    format: StoreFormat,
    created_dirs: HashSet<PathBuf>,
}

impl FileStore {
    /// Create the store, creating `base_path` if needed
    pub fn new(
        name: impl Into<String>,
        base_path: impl Into<PathBuf>,
        format: StoreFormat,
    ) -> std::io::Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;

        Ok(Self {
            name: name.into(),
            base_path,
            format,
            created_dirs: HashSet::new(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn ensure_dir(&mut self, dir: &Path) -> std::io::Result<()> {
        if !self.created_dirs.contains(dir) {
            fs::create_dir_all(dir)?;
            self.created_dirs.insert(dir.to_path_buf());
        }
        Ok(())
    }

    fn write_pair_to_disk(&mut self, pair: &ConvertedFramePair) -> std::io::Result<()> {
        // Unnumbered pairs (forwarded on exit before saving began) fall back to the trigger sequence
        let number = pair.image_number().unwrap_or(pair.trigger().sequence);

        let meta_dir = self.base_path.join("meta");
        self.ensure_dir(&meta_dir)?;
        let record = PairRecord {
            image_number: number,
            sequence: pair.trigger().sequence,
            stamp: pair.trigger().stamp(),
            fired_at: pair.trigger().fired_at,
            frames: pair.frames().map(|f| &f.meta).collect(),
        };
        let meta_file = BufWriter::new(File::create(meta_dir.join(format!("{number}.json")))?);
        serde_json::to_writer_pretty(meta_file, &record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let images = std::iter::once(pair.primary_rgb()).chain(pair.secondary_rgb());
        for (frame, image) in pair.frames().zip(images) {
            let sensor_dir = self.base_path.join(frame.meta.serial.as_str());
            self.ensure_dir(&sensor_dir)?;
            let path = sensor_dir.join(format!("{number}.{}", self.format.extension()));
            self.save_image(&path, image)?;
        }
        Ok(())
    }

    fn save_image(&self, path: &Path, image: &RgbImage) -> std::io::Result<()> {
        match self.format {
            StoreFormat::Png => image
                .save_with_format(path, ImageFormat::Png)
                .map_err(std::io::Error::other),
            StoreFormat::Raw => fs::write(path, image.as_raw()),
        }
    }
}

impl FrameStore for FileStore {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_store_save",
        skip(self, pair),
        fields(store = %self.name, sequence = pair.trigger().sequence)
    )]
    fn save(&mut self, pair: &ConvertedFramePair) -> Result<(), ContractError> {
        self.write_pair_to_disk(pair).map_err(|e| {
            error!(error = %e, "Write failed");
            ContractError::store_write(&self.name, e.to_string())
        })
    }

    fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "file_store_close", skip(self))]
    fn close(&mut self) -> Result<(), ContractError> {
        debug!(store = %self.name, base_path = %self.base_path.display(), "FileStore closed");
        Ok(())
    }
}
