//! Calibration map loading
//!
//! Per-slot remap tables are read once at startup and shared read-only for
//! the process lifetime. Files hold a serialized [`RemapTable`], bincode
//! (`.bin`) or JSON (`.json`), chosen by extension.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use contracts::{CalibrationConfig, ContractError, Interpolation, SerialNumber, Slot};
use tracing::{debug, info, instrument};

use crate::remap::{CalibrationMaps, RemapTable};

/// Extensions probed for serial-layout map files, in order
const MAP_EXTENSIONS: [&str; 2] = ["bin", "json"];

/// Immutable per-slot undistortion maps
#[derive(Debug, Clone)]
pub struct CalibrationSet {
    /// Indexed by slot
    maps: Vec<Arc<CalibrationMaps>>,
    interpolation: Interpolation,
}

impl CalibrationSet {
    /// Load the maps of every active slot.
    ///
    /// `serials` lists the active sensors in slot order. Explicit
    /// `calibration.slots` entries win over the serial-based directory layout
    /// `<directory>/calibration_<SERIAL>/map1.*` and `map2.*`.
    ///
    /// # Errors
    /// [`ContractError::CalibrationLoad`] for a missing, unreadable or
    /// malformed file, or when no source covers a slot.
    #[instrument(name = "calibration_load", skip(config, serials), fields(slots = serials.len()))]
    pub fn load(
        config: &CalibrationConfig,
        serials: &[SerialNumber],
    ) -> Result<Self, ContractError> {
        let mut maps = Vec::with_capacity(serials.len());

        for (idx, serial) in serials.iter().enumerate() {
            let (map_x_path, map_y_path) = match config.slots.get(idx) {
                Some(paths) => (paths.map_x.clone(), paths.map_y.clone()),
                None => {
                    let dir = config.directory.as_deref().ok_or_else(|| {
                        ContractError::calibration_load(
                            format!("slot{idx}"),
                            "no calibration directory or explicit maps configured",
                        )
                    })?;
                    let sensor_dir = dir.join(format!("calibration_{serial}"));
                    (
                        resolve_map(&sensor_dir, "map1"),
                        resolve_map(&sensor_dir, "map2"),
                    )
                }
            };

            let map_x = read_table(&map_x_path)?;
            let map_y = read_table(&map_y_path)?;
            let pair = CalibrationMaps::new(map_x, map_y).map_err(|e| {
                ContractError::calibration_load(map_y_path.display().to_string(), e.to_string())
            })?;

            let (width, height) = pair.dimensions();
            info!(
                slot = idx,
                serial = %serial,
                map_x = %map_x_path.display(),
                map_y = %map_y_path.display(),
                width,
                height,
                "calibration maps loaded"
            );
            maps.push(Arc::new(pair));
        }

        Ok(Self {
            maps,
            interpolation: config.interpolation,
        })
    }

    /// Identity maps for `slots` sensors of the given geometry
    pub fn identity(slots: usize, width: u32, height: u32, interpolation: Interpolation) -> Self {
        let shared = Arc::new(CalibrationMaps::identity(width, height));
        Self {
            maps: vec![shared; slots],
            interpolation,
        }
    }

    /// Build from already-loaded maps, in slot order
    pub fn from_maps(maps: Vec<CalibrationMaps>, interpolation: Interpolation) -> Self {
        Self {
            maps: maps.into_iter().map(Arc::new).collect(),
            interpolation,
        }
    }

    pub fn maps(&self, slot: Slot) -> Option<&CalibrationMaps> {
        self.maps.get(slot.index()).map(Arc::as_ref)
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Number of slots covered
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

impl RemapTable {
    /// Write the table, encoding chosen by extension (`.bin` or `.json`)
    pub fn save(&self, path: &Path) -> Result<(), ContractError> {
        let bytes = match extension(path) {
            Some("bin") => bincode::serialize(self).map_err(|e| {
                ContractError::calibration_load(path.display().to_string(), e.to_string())
            })?,
            Some("json") => serde_json::to_vec(self).map_err(|e| {
                ContractError::calibration_load(path.display().to_string(), e.to_string())
            })?,
            _ => {
                return Err(ContractError::calibration_load(
                    path.display().to_string(),
                    "unsupported map encoding, expected .bin or .json",
                ))
            }
        };
        fs::write(path, bytes)?;
        Ok(())
    }
}

/// First existing `<dir>/<stem>.<ext>`, or the `.bin` path for error reporting
fn resolve_map(dir: &Path, stem: &str) -> PathBuf {
    MAP_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .find(|p| p.is_file())
        .unwrap_or_else(|| dir.join(format!("{stem}.{}", MAP_EXTENSIONS[0])))
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|e| e.to_str())
}

fn read_table(path: &Path) -> Result<RemapTable, ContractError> {
    let origin = path.display().to_string();
    let bytes = fs::read(path)
        .map_err(|e| ContractError::calibration_load(origin.clone(), e.to_string()))?;

    let table: RemapTable = match extension(path) {
        Some("bin") => bincode::deserialize(&bytes)
            .map_err(|e| ContractError::calibration_load(origin.clone(), e.to_string()))?,
        Some("json") => serde_json::from_slice(&bytes)
            .map_err(|e| ContractError::calibration_load(origin.clone(), e.to_string()))?,
        _ => {
            return Err(ContractError::calibration_load(
                origin,
                "unsupported map encoding, expected .bin or .json",
            ))
        }
    };

    let table = RemapTable::new(table.width, table.height, table.values)
        .map_err(|e| ContractError::calibration_load(origin.clone(), e.to_string()))?;
    debug!(path = %origin, width = table.width, height = table.height, "remap table read");
    Ok(table)
}
