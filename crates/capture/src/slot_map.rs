//! Device-to-slot mapping
//!
//! Sensors are sorted by serial number once at startup and indexed 0..N-1,
//! decoupling buffer arrival order from logical identity. The mapping never
//! changes afterwards (no hot-plug).

use std::collections::HashSet;

use contracts::{ContractError, DeviceInfo, SerialNumber, Slot};
use tracing::info;

/// Stable slot assignment for the active sensors
#[derive(Debug, Clone)]
pub struct SlotMap {
    /// Indexed by slot
    devices: Vec<DeviceInfo>,
}

impl SlotMap {
    /// Build the mapping from the first `sensor_count` enumerated devices.
    ///
    /// # Errors
    /// - no device attached
    /// - fewer devices than `sensor_count`
    /// - `sensor_count` above the two supported slots
    /// - duplicate serial numbers among the selected devices
    pub fn from_devices(
        devices: Vec<DeviceInfo>,
        sensor_count: usize,
    ) -> Result<Self, ContractError> {
        if devices.is_empty() {
            return Err(ContractError::device("no camera present"));
        }
        if sensor_count == 0 || sensor_count > Slot::ALL.len() {
            return Err(ContractError::device(format!(
                "sensor_count {sensor_count} outside 1..={}",
                Slot::ALL.len()
            )));
        }
        if devices.len() < sensor_count {
            return Err(ContractError::device(format!(
                "{} camera(s) present, {} required",
                devices.len(),
                sensor_count
            )));
        }

        let mut selected: Vec<DeviceInfo> = devices.into_iter().take(sensor_count).collect();
        selected.sort_by(|a, b| a.serial.cmp(&b.serial));

        let mut seen = HashSet::new();
        for device in &selected {
            if !seen.insert(device.serial.as_str()) {
                return Err(ContractError::device(format!(
                    "duplicate camera serial {}",
                    device.serial
                )));
            }
        }

        for (idx, device) in selected.iter().enumerate() {
            info!(
                slot = idx,
                serial = %device.serial,
                model = %device.model,
                address = %device.address,
                context = device.context,
                "camera assigned"
            );
        }

        Ok(Self { devices: selected })
    }

    /// Number of active slots
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Slot of the device that reported `context`
    pub fn slot_for_context(&self, context: usize) -> Option<Slot> {
        self.devices
            .iter()
            .position(|d| d.context == context)
            .and_then(Slot::from_index)
    }

    pub fn device(&self, slot: Slot) -> Option<&DeviceInfo> {
        self.devices.get(slot.index())
    }

    /// Serials in slot order
    pub fn serials(&self) -> Vec<SerialNumber> {
        self.devices.iter().map(|d| d.serial.clone()).collect()
    }

    /// `(slot, device)` in slot order
    pub fn iter(&self) -> impl Iterator<Item = (Slot, &DeviceInfo)> {
        Slot::ALL.into_iter().zip(self.devices.iter())
    }
}
