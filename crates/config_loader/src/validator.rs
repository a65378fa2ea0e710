//! Configuration validation
//!
//! Rules:
//! - field ranges declared on the blueprint (`validator` derive)
//! - explicit calibration slot count equals sensor_count
//! - at least one calibration source present
//! - snapshot display has a snapshot_path
//! - enabled file store has a base_path

use ::validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use contracts::{CaptureBlueprint, ContractError, DisplayBackend, StoreBackend};

/// Validate CaptureBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    validate_ranges(blueprint)?;
    validate_calibration(blueprint)?;
    validate_display(blueprint)?;
    validate_store(blueprint)?;
    Ok(())
}

/// Run the derived range checks, reporting the first failure by dotted path
fn validate_ranges(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    match blueprint.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_error("", &errors)
                .unwrap_or_else(|| (String::from("<root>"), errors.to_string()));
            Err(ContractError::config_validation(field, message))
        }
    }
}

/// Depth-first walk in field-name order so the reported error is stable
fn first_error(prefix: &str, errors: &ValidationErrors) -> Option<(String, String)> {
    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in entries {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        let found = match kind {
            ValidationErrorsKind::Field(list) => list.first().map(|e| (path, describe(e))),
            ValidationErrorsKind::Struct(inner) => first_error(&path, inner),
            ValidationErrorsKind::List(items) => items
                .iter()
                .find_map(|(idx, inner)| first_error(&format!("{path}[{idx}]"), inner)),
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }
    let bound = |key: &str| error.params.get(key).map(|v| v.to_string());
    let value = bound("value").unwrap_or_else(|| "?".into());
    match (bound("min"), bound("max"), bound("exclusive_min")) {
        (_, _, Some(lo)) => format!("must be > {lo}, got {value}"),
        (Some(lo), Some(hi), _) => format!("must be in {lo}..={hi}, got {value}"),
        (Some(lo), None, _) => format!("must be >= {lo}, got {value}"),
        (None, Some(hi), _) => format!("must be <= {hi}, got {value}"),
        _ => format!("failed '{}' check, got {value}", error.code),
    }
}

/// Validate calibration sources
fn validate_calibration(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    let calibration = &blueprint.calibration;
    let expected = usize::from(blueprint.capture.sensor_count);

    if !calibration.slots.is_empty() && calibration.slots.len() != expected {
        return Err(ContractError::config_validation(
            "calibration.slots",
            format!(
                "{} slot map pairs given for sensor_count {}",
                calibration.slots.len(),
                expected
            ),
        ));
    }

    if calibration.slots.is_empty() && calibration.directory.is_none() {
        return Err(ContractError::config_validation(
            "calibration",
            "either calibration.directory or calibration.slots must be set",
        ));
    }

    Ok(())
}

/// Validate display backend parameters
fn validate_display(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    let display = &blueprint.display;
    if display.backend == DisplayBackend::Snapshot && display.snapshot_path.is_none() {
        return Err(ContractError::config_validation(
            "display.snapshot_path",
            "snapshot display requires snapshot_path",
        ));
    }
    Ok(())
}

/// Validate store backend parameters
fn validate_store(blueprint: &CaptureBlueprint) -> Result<(), ContractError> {
    let store = &blueprint.store;
    if store.enabled && store.backend == StoreBackend::File && store.base_path.is_none() {
        return Err(ContractError::config_validation(
            "store.base_path",
            "file store requires base_path",
        ));
    }
    Ok(())
}
