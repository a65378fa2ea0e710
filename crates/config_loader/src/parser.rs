//! Configuration parsing
//!
//! TOML (primary) and JSON (optional) formats.

use contracts::{CaptureBlueprint, ContractError};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML (recommended)
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Infer format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Parse TOML configuration
pub fn parse_toml(content: &str) -> Result<CaptureBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse JSON configuration
pub fn parse_json(content: &str) -> Result<CaptureBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Parse according to format
pub fn parse(content: &str, format: ConfigFormat) -> Result<CaptureBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{FailurePolicy, Interpolation, OverflowPolicy, TriggerMode};

    #[test]
    fn test_parse_toml_minimal() {
        let content = r#"
[capture]
frame_rate_hz = 4.0

[calibration]
directory = "/data/calibration"
"#;
        let result = parse_toml(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.capture.sensor_count, 2);
        assert_eq!(bp.capture.trigger_mode, TriggerMode::Software);
        assert_eq!(bp.calibration.interpolation, Interpolation::Bicubic);
        assert!(bp.store.enabled);
    }

    #[test]
    fn test_parse_toml_full_sections() {
        let content = r#"
[capture]
frame_rate_hz = 2.5
sensor_count = 1
trigger_mode = "external_line"
group_key = 0x112233
retrieve_timeout_ms = 800
failure_policy = "abort"

[sensor]
exposure_us = 2500.0
gain = 3
auto_gain = true
bayer_pattern = "bggr"
width = 64
height = 48

[queues.display]
capacity = 2
overflow = "drop_oldest"

[[calibration.slots]]
map_x = "cal/map1.json"
map_y = "cal/map2.json"

[display]
backend = "snapshot"
snapshot_path = "view.png"
snapshot_every = 5

[store]
backend = "file"
base_path = "out"
format = "raw"
start_saving = true
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.capture.trigger_mode, TriggerMode::ExternalLine);
        assert_eq!(bp.capture.failure_policy, FailurePolicy::Abort);
        assert_eq!(bp.capture.group_key.0, 0x112233);
        assert_eq!(bp.queues.display.capacity, 2);
        assert_eq!(bp.queues.display.overflow, OverflowPolicy::DropOldest);
        assert_eq!(bp.queues.store.capacity, 32);
        assert_eq!(bp.calibration.slots.len(), 1);
        assert_eq!(bp.sensor.width, 64);
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{
            "capture": { "frame_rate_hz": 4.0, "sensor_count": 2 },
            "calibration": { "directory": "/data/calibration" },
            "store": { "backend": "log", "enabled": false }
        }"#;
        let result = parse_json(content);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        assert!(!result.unwrap().store.enabled);
    }

    #[test]
    fn test_parse_toml_syntax_error() {
        let content = "invalid toml [[[";
        let result = parse_toml(content);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_unknown_enum_value_is_parse_error() {
        let content = r#"
[capture]
frame_rate_hz = 4.0
failure_policy = "retry_forever"

[calibration]
directory = "cal"
"#;
        assert!(matches!(
            parse_toml(content),
            Err(ContractError::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            ConfigFormat::from_extension("toml"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("TOML"),
            Some(ConfigFormat::Toml)
        );
        assert_eq!(
            ConfigFormat::from_extension("json"),
            Some(ConfigFormat::Json)
        );
        assert_eq!(ConfigFormat::from_extension("cfg"), None);
    }
}
