//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{CaptureBlueprint, FailurePolicy, OverflowPolicy, StoreBackend};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    frame_rate_hz: f64,
    sensor_count: u8,
    trigger_mode: String,
    display: String,
    store: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            field: None,
            warnings: Vec::new(),
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            field: None,
            warnings: collect_warnings(&blueprint),
            summary: Some(ConfigSummary {
                version: format!("{:?}", blueprint.version),
                frame_rate_hz: blueprint.capture.frame_rate_hz,
                sensor_count: blueprint.capture.sensor_count,
                trigger_mode: format!("{:?}", blueprint.capture.trigger_mode),
                display: format!("{:?}", blueprint.display.backend),
                store: format!("{:?}", blueprint.store.backend),
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            field: match &e {
                contracts::ContractError::ConfigValidation { field, .. } => Some(field.clone()),
                _ => None,
            },
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &CaptureBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.capture.failure_policy == FailurePolicy::Abort {
        warnings.push(
            "capture.failure_policy = abort: one slow sensor stops acquisition".to_string(),
        );
    }

    let period_ms = blueprint.capture.period().as_millis() as u64;
    if blueprint.capture.retrieve_timeout_ms < period_ms {
        warnings.push(format!(
            "capture.retrieve_timeout_ms ({}) is shorter than the trigger period ({} ms)",
            blueprint.capture.retrieve_timeout_ms, period_ms
        ));
    }

    let queues = [
        ("trigger", &blueprint.queues.trigger),
        ("display", &blueprint.queues.display),
        ("store", &blueprint.queues.store),
    ];
    for (name, queue) in queues {
        if queue.overflow != OverflowPolicy::Block {
            warnings.push(format!(
                "queues.{name}.overflow = {:?}: pairs may be dropped under load",
                queue.overflow
            ));
        }
    }

    if !blueprint.store.enabled {
        warnings.push("store.enabled = false - pairs will be counted but not saved".to_string());
    } else if blueprint.store.backend == StoreBackend::Log {
        warnings.push("store.backend = log - pairs are logged, not written to disk".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Frame rate: {} Hz", summary.frame_rate_hz);
            println!("  Sensors: {}", summary.sensor_count);
            println!("  Trigger: {}", summary.trigger_mode);
            println!("  Display: {}", summary.display);
            println!("  Store: {}", summary.store);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
