//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{CaptureBlueprint, QueueConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    capture: CaptureInfo,
    sensor: SensorInfo,
    queues: Vec<QueueInfo>,
    calibration: CalibrationInfo,
    display: String,
    store: StoreInfo,
}

#[derive(Serialize)]
struct CaptureInfo {
    frame_rate_hz: f64,
    period_ms: f64,
    sensor_count: u8,
    trigger_mode: String,
    group_key: String,
    retrieve_timeout_ms: u64,
    failure_policy: String,
}

#[derive(Serialize)]
struct SensorInfo {
    width: u32,
    height: u32,
    bayer_pattern: String,
    exposure_us: f64,
    gain: i64,
}

#[derive(Serialize)]
struct QueueInfo {
    name: &'static str,
    capacity: usize,
    overflow: String,
}

#[derive(Serialize)]
struct CalibrationInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    directory: Option<String>,
    explicit_slots: usize,
    interpolation: String,
}

#[derive(Serialize)]
struct StoreInfo {
    backend: String,
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_path: Option<String>,
    format: String,
    start_saving: bool,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn queue_info(name: &'static str, queue: &QueueConfig) -> QueueInfo {
    QueueInfo {
        name,
        capacity: queue.capacity,
        overflow: format!("{:?}", queue.overflow),
    }
}

fn build_config_info(blueprint: &CaptureBlueprint) -> ConfigInfo {
    let capture = &blueprint.capture;
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        capture: CaptureInfo {
            frame_rate_hz: capture.frame_rate_hz,
            period_ms: capture.period().as_secs_f64() * 1000.0,
            sensor_count: capture.sensor_count,
            trigger_mode: format!("{:?}", capture.trigger_mode),
            group_key: capture.group_key.to_string(),
            retrieve_timeout_ms: capture.retrieve_timeout_ms,
            failure_policy: format!("{:?}", capture.failure_policy),
        },
        sensor: SensorInfo {
            width: blueprint.sensor.width,
            height: blueprint.sensor.height,
            bayer_pattern: format!("{:?}", blueprint.sensor.bayer_pattern),
            exposure_us: blueprint.sensor.exposure_us,
            gain: blueprint.sensor.gain,
        },
        queues: vec![
            queue_info("trigger", &blueprint.queues.trigger),
            queue_info("display", &blueprint.queues.display),
            queue_info("store", &blueprint.queues.store),
        ],
        calibration: CalibrationInfo {
            directory: blueprint
                .calibration
                .directory
                .as_ref()
                .map(|d| d.display().to_string()),
            explicit_slots: blueprint.calibration.slots.len(),
            interpolation: format!("{:?}", blueprint.calibration.interpolation),
        },
        display: format!("{:?}", blueprint.display.backend),
        store: StoreInfo {
            backend: format!("{:?}", blueprint.store.backend),
            enabled: blueprint.store.enabled,
            base_path: blueprint
                .store
                .base_path
                .as_ref()
                .map(|p| p.display().to_string()),
            format: format!("{:?}", blueprint.store.format),
            start_saving: blueprint.store.start_saving,
        },
    }
}

fn print_config_info(blueprint: &CaptureBlueprint) {
    let info = build_config_info(blueprint);

    println!("=== pairgrab Configuration ===\n");

    println!("Capture");
    println!("   ├─ Version: {}", info.version);
    println!(
        "   ├─ Rate: {} Hz ({:.1} ms period)",
        info.capture.frame_rate_hz, info.capture.period_ms
    );
    println!("   ├─ Sensors: {}", info.capture.sensor_count);
    println!(
        "   ├─ Trigger: {} (group {})",
        info.capture.trigger_mode, info.capture.group_key
    );
    println!("   ├─ Retrieve timeout: {} ms", info.capture.retrieve_timeout_ms);
    println!("   └─ Failure policy: {}", info.capture.failure_policy);

    println!("\nSensor");
    println!(
        "   ├─ Geometry: {}x{} {}",
        info.sensor.width, info.sensor.height, info.sensor.bayer_pattern
    );
    println!(
        "   └─ Exposure: {} us, gain {}",
        info.sensor.exposure_us, info.sensor.gain
    );

    println!("\nQueues");
    for (i, queue) in info.queues.iter().enumerate() {
        let prefix = if i == info.queues.len() - 1 { "└─" } else { "├─" };
        println!(
            "   {} {}: capacity {} ({})",
            prefix, queue.name, queue.capacity, queue.overflow
        );
    }

    println!("\nCalibration");
    match &info.calibration.directory {
        Some(dir) => println!("   ├─ Directory: {}", dir),
        None => println!("   ├─ Directory: (none)"),
    }
    println!("   ├─ Explicit slots: {}", info.calibration.explicit_slots);
    println!("   └─ Interpolation: {}", info.calibration.interpolation);

    println!("\nOutput");
    println!("   ├─ Display: {}", info.display);
    println!(
        "   └─ Store: {} ({}, enabled: {}, start saving: {})",
        info.store.backend,
        info.store.base_path.as_deref().unwrap_or("-"),
        info.store.enabled,
        info.store.start_saving
    );

    println!();
}
