//! `run` command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use capture::{MockCameraConfig, MockCameraDriver};
use contracts::{CaptureBlueprint, StoreBackend, TriggerMode};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ref output) = args.output {
        info!(output = %output.display(), "Overriding store output from CLI");
        blueprint.store.backend = StoreBackend::File;
        blueprint.store.base_path = Some(output.clone());
    }
    if args.start_saving {
        blueprint.store.start_saving = true;
    }
    config_loader::ConfigLoader::validate(&blueprint)
        .context("Configuration invalid after CLI overrides")?;

    info!(
        frame_rate_hz = blueprint.capture.frame_rate_hz,
        sensors = blueprint.capture.sensor_count,
        trigger_mode = ?blueprint.capture.trigger_mode,
        failure_policy = ?blueprint.capture.failure_policy,
        display = ?blueprint.display.backend,
        store = ?blueprint.store.backend,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    if !args.mock {
        return Err(CliError::NoDriver.into());
    }
    info!("Running with MOCK cameras");
    let driver = Arc::new(MockCameraDriver::new(mock_config(&blueprint)));

    let pipeline = Pipeline::new(
        PipelineConfig {
            blueprint,
            max_frames: (args.max_frames > 0).then_some(args.max_frames),
            timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
            identity_calibration: args.identity_calibration,
        },
        driver.clone(),
        driver,
    );

    let interrupt = pipeline.interrupt();
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, stopping after the current pair...");
        interrupt.request_exit();
    });

    info!("Starting pipeline...");
    let result = tokio::task::spawn_blocking(move || pipeline.run())
        .await
        .context("Pipeline supervisor task failed")?;
    signal_task.abort();

    let stats = result.context("Pipeline execution failed")?;
    stats.print_summary();

    if let Some(fatal) = &stats.acquirer.fatal {
        anyhow::bail!("acquisition stopped: {fatal}");
    }

    info!("pairgrab finished");
    Ok(())
}

/// Mock rig matching the configured sensor geometry
fn mock_config(blueprint: &CaptureBlueprint) -> MockCameraConfig {
    let (width, height) = (blueprint.sensor.width, blueprint.sensor.height);
    let mut config = if blueprint.capture.sensor_count == 1 {
        MockCameraConfig::single(width, height)
    } else {
        MockCameraConfig::pair(width, height)
    };
    if blueprint.capture.trigger_mode == TriggerMode::ExternalLine {
        config = config.with_line_trigger(blueprint.capture.period());
    }
    config
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &CaptureBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Capture:");
    println!("  Frame rate: {} Hz", blueprint.capture.frame_rate_hz);
    println!("  Sensors: {}", blueprint.capture.sensor_count);
    println!("  Trigger: {:?}", blueprint.capture.trigger_mode);
    println!("  Failure policy: {:?}", blueprint.capture.failure_policy);
    println!(
        "\nSensor: {}x{} {:?}",
        blueprint.sensor.width, blueprint.sensor.height, blueprint.sensor.bayer_pattern
    );
    println!("\nDisplay: {:?}", blueprint.display.backend);
    println!(
        "Store: {:?} (enabled: {}, start saving: {})",
        blueprint.store.backend, blueprint.store.enabled, blueprint.store.start_saving
    );
    println!();
}
