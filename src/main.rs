//! CLI Entry Point for chroma-daq
//!
//! Provides a command-line interface for:
//! - Running simulated acquisitions against a mock detector channel
//! - Validating configuration files
//! - Previewing batch acquisition names
//!
//! # Usage
//!
//! Simulate three 5-second acquisitions:
//! ```bash
//! chroma-daq simulate --name caffeine --count 3 --duration-ms 5000
//! ```
//!
//! Check a configuration file:
//! ```bash
//! chroma-daq check-config --config config/acquisition.toml
//! ```

use anyhow::{Context, Result};
use chroma_daq::config::{AppConfig, DEFAULT_CONFIG_PATH};
use chroma_daq::experiment::{Acquisition, AcquisitionRun, CompletedAcquisition};
use chroma_daq::hardware::{ControlDevice, MockSampleSource, SignalPattern};
use chroma_daq::{logging, AcquisitionController, RecordingDefaults};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "chroma-daq")]
#[command(about = "Chromatography acquisition core with a simulated detector", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record simulated acquisitions from a mock detector
    Simulate {
        /// Device ID (defaults to the first enabled device in the config)
        #[arg(long)]
        device: Option<String>,

        /// Acquisition name
        #[arg(long, default_value = "Acquisition")]
        name: String,

        /// Number of acquisitions to run back to back
        #[arg(long, default_value_t = 1)]
        count: usize,

        /// Length of each acquisition
        #[arg(long, default_value_t = 5000)]
        duration_ms: u64,

        /// Override the configured scan delay
        #[arg(long)]
        scan_delay_ms: Option<u64>,

        /// Samples per delivered batch
        #[arg(long, default_value_t = 10)]
        batch_size: usize,

        /// Print completed acquisitions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate the configuration and print the effective values
    CheckConfig,

    /// Print the names a batch of acquisitions would get
    Names {
        name: String,
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    config.validate().context("Invalid configuration")?;
    logging::init_from_config(&config).map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Simulate {
            device,
            name,
            count,
            duration_ms,
            scan_delay_ms,
            batch_size,
            json,
        } => {
            let device = resolve_device(&config, device);
            let mut defaults = config.recording_defaults();
            if let Some(delay) = scan_delay_ms {
                defaults.scan_delay_ms = delay;
            }
            let template = Acquisition::builder()
                .name(&name)
                .devices_profile(&device.id)
                .duration(Duration::from_millis(duration_ms), true)
                .build();
            simulate(device, defaults, template, count, batch_size, json).await
        }
        Commands::CheckConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
            println!("Configuration OK");
            Ok(())
        }
        Commands::Names { name, count } => {
            for name in Acquisition::batch_names(&name, count) {
                println!("{name}");
            }
            Ok(())
        }
    }
}

fn resolve_device(config: &AppConfig, requested: Option<String>) -> ControlDevice {
    match requested {
        Some(id) => config
            .devices
            .iter()
            .map(|def| &def.device)
            .find(|device| device.id == id)
            .cloned()
            .unwrap_or_else(|| ControlDevice::new(id)),
        None => config
            .enabled_devices()
            .first()
            .map(|device| (*device).clone())
            .unwrap_or_else(|| ControlDevice::new("ulad3x")),
    }
}

async fn simulate(
    device: ControlDevice,
    defaults: RecordingDefaults,
    template: Acquisition,
    count: usize,
    batch_size: usize,
    json: bool,
) -> Result<()> {
    let source = Arc::new(MockSampleSource::new(format!("mock:{}", device.id)));
    let controller = AcquisitionController::with_defaults(device, source.clone(), defaults)?;
    let sample_interval = Duration::from_millis(defaults.scan_interval_ms);

    let mut completed = Vec::with_capacity(count);
    for acquisition in Acquisition::batch(&template, count) {
        let mut run = AcquisitionRun::new(acquisition)?;

        let stop = run.stop_handle();
        let ctrl_c = {
            let stop = stop.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    stop.stop();
                }
            })
        };
        let generator =
            source.spawn_generator(SignalPattern::default(), sample_interval, batch_size);

        let result = run.execute(&controller).await;
        generator.abort();
        ctrl_c.abort();

        let done = result?;
        info!(acquisition = %done.acquisition.name, "Run finished");
        if !json {
            print_summary(&done);
        }
        completed.push(done);

        // Ctrl-C ends the whole batch, not just the current run.
        if stop.is_stop_requested() {
            info!("Batch interrupted");
            break;
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&completed)?);
    }
    Ok(())
}

fn print_summary(done: &CompletedAcquisition) {
    let recording = &done.recording;
    let max = recording
        .scans
        .iter()
        .map(|scan| scan.signal)
        .fold(f32::NEG_INFINITY, f32::max);
    println!(
        "{}: {} scans in {} ms (delay {} ms, interval {} ms)",
        done.acquisition.name,
        recording.len(),
        done.elapsed().num_milliseconds(),
        recording.scan_delay_ms,
        recording.scan_interval_ms,
    );
    println!(
        "  last RT {} ms, max signal {:.3}, stop: {:?}",
        recording.last_retention_time().unwrap_or(0),
        if recording.is_empty() { 0.0 } else { max },
        done.stop_reason,
    );
}
