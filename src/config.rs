//! Configuration System using Figment
//!
//! This module provides strongly-typed configuration loading. Configuration is layered:
//! 1. Built-in defaults (`AppConfig::default()`)
//! 2. `config/acquisition.toml` (or any file passed to [`AppConfig::load_from`])
//! 3. Environment variables prefixed with `CHROMA_DAQ_`, nested keys separated by `__`
//!    (e.g. `CHROMA_DAQ_APPLICATION__LOG_LEVEL=debug`)
//!
//! # Example
//! ```no_run
//! use chroma_daq::config::AppConfig;
//!
//! let config = AppConfig::load()?;
//! config.validate()?;
//! println!("Application: {}", config.application.name);
//! # Ok::<(), chroma_daq::error::AcquisitionError>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::controller::RecordingDefaults;
use crate::error::{AcquisitionError, AppResult};
use crate::hardware::ControlDevice;
use crate::recording::{DEFAULT_SCAN_DELAY_MS, DEFAULT_SCAN_INTERVAL_MS};
use crate::validation::{is_not_empty, validate_scan_interval};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/acquisition.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Recording timing defaults
    #[serde(default)]
    pub acquisition: AcquisitionSettings,
    /// Controlled devices
    #[serde(default)]
    pub devices: Vec<DeviceDefinition>,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// Timing defaults applied to every recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionSettings {
    /// Delay before the first sample, in milliseconds
    #[serde(default = "default_scan_delay")]
    pub scan_delay_ms: u64,
    /// Nominal spacing between samples, in milliseconds
    #[serde(default = "default_scan_interval")]
    pub scan_interval_ms: u64,
}

/// Device definition in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDefinition {
    /// Device identity and channel address
    #[serde(flatten)]
    pub device: ControlDevice,
    /// Whether this device is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_scan_delay() -> u64 {
    DEFAULT_SCAN_DELAY_MS
}

fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL_MS
}

fn default_enabled() -> bool {
    true
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "chroma-daq".to_string(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            scan_delay_ms: default_scan_delay(),
            scan_interval_ms: default_scan_interval(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `config/acquisition.toml` and environment variables
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Self::figment(path).extract().map_err(AcquisitionError::from)
    }

    /// The layered provider stack, exposed for callers that add their own layers.
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("CHROMA_DAQ_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        let invalid = |msg: String| Err(AcquisitionError::InvalidConfiguration(msg));

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            return invalid(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.as_str()) {
            return invalid(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            ));
        }

        validate_scan_interval(self.acquisition.scan_interval_ms)?;

        let mut ids = HashSet::new();
        for definition in &self.devices {
            if is_not_empty(&definition.device.id).is_err() {
                return invalid("Device ID cannot be empty".to_string());
            }
            if !ids.insert(&definition.device.id) {
                return invalid(format!("Duplicate device ID: {}", definition.device.id));
            }
        }

        Ok(())
    }

    /// Timing defaults for new controllers.
    pub fn recording_defaults(&self) -> RecordingDefaults {
        RecordingDefaults {
            scan_delay_ms: self.acquisition.scan_delay_ms,
            scan_interval_ms: self.acquisition.scan_interval_ms,
        }
    }

    /// Get all enabled devices
    pub fn enabled_devices(&self) -> Vec<&ControlDevice> {
        self.devices
            .iter()
            .filter(|def| def.enabled)
            .map(|def| &def.device)
            .collect()
    }
}
