//! Acquisition metadata.
//!
//! An [`Acquisition`] describes one configured data-collection session: what is being
//! measured (chemistry parameters), on which device profile, and for how long. Several
//! acquisitions can be created at once from a template with [`Acquisition::batch`];
//! their names are numbered with zero padding so they sort naturally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{AcquisitionError, AppResult};
use crate::validation::is_not_empty;

/// Metadata of one acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Acquisition {
    /// Unique id, fresh for every acquisition in a batch.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Name of the devices profile the acquisition runs on.
    pub devices_profile: Option<String>,
    /// Planned length of the run, in milliseconds.
    pub duration_ms: u64,
    /// Stop automatically once `duration_ms` has elapsed.
    pub auto_stop: bool,
    /// Sample amount.
    pub amount: Option<f32>,
    /// Analysis method name.
    pub analysis: String,
    /// Chromatographic column.
    pub column: String,
    /// Detection method (e.g. UV 254 nm).
    pub detection: String,
    /// Mobile phase flow rate.
    pub flow_rate: Option<f32>,
    /// Unit of `flow_rate`.
    pub flow_rate_unit: String,
    /// Mobile phase composition.
    pub mobile_phase: String,
    /// Column temperature.
    pub temperature: Option<f32>,
    /// Unit of `temperature`.
    pub temperature_unit: String,
    /// Internal standard amount.
    pub istd_amount: Option<f32>,
    /// Injected sample volume.
    pub injection_volume: Option<f32>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Default for Acquisition {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: "Acquisition".to_string(),
            description: String::new(),
            devices_profile: None,
            duration_ms: 0,
            auto_stop: false,
            amount: None,
            analysis: String::new(),
            column: String::new(),
            detection: String::new(),
            flow_rate: None,
            flow_rate_unit: "ml/min".to_string(),
            mobile_phase: String::new(),
            temperature: None,
            temperature_unit: "°C".to_string(),
            istd_amount: None,
            injection_volume: None,
            created_at: Utc::now(),
        }
    }
}

impl Acquisition {
    /// Start building an acquisition from the defaults.
    pub fn builder() -> AcquisitionBuilder {
        AcquisitionBuilder::default()
    }

    /// Planned run length.
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Validates the metadata.
    pub fn validate(&self) -> AppResult<()> {
        is_not_empty(&self.name).map_err(|e| {
            AcquisitionError::InvalidConfiguration(format!("acquisition name: {e}"))
        })?;
        if self.auto_stop && self.duration_ms == 0 {
            return Err(AcquisitionError::InvalidConfiguration(format!(
                "acquisition '{}' has auto-stop enabled but no duration",
                self.name
            )));
        }
        let quantities = [
            ("amount", self.amount),
            ("flow rate", self.flow_rate),
            ("ISTD amount", self.istd_amount),
            ("injection volume", self.injection_volume),
        ];
        for (label, value) in quantities {
            if matches!(value, Some(v) if !(v.is_finite() && v >= 0.0)) {
                return Err(AcquisitionError::InvalidConfiguration(format!(
                    "acquisition '{}': {label} must be a non-negative number",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Names for a batch of `count` acquisitions derived from `name`.
    ///
    /// A single acquisition keeps the bare name. Otherwise the 1-based index is appended,
    /// zero-padded to the digit count of `count`: `run` ×12 gives `run01` … `run12`.
    /// An empty name is never numbered.
    pub fn batch_names(name: &str, count: usize) -> Vec<String> {
        if count == 1 || name.is_empty() {
            return vec![name.to_string(); count];
        }
        let width = count.to_string().len();
        (1..=count)
            .map(|index| format!("{name}{index:0width$}"))
            .collect()
    }

    /// `count` copies of `template`, each with a fresh id and a batch name.
    pub fn batch(template: &Acquisition, count: usize) -> Vec<Acquisition> {
        Self::batch_names(&template.name, count)
            .into_iter()
            .map(|name| Acquisition {
                id: Uuid::new_v4(),
                name,
                created_at: Utc::now(),
                ..template.clone()
            })
            .collect()
    }
}

/// A builder for constructing [`Acquisition`] instances.
#[derive(Default)]
pub struct AcquisitionBuilder {
    inner: Acquisition,
}

impl AcquisitionBuilder {
    /// Builder starting from `Acquisition::default()`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name.
    pub fn name(mut self, name: &str) -> Self {
        self.inner.name = name.to_string();
        self
    }

    /// Set the description.
    pub fn description(mut self, description: &str) -> Self {
        self.inner.description = description.to_string();
        self
    }

    /// Set the devices profile name.
    pub fn devices_profile(mut self, profile: &str) -> Self {
        self.inner.devices_profile = Some(profile.to_string());
        self
    }

    /// Run for `duration`, stopping automatically when `auto_stop` is set.
    pub fn duration(mut self, duration: Duration, auto_stop: bool) -> Self {
        self.inner.duration_ms = duration.as_millis() as u64;
        self.inner.auto_stop = auto_stop;
        self
    }

    /// Set the sample amount.
    pub fn amount(mut self, amount: f32) -> Self {
        self.inner.amount = Some(amount);
        self
    }

    /// Set the analysis method.
    pub fn analysis(mut self, analysis: &str) -> Self {
        self.inner.analysis = analysis.to_string();
        self
    }

    /// Set the column.
    pub fn column(mut self, column: &str) -> Self {
        self.inner.column = column.to_string();
        self
    }

    /// Set the detection method.
    pub fn detection(mut self, detection: &str) -> Self {
        self.inner.detection = detection.to_string();
        self
    }

    /// Flow rate and its unit.
    pub fn flow_rate(mut self, value: f32, unit: &str) -> Self {
        self.inner.flow_rate = Some(value);
        self.inner.flow_rate_unit = unit.to_string();
        self
    }

    /// Set the mobile phase.
    pub fn mobile_phase(mut self, mobile_phase: &str) -> Self {
        self.inner.mobile_phase = mobile_phase.to_string();
        self
    }

    /// Temperature and its unit.
    pub fn temperature(mut self, value: f32, unit: &str) -> Self {
        self.inner.temperature = Some(value);
        self.inner.temperature_unit = unit.to_string();
        self
    }

    /// Set the internal standard amount.
    pub fn istd_amount(mut self, amount: f32) -> Self {
        self.inner.istd_amount = Some(amount);
        self
    }

    /// Set the injection volume.
    pub fn injection_volume(mut self, volume: f32) -> Self {
        self.inner.injection_volume = Some(volume);
        self
    }

    /// Finish building.
    pub fn build(self) -> Acquisition {
        self.inner
    }
}
