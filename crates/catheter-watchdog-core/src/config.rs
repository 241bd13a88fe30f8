//! Watchdog configuration.
//!
//! Layering: defaults → TOML file → environment → command line.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schedule::{
    ProtocolThresholds, DEFAULT_BORDERLINE_WINDOW_HOURS, DEFAULT_CHANGE_INTERVAL_HOURS,
};
use crate::workflow::{MonitoringMode, RetryPolicy, WorkflowSettings};

/// Environment variable overriding the FHIR server base URL.
pub const ENV_FHIR_SERVER: &str = "CATHETER_WATCHDOG_FHIR_SERVER";

/// Environment variable overriding the protocol change interval (hours).
pub const ENV_INTERVAL_HOURS: &str = "CATHETER_WATCHDOG_INTERVAL_HOURS";

pub const DEFAULT_FHIR_SERVER: &str = "https://hapi.fhir.org/baseR4";

/// Longest accepted reschedule interval: one year.
pub const MAX_RESCHEDULE_INTERVAL_HOURS: u64 = 24 * 366;

const SECS_PER_HOUR: u64 = 60 * 60;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// FHIR server settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FhirConfig {
    /// Base URL of the FHIR R4 endpoint
    pub server: String,
    /// `Device?type=` search token
    pub device_type: String,
    /// Optional SNOMED CT code the device type must carry (e.g. 303620002)
    pub device_code: Option<String>,
    /// Entries per discovery page
    pub page_size: u32,
    /// Upper bound on discovery pages followed
    pub max_pages: u32,
    pub request_timeout_secs: u64,
}

impl Default for FhirConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_FHIR_SERVER.to_string(),
            device_type: "catheter".to_string(),
            device_code: None,
            page_size: 50,
            max_pages: 20,
            request_timeout_secs: 30,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WatchdogConfig {
    /// Hospital protocol interval (hours)
    pub change_interval_hours: f64,
    /// Warning window before the interval (hours); 0 disables borderline
    pub borderline_window_hours: f64,
    /// Delay between checks of the same patient (hours)
    pub reschedule_interval_hours: u64,
    pub mode: MonitoringMode,
    pub fhir: FhirConfig,
    pub retry: RetryPolicy,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            change_interval_hours: DEFAULT_CHANGE_INTERVAL_HOURS,
            borderline_window_hours: DEFAULT_BORDERLINE_WINDOW_HOURS,
            reschedule_interval_hours: 24,
            mode: MonitoringMode::default(),
            fhir: FhirConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl WatchdogConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(server) = lookup(ENV_FHIR_SERVER) {
            self.fhir.server = server;
        }
        if let Some(raw) = lookup(ENV_INTERVAL_HOURS) {
            self.change_interval_hours = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_INTERVAL_HOURS.to_string(),
                reason: format!("not a number: {:?}", raw),
            })?;
        }
        Ok(())
    }

    /// Reject settings the workflow cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |key: &str, reason: &str| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: reason.to_string(),
        };

        if !(self.change_interval_hours.is_finite() && self.change_interval_hours > 0.0) {
            return Err(invalid("change_interval_hours", "must be a positive number"));
        }
        if !(self.borderline_window_hours.is_finite() && self.borderline_window_hours >= 0.0) {
            return Err(invalid("borderline_window_hours", "must not be negative"));
        }
        if self.borderline_window_hours >= self.change_interval_hours {
            return Err(invalid(
                "borderline_window_hours",
                "must be smaller than change_interval_hours",
            ));
        }
        if self.reschedule_interval_hours == 0 {
            return Err(invalid("reschedule_interval_hours", "must be at least 1"));
        }
        if self.reschedule_interval_hours > MAX_RESCHEDULE_INTERVAL_HOURS {
            return Err(ConfigError::InvalidValue {
                key: "reschedule_interval_hours".to_string(),
                reason: format!("must be at most {}", MAX_RESCHEDULE_INTERVAL_HOURS),
            });
        }
        if self.fhir.server.trim().is_empty() {
            return Err(invalid("fhir.server", "must not be empty"));
        }
        if self.fhir.page_size == 0 {
            return Err(invalid("fhir.page_size", "must be at least 1"));
        }
        Ok(())
    }

    pub fn thresholds(&self) -> ProtocolThresholds {
        ProtocolThresholds::new(self.change_interval_hours, self.borderline_window_hours)
    }

    /// Settings for [`crate::workflow::Watchdog`].
    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            thresholds: self.thresholds(),
            reschedule_interval: Duration::from_secs(
                self.reschedule_interval_hours.saturating_mul(SECS_PER_HOUR),
            ),
            mode: self.mode,
            retry: self.retry.clone(),
        }
    }
}
