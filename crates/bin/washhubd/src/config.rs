//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `washhub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::time::Duration;

use serde::Deserialize;
use washhub_adapter_fhem::FhemConfig;
use washhub_domain::device::Device;
use washhub_domain::error::WashHubError;
use washhub_domain::program::{Program, ProgramKind};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Controller connection.
    pub fhem: FhemConfig,
    /// Execution lifecycle settings.
    pub executions: ExecutionsConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Devices seeded into the in-memory collaborator.
    pub demo: DemoConfig,
}

/// Execution lifecycle settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ExecutionsConfig {
    /// Seconds between two safety sweeps over the managed devices.
    pub safety_sweep_interval_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Demo data.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub devices: Vec<DemoDevice>,
    /// Execution started on one of the seeded devices at boot.
    pub execution: Option<DemoExecution>,
}

/// An execution started when the daemon boots.
#[derive(Debug, Deserialize)]
pub struct DemoExecution {
    /// Name of a `[[demo.devices]]` entry.
    pub device: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
    #[serde(default)]
    pub auto_end: bool,
}

fn default_user() -> String {
    "demo".to_string()
}

fn default_program() -> String {
    "Demo".to_string()
}

fn default_duration_secs() -> u64 {
    30 * 60
}

impl DemoExecution {
    /// Build the program to run.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty name or a zero duration.
    pub fn to_program(&self) -> Result<Program, WashHubError> {
        let kind = if self.auto_end {
            ProgramKind::Dynamic
        } else {
            ProgramKind::Fixed
        };
        Program::builder()
            .name(&self.program)
            .kind(kind)
            .auto_end(self.auto_end)
            .max_duration(Duration::from_secs(self.duration_secs))
            .build()
    }
}

/// One seeded device.
#[derive(Debug, Deserialize)]
pub struct DemoDevice {
    pub name: String,
    pub switch_name: String,
    pub power_name: String,
    #[serde(default = "default_threshold")]
    pub auto_end_threshold: f64,
}

fn default_threshold() -> f64 {
    5.0
}

impl DemoDevice {
    /// Build the domain device.
    ///
    /// # Errors
    ///
    /// Returns a validation error when a name is empty or the threshold is
    /// invalid.
    pub fn to_device(&self) -> Result<Device, WashHubError> {
        Device::builder()
            .name(&self.name)
            .switch_name(&self.switch_name)
            .power_name(&self.power_name)
            .auto_end_threshold(self.auto_end_threshold)
            .build()
    }
}

impl Config {
    /// Load configuration from `washhub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("washhub.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("WASHHUB_FHEM_HOST") {
            self.fhem.host = val;
        }
        if let Ok(val) = std::env::var("WASHHUB_FHEM_PORT")
            && let Ok(port) = val.parse()
        {
            self.fhem.port = port;
        }
        if let Ok(val) = std::env::var("WASHHUB_DRY_RUN") {
            self.fhem.dry_run = matches!(val.as_str(), "1" | "true" | "yes");
        }
        if let Ok(val) = std::env::var("WASHHUB_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.fhem.port == 0 {
            return Err(ConfigError::Validation(
                "fhem port must be non-zero".to_string(),
            ));
        }
        if self.fhem.min_response_timeout_ms > self.fhem.response_timeout_ms {
            return Err(ConfigError::Validation(
                "fhem min_response_timeout_ms must not exceed response_timeout_ms".to_string(),
            ));
        }
        if self.executions.safety_sweep_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "safety_sweep_interval_secs must be non-zero".to_string(),
            ));
        }
        if let Some(execution) = &self.demo.execution
            && !self.demo.devices.iter().any(|d| d.name == execution.device)
        {
            return Err(ConfigError::Validation(format!(
                "demo execution device {} is not a demo device",
                execution.device
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn safety_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.executions.safety_sweep_interval_secs)
    }

    /// Domain devices for the `[demo]` section.
    ///
    /// # Errors
    ///
    /// Returns the first device that fails validation.
    pub fn demo_devices(&self) -> Result<Vec<Device>, WashHubError> {
        self.demo.devices.iter().map(DemoDevice::to_device).collect()
    }
}

impl Default for ExecutionsConfig {
    fn default() -> Self {
        Self {
            safety_sweep_interval_secs: washhub_app::services::DEFAULT_SWEEP_INTERVAL.as_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "washhubd=info,washhub=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
