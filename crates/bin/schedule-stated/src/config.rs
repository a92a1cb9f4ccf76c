//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `schedule-state.toml` in the working directory unless another
//! path is given. Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;

use schedule_state_domain::error::ValidationError;
use schedule_state_domain::schedule::ScheduleConfig;

pub const DEFAULT_PATH: &str = "schedule-state.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Tick loop settings.
    pub daemon: DaemonConfig,
    /// One sensor per entry.
    pub schedules: Vec<ScheduleConfig>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Tick loop configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Seconds between two updates of every sensor.
    pub tick_seconds: u64,
}

impl Config {
    /// Load configuration from `path` (or `schedule-state.toml`) if present,
    /// then apply environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path.unwrap_or(Path::new(DEFAULT_PATH)))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SCHEDULE_STATE_TICK_SECONDS") {
            if let Ok(seconds) = val.parse() {
                self.daemon.tick_seconds = seconds;
            }
        }
        if let Ok(val) = std::env::var("SCHEDULE_STATE_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.daemon.tick_seconds == 0 {
            return Err(ConfigError::ZeroTick);
        }
        let mut names = BTreeSet::new();
        for schedule in &self.schedules {
            schedule
                .validate()
                .map_err(|source| ConfigError::Schedule {
                    name: schedule.name.clone(),
                    source,
                })?;
            if !names.insert(schedule.name.as_str()) {
                return Err(ConfigError::DuplicateSchedule(schedule.name.clone()));
            }
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "schedule_stated=info,schedule_state_app=info".to_string(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { tick_seconds: 60 }
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
    /// A schedule failed its own validation.
    #[error("invalid schedule `{name}`")]
    Schedule {
        name: String,
        #[source]
        source: ValidationError,
    },
    /// Two schedules share a name.
    #[error("schedule `{0}` is declared more than once")]
    DuplicateSchedule(String),
    /// The tick loop would spin.
    #[error("daemon.tick_seconds must be non-zero")]
    ZeroTick,
}
