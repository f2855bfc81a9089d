//! Runtime configuration loaded from TOML.
//!
//! Every section and key is optional; missing values fall back to the
//! defaults documented on each field.
//!
//! ```toml
//! [scheduler]
//! tick_interval_secs = 30
//!
//! [execution]
//! timeout_secs = 600
//!
//! [events]
//! channel_capacity = 1024
//!
//! [logging]
//! level = "info"
//! json = false
//!
//! [database]
//! url = "postgres://localhost/taskforge"
//! ```

use crate::task::services::OrchestrationSettings;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// Path as given by the caller.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The configuration path is not valid UTF-8.
    #[error("config path is not valid UTF-8: {0}")]
    NonUtf8Path(String),

    /// The file is not valid TOML or has unexpected keys.
    #[error("failed to parse config: {0}")]
    Parse(#[source] Box<toml::de::Error>),

    /// A value is outside its permitted range.
    #[error("invalid config value for {key}: {reason}")]
    Invalid {
        /// Dotted key of the offending value.
        key: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskforgeConfig {
    /// Scheduler settings.
    pub scheduler: SchedulerConfig,
    /// Executor run settings.
    pub execution: ExecutionConfig,
    /// Event bus settings.
    pub events: EventsConfig,
    /// Log output settings.
    pub logging: LoggingConfig,
    /// Persistence settings.
    pub database: DatabaseConfig,
}

/// `[scheduler]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Seconds between scheduler ticks. Defaults to 30.
    pub tick_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 30,
        }
    }
}

/// `[execution]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Seconds a run may stay processing before it is failed. Unset
    /// disables the timeout.
    pub timeout_secs: Option<u64>,
}

/// `[events]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventsConfig {
    /// Buffered events per subscriber before slow subscribers lag.
    /// Defaults to 1024.
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset. Defaults to `info`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            json: false,
        }
    }
}

/// `[database]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL. Unset selects in-memory storage.
    pub url: Option<String>,
}

impl TaskforgeConfig {
    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|err| ConfigError::Parse(Box::new(err)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `file_name` from `dir` and parses it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, otherwise
    /// the errors of [`Self::from_toml_str`].
    pub fn load_from_dir(dir: &Dir, file_name: &str) -> Result<Self, ConfigError> {
        let text = dir
            .read_to_string(file_name)
            .map_err(|source| ConfigError::Read {
                path: file_name.to_owned(),
                source,
            })?;
        Self::from_toml_str(&text)
    }

    /// Opens the directory containing `path` and loads the file from it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NonUtf8Path`] for paths that are not UTF-8,
    /// [`ConfigError::Read`] when the directory or file cannot be opened, and
    /// the errors of [`Self::from_toml_str`].
    pub fn load_path(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ConfigError::NonUtf8Path(display.clone()))?;
        let parent = match path.parent().map(Path::to_str) {
            Some(Some("")) | None => ".",
            Some(Some(parent)) => parent,
            Some(None) => return Err(ConfigError::NonUtf8Path(display)),
        };

        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|source| {
            ConfigError::Read {
                path: display.clone(),
                source,
            }
        })?;
        Self::load_from_dir(&dir, file_name)
    }

    /// Returns the scheduler tick period.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.tick_interval_secs)
    }

    /// Returns the orchestration settings derived from this configuration.
    #[must_use]
    pub const fn orchestration_settings(&self) -> OrchestrationSettings {
        OrchestrationSettings {
            execution_timeout: match self.execution.timeout_secs {
                Some(secs) => Some(Duration::from_secs(secs)),
                None => None,
            },
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.tick_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "scheduler.tick_interval_secs",
                reason: "must be at least 1",
            });
        }
        if self.execution.timeout_secs == Some(0) {
            return Err(ConfigError::Invalid {
                key: "execution.timeout_secs",
                reason: "must be at least 1 when set",
            });
        }
        if self.events.channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "events.channel_capacity",
                reason: "must be at least 1",
            });
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "logging.level",
                reason: "must not be empty",
            });
        }
        Ok(())
    }
}
