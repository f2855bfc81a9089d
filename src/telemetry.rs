//! Tracing subscriber installation.

use crate::config::LoggingConfig;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured filter directive does not parse.
    #[error("invalid log filter '{directive}': {source}")]
    Filter {
        /// Directive that failed to parse.
        directive: String,
        /// Parser failure.
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    /// A global subscriber is already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Builds the event filter: `RUST_LOG` when set, otherwise `config.level`.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when `RUST_LOG` is unset and the
/// configured level is not a valid directive.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|source| TelemetryError::Filter {
        directive: config.level.clone(),
        source,
    })
}

/// Installs the global `fmt` subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or a subscriber is
/// already installed.
pub fn init(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|err| TelemetryError::Install(err.to_string()))
}
