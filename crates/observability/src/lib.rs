//! Process-wide tracing setup shared by the binaries.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod logging;

pub use logging::{LogConfig, LogFormat};

#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("invalid log filter `{filter}`: {source}")]
    Filter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("unknown log format `{0}` (expected `json` or `pretty`)")]
    Format(String),
}

/// Install the global subscriber described by `config`.
///
/// `RUST_LOG`, when set, wins over `config.filter`. Calling this again after
/// a subscriber is installed is a no-op.
pub fn init(config: &LogConfig) -> Result<(), ObservabilityError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|source| ObservabilityError::Filter {
            filter: config.filter.clone(),
            source,
        })?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let installed = match config.format {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Pretty => builder.pretty().try_init().is_ok(),
    };

    if installed {
        tracing::debug!(format = %config.format, filter = %config.filter, "tracing initialized");
    }
    Ok(())
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        })
    }
}

impl FromStr for LogFormat {
    type Err = ObservabilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(ObservabilityError::Format(other.to_string())),
        }
    }
}
