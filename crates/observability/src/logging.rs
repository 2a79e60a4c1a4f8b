//! Logging configuration.

use serde::{Deserialize, Serialize};

/// Output encoding for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line human-readable output for local runs.
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directives, e.g. `info,ledgerforge_infra=debug`.
    pub filter: String,
    pub format: LogFormat,
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Json,
            with_target: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ObservabilityError;

    #[test]
    fn defaults_to_json_at_info() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter, "info");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config: LogConfig = serde_json::from_str(r#"{ "format": "pretty" }"#).unwrap();
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.filter, "info");
        assert!(!config.with_target);
    }

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!(" JSON ".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!(matches!(
            "xml".parse::<LogFormat>(),
            Err(ObservabilityError::Format(f)) if f == "xml"
        ));
    }

    #[test]
    fn bad_filter_is_reported() {
        let config = LogConfig {
            filter: "ledgerforge=loud".to_string(),
            ..LogConfig::default()
        };
        // RUST_LOG is not set under `cargo test` by default; if it is, init
        // takes the env filter and succeeds.
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(matches!(crate::init(&config), Err(ObservabilityError::Filter { .. })));
        }
    }
}
