//! Server configuration: an optional TOML file plus environment overrides.
//!
//! ```toml
//! bind = "0.0.0.0:8080"
//!
//! [log]
//! filter = "info,ledgerforge_infra=debug"
//! format = "pretty"
//!
//! [posting]
//! bank_prefix = "1100"
//!
//! [posting.category_accounts.software]
//! code = "6700"
//! name = "Software Subscriptions"
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ledgerforge_accounting::PostingPolicy;
use ledgerforge_observability::{LogConfig, LogFormat, ObservabilityError};

pub const CONFIG_PATH_VAR: &str = "LEDGERFORGE_CONFIG";
pub const BIND_VAR: &str = "LEDGERFORGE_BIND";
pub const LOG_FILTER_VAR: &str = "RUST_LOG";
pub const LOG_FORMAT_VAR: &str = "LEDGERFORGE_LOG_FORMAT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid bind address `{value}`: {source}")]
    Bind {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error(transparent)]
    Log(#[from] ObservabilityError),
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub log: LogConfig,
    /// Category, miscellaneous and bank account resolution.
    pub posting: PostingPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log: LogConfig::default(),
            posting: PostingPolicy::default(),
        }
    }
}

impl AppConfig {
    /// Load from `$LEDGERFORGE_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match std::env::var_os(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from `lookup` (the process environment in production).
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(BIND_VAR) {
            self.bind = value.trim().parse().map_err(|source| ConfigError::Bind {
                value: value.clone(),
                source,
            })?;
        }
        if let Some(filter) = lookup(LOG_FILTER_VAR).filter(|f| !f.trim().is_empty()) {
            self.log.filter = filter;
        }
        if let Some(format) = lookup(LOG_FORMAT_VAR) {
            self.log.format = format.parse::<LogFormat>()?;
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bind.port(), 8080);
    }

    #[test]
    fn toml_sections_are_merged_over_defaults() {
        let config = AppConfig::from_toml(
            r#"
            bind = "127.0.0.1:9000"

            [log]
            format = "pretty"

            [posting]
            bank_prefix = "1150"

            [posting.category_accounts.software]
            code = "6700"
            name = "Software Subscriptions"
            "#,
        )
        .unwrap();

        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert_eq!(config.log.filter, "info");
        assert_eq!(config.posting.bank_prefix, "1150");
        assert_eq!(config.posting.account_for_category("Software").code.as_str(), "6700");
        // Replacing the map drops the built-in categories.
        assert_eq!(config.posting.account_for_category("rent").code.as_str(), "6900");
    }

    #[test]
    fn env_overrides_win() {
        let config = AppConfig::default()
            .with_overrides(env(&[
                (BIND_VAR, "127.0.0.1:3000"),
                (LOG_FILTER_VAR, "debug"),
                (LOG_FORMAT_VAR, "pretty"),
            ]))
            .unwrap();

        assert_eq!(config.bind, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(config.log.filter, "debug");
        assert_eq!(config.log.format, LogFormat::Pretty);
    }

    #[test]
    fn bad_values_are_reported() {
        assert!(matches!(
            AppConfig::default().with_overrides(env(&[(BIND_VAR, "localhost")])),
            Err(ConfigError::Bind { .. })
        ));
        assert!(matches!(
            AppConfig::default().with_overrides(env(&[(LOG_FORMAT_VAR, "xml")])),
            Err(ConfigError::Log(_))
        ));
        assert!(matches!(AppConfig::from_toml("bind = 12"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            AppConfig::from_file(Path::new("/nonexistent/ledgerforge.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
