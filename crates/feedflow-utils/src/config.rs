//! Application configuration

use crate::logging::LogFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the deployment environment
pub const ENV_VAR: &str = "FEEDFLOW_ENV";
/// Environment variable selecting the log format
pub const LOG_FORMAT_VAR: &str = "FEEDFLOW_LOG_FORMAT";

/// Configuration loading errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Application name
    pub app_name: String,
    /// Environment (development, production, ...)
    pub environment: String,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "feedflow".to_string(),
            environment: "development".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load from variables read through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(env) = lookup(ENV_VAR).filter(|v| !v.trim().is_empty()) {
            config.environment = env.trim().to_string();
        }

        if let Some(raw) = lookup(LOG_FORMAT_VAR) {
            config.log_format = raw.parse().map_err(|reason| ConfigError::InvalidValue {
                key: LOG_FORMAT_VAR.to_string(),
                reason,
            })?;
        }

        Ok(config)
    }

    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert!(!config.is_production());
    }

    #[test]
    fn test_reads_environment() {
        let config = Config::from_lookup(lookup(&[
            (ENV_VAR, "production"),
            (LOG_FORMAT_VAR, "json"),
        ]))
        .unwrap();
        assert!(config.is_production());
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_log_format() {
        let err = Config::from_lookup(lookup(&[(LOG_FORMAT_VAR, "xml")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == LOG_FORMAT_VAR));
    }

    #[test]
    fn test_serde_roundtrip_shape() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["log_format"], "pretty");
    }
}
