//! Analysis service configuration

use crate::error::{AnalysisError, Result};
use std::time::Duration;

/// Environment variable holding the service base URL
pub const SERVICE_URL_ENV: &str = "WORKFLOW_SERVICE_URL";

const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Where the analysis service lives and how long to wait for it
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub base_url: String,
    /// Analysis can take minutes for long items
    pub request_timeout: Duration,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(5 * 60),
        }
    }
}

impl AnalysisConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Defaults with the base URL read through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        lookup(SERVICE_URL_ENV)
            .filter(|url| !url.trim().is_empty())
            .map_or_else(Self::default, Self::new)
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url).map_err(|e| {
            AnalysisError::Configuration(format!("invalid base_url {}: {e}", self.base_url))
        })?;
        if self.request_timeout.is_zero() {
            return Err(AnalysisError::Configuration(
                "request_timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
