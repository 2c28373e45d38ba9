//! Configuration for the Data API client

use crate::error::{Result, SourceError};
use crate::retry::RetryPolicy;
use std::time::Duration;

/// Environment variable holding the Data API key
pub const API_KEY_ENV: &str = "YOUTUBE_API_KEY";

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Data API client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct YouTubeConfig {
    /// API key; without one the client cannot be built
    pub api_key: Option<String>,

    /// Base URL of the Data API
    pub base_url: String,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Sustained request rate allowed by the local limiter
    pub requests_per_second: u32,

    /// How long a resolved handle or custom name stays cached
    pub handle_cache_ttl: Duration,

    /// Retry policy for transient failures
    pub retry: RetryPolicy,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            requests_per_second: 5,
            handle_cache_ttl: Duration::from_secs(24 * 3600),
            retry: RetryPolicy::default(),
        }
    }
}

impl YouTubeConfig {
    /// Create a new configuration builder
    pub fn builder() -> YouTubeConfigBuilder {
        YouTubeConfigBuilder::default()
    }

    /// Defaults plus the API key read through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            api_key: lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()),
            ..Self::default()
        }
    }

    /// Defaults plus the API key from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Whether an API key is present
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.requests_per_second == 0 {
            return Err(SourceError::Config(
                "requests_per_second must be greater than 0".to_string(),
            ));
        }

        if url::Url::parse(&self.base_url).is_err() {
            return Err(SourceError::Config(format!(
                "invalid base_url: {}",
                self.base_url
            )));
        }

        Ok(())
    }
}

/// Builder for YouTubeConfig
#[derive(Debug, Default)]
pub struct YouTubeConfigBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    request_timeout: Option<Duration>,
    requests_per_second: Option<u32>,
    handle_cache_ttl: Option<Duration>,
    retry: Option<RetryPolicy>,
}

impl YouTubeConfigBuilder {
    /// Set the API key
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the per-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the sustained request rate
    pub fn requests_per_second(mut self, rate: u32) -> Self {
        self.requests_per_second = Some(rate);
        self
    }

    /// Set the handle cache TTL
    pub fn handle_cache_ttl(mut self, ttl: Duration) -> Self {
        self.handle_cache_ttl = Some(ttl);
        self
    }

    /// Set the retry policy
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<YouTubeConfig> {
        let defaults = YouTubeConfig::default();

        let config = YouTubeConfig {
            api_key: self.api_key,
            base_url: self.base_url.unwrap_or(defaults.base_url),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            requests_per_second: self
                .requests_per_second
                .unwrap_or(defaults.requests_per_second),
            handle_cache_ttl: self.handle_cache_ttl.unwrap_or(defaults.handle_cache_ttl),
            retry: self.retry.unwrap_or(defaults.retry),
        };

        config.validate()?;
        Ok(config)
    }
}
