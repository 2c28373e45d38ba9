//! Scheduler configuration

use crate::cron::validate_schedule;
use feedflow_core::{Error, Result};
use std::time::Duration;

/// Environment variable toggling timer registration
pub const SCHEDULE_ENABLED_ENV: &str = "WORKFLOW_SCHEDULE_ENABLED";
/// Environment variable holding the process-wide default schedule
pub const DEFAULT_SCHEDULE_ENV: &str = "WORKFLOW_DEFAULT_SCHEDULE";

/// Largest batch a single list call may return
pub const MAX_BATCH_SIZE: u32 = 50;

/// Configuration for the source scheduler
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Register per-source timers at startup
    pub enabled: bool,

    /// Schedule used by sources without their own
    pub default_schedule: String,

    /// Pause before each list call, to stay under the resolver's soft limits
    pub list_delay: Duration,

    /// Maximum items requested per tick
    pub max_batch_size: u32,

    /// Consecutive write failures after which the scheduler stops accepting ticks
    pub write_failure_threshold: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_schedule: "0 9 * * *".to_string(),
            list_delay: Duration::from_millis(100),
            max_batch_size: MAX_BATCH_SIZE,
            write_failure_threshold: 5,
        }
    }
}

impl SchedulerConfig {
    /// Create a new configuration builder
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }

    /// Defaults overridden by variables read through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(raw) = lookup(SCHEDULE_ENABLED_ENV) {
            let enabled = match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                other => {
                    return Err(Error::Validation(format!(
                        "{SCHEDULE_ENABLED_ENV} must be true or false, got '{other}'"
                    )));
                }
            };
            builder = builder.enabled(enabled);
        }

        if let Some(schedule) = lookup(DEFAULT_SCHEDULE_ENV).filter(|s| !s.trim().is_empty()) {
            builder = builder.default_schedule(schedule.trim());
        }

        builder.build()
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_schedule(&self.default_schedule)?;

        if self.max_batch_size == 0 || self.max_batch_size > MAX_BATCH_SIZE {
            return Err(Error::Validation(format!(
                "max_batch_size must be between 1 and {MAX_BATCH_SIZE}"
            )));
        }

        if self.write_failure_threshold == 0 {
            return Err(Error::Validation(
                "write_failure_threshold must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for SchedulerConfig
#[derive(Debug, Default)]
pub struct SchedulerConfigBuilder {
    enabled: Option<bool>,
    default_schedule: Option<String>,
    list_delay: Option<Duration>,
    max_batch_size: Option<u32>,
    write_failure_threshold: Option<u32>,
}

impl SchedulerConfigBuilder {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn default_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.default_schedule = Some(schedule.into());
        self
    }

    pub fn list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    pub fn max_batch_size(mut self, size: u32) -> Self {
        self.max_batch_size = Some(size);
        self
    }

    pub fn write_failure_threshold(mut self, threshold: u32) -> Self {
        self.write_failure_threshold = Some(threshold);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<SchedulerConfig> {
        let defaults = SchedulerConfig::default();

        let config = SchedulerConfig {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            default_schedule: self.default_schedule.unwrap_or(defaults.default_schedule),
            list_delay: self.list_delay.unwrap_or(defaults.list_delay),
            max_batch_size: self.max_batch_size.unwrap_or(defaults.max_batch_size),
            write_failure_threshold: self
                .write_failure_threshold
                .unwrap_or(defaults.write_failure_threshold),
        };

        config.validate()?;
        Ok(config)
    }
}
