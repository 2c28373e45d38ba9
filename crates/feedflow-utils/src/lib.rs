//! Shared utilities for feedflow
//!
//! Logging setup and application-level configuration used by the binary and
//! by any embedding service.

pub mod config;
pub mod logging;

pub use config::{Config, ConfigError};
pub use logging::{LogFormat, init_tracing};
