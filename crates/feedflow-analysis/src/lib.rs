//! Analysis service client for feedflow
//!
//! [`HttpAnalyzer`] implements [`feedflow_core::Analyzer`] against the service's
//! `POST /process` endpoint.

pub mod client;
pub mod config;
pub mod error;

pub use client::HttpAnalyzer;
pub use config::AnalysisConfig;
pub use error::{AnalysisError, Result};
