//! Error types for analysis service calls

use feedflow_core::ExternalError;
use thiserror::Error;

/// Name reported on every error that leaves this crate
pub const SERVICE: &str = "analysis";

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Errors that can occur when calling the analysis service
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Non-success status from the service
    #[error("service error {status}: {message}")]
    Status { status: u16, message: String },

    /// The service is shedding load (HTTP 429)
    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// HTTP transport failure, including timeouts
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<AnalysisError> for ExternalError {
    fn from(err: AnalysisError) -> Self {
        let service = SERVICE.to_string();
        match err {
            AnalysisError::Status { status, message } => ExternalError::Status {
                service,
                status,
                message,
            },
            AnalysisError::RateLimitExceeded(message) => {
                ExternalError::QuotaExceeded { service, message }
            }
            AnalysisError::Http(e) => ExternalError::Transport {
                service,
                message: e.to_string(),
            },
            AnalysisError::UnexpectedResponse(message) => {
                ExternalError::InvalidResponse { service, message }
            }
            AnalysisError::Configuration(message) => {
                ExternalError::NotConfigured { service, message }
            }
        }
    }
}
