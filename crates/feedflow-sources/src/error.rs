//! Error types for the Data API client

use feedflow_core::ExternalError;
use thiserror::Error;

/// Name reported on every error that leaves this crate
pub const SERVICE: &str = "youtube";

/// Data API client errors
#[derive(Debug, Error)]
pub enum SourceError {
    /// The API answered with a non-success status
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Quota exhausted or key rejected for quota reasons (HTTP 403)
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// API key missing or invalid (HTTP 401)
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Lookup succeeded but matched no channel
    #[error("channel not found for {0}")]
    ChannelNotFound(String),

    /// URL shape is not one the resolver understands
    #[error("unsupported URL: {0}")]
    UnsupportedUrl(String),

    /// Network or HTTP transport failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration problem
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for Data API operations
pub type Result<T> = std::result::Result<T, SourceError>;

impl SourceError {
    /// Whether the same request could succeed if retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<SourceError> for ExternalError {
    fn from(err: SourceError) -> Self {
        let service = SERVICE.to_string();
        match err {
            SourceError::QuotaExceeded(message) => ExternalError::QuotaExceeded { service, message },
            SourceError::Unauthorized(message) => ExternalError::Unauthorized { service, message },
            SourceError::Api { status, message } => ExternalError::Status {
                service,
                status,
                message,
            },
            SourceError::ChannelNotFound(what) => ExternalError::NotFound { service, what },
            SourceError::UnsupportedUrl(url) => ExternalError::InvalidResponse {
                service,
                message: format!("unsupported URL: {url}"),
            },
            SourceError::Network(e) => ExternalError::Transport {
                service,
                message: e.to_string(),
            },
            SourceError::Json(e) => ExternalError::InvalidResponse {
                service,
                message: e.to_string(),
            },
            SourceError::Config(message) => ExternalError::NotConfigured { service, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_maps_to_distinguished_case() {
        let err: ExternalError = SourceError::QuotaExceeded("daily limit".to_string()).into();
        assert!(matches!(err, ExternalError::QuotaExceeded { ref service, .. } if service == "youtube"));
    }

    #[test]
    fn test_retryable() {
        assert!(SourceError::Api {
            status: 503,
            message: String::new()
        }
        .is_retryable());
        assert!(!SourceError::QuotaExceeded(String::new()).is_retryable());
        assert!(!SourceError::ChannelNotFound("@x".to_string()).is_retryable());
    }
}
