//! Error types for feedflow-core
//!
//! The taxonomy mirrors how failures surface to callers: precondition failures on
//! manual triggers, resolution failures that abandon a tick, collaborator failures
//! that fail a single execution, and persistence failures that always name the
//! entity they were about.

use crate::execution::{ExecutionStatus, WorkflowExecution};
use std::fmt;
use thiserror::Error;

/// Result type alias for feedflow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for workflow operations
#[derive(Error, Debug)]
pub enum Error {
    /// Manual trigger on an unknown source
    #[error("source not found: {0}")]
    SourceNotFound(String),

    /// Manual trigger on a disabled source
    #[error("source is disabled: {0}")]
    SourceDisabled(String),

    /// The source's stable identifier could not be resolved this tick
    #[error("could not resolve identifier for {url}: {reason}")]
    Resolution { url: String, reason: String },

    /// An external collaborator returned a non-success result
    #[error(transparent)]
    External(#[from] ExternalError),

    /// A store operation failed
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// The scheduler has stopped and no longer accepts ticks
    #[error("scheduler is stopped")]
    SchedulerStopped,

    /// Malformed input such as a bad schedule expression
    #[error("validation failed: {0}")]
    Validation(String),

    /// The execution ran and ended in the failed state
    ///
    /// The record is carried along so callers can inspect partial progress.
    #[error("execution {} failed: {reason}", execution.id)]
    ExecutionFailed {
        execution: Box<WorkflowExecution>,
        reason: String,
    },
}

impl Error {
    /// Whether this error came from a quota or rate exhaustion on a collaborator
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::External(ExternalError::QuotaExceeded { .. }))
    }
}

/// Failures reported by the analysis service or the content-source API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExternalError {
    /// Quota or rate limit exhausted on the remote side
    #[error("{service} quota exceeded: {message}")]
    QuotaExceeded { service: String, message: String },

    /// Credentials rejected by the remote side
    #[error("{service} rejected the credentials: {message}")]
    Unauthorized { service: String, message: String },

    /// Non-success HTTP status
    #[error("{service} returned HTTP {status}: {message}")]
    Status {
        service: String,
        status: u16,
        message: String,
    },

    /// Connection, timeout or other transport failure
    #[error("{service} request failed: {message}")]
    Transport { service: String, message: String },

    /// The remote answered but the payload was unusable
    #[error("{service} returned an invalid response: {message}")]
    InvalidResponse { service: String, message: String },

    /// The lookup succeeded but matched nothing
    #[error("{service} found nothing for {what}")]
    NotFound { service: String, what: String },

    /// The collaborator is not configured in this process
    #[error("{service} is not configured: {message}")]
    NotConfigured { service: String, message: String },
}

impl ExternalError {
    /// Whether retrying the same call later could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Longest response body carried into an error message
pub const MAX_ERROR_BODY_LEN: usize = 500;

/// Cut an error response body down to [`MAX_ERROR_BODY_LEN`] bytes
pub fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LEN {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Entity kinds the store persists, used to label persistence failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Source,
    Execution,
    Transcript,
    MarketAnalysis,
    Recommendation,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Source => "source",
            Self::Execution => "execution",
            Self::Transcript => "transcript",
            Self::MarketAnalysis => "market_analysis",
            Self::Recommendation => "recommendation",
        };
        f.write_str(name)
    }
}

/// Store failures, always tagged with the entity they concern
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// Writing an entity failed
    #[error("failed to write {entity} {id}: {reason}")]
    Write {
        entity: EntityKind,
        id: String,
        reason: String,
    },

    /// Reading entities failed
    #[error("failed to read {entity}: {reason}")]
    Read { entity: EntityKind, reason: String },

    /// A write would move an execution backwards through its lifecycle
    #[error("execution {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: ExecutionStatus,
        to: ExecutionStatus,
    },

    /// Writes kept failing past the configured threshold
    #[error("{consecutive} consecutive write failures, last on {entity} {id}")]
    Escalated {
        consecutive: u32,
        entity: EntityKind,
        id: String,
    },
}

impl PersistenceError {
    /// Entity kind the failure is about
    pub fn entity(&self) -> EntityKind {
        match self {
            Self::Write { entity, .. } | Self::Read { entity, .. } | Self::Escalated { entity, .. } => {
                *entity
            }
            Self::InvalidTransition { .. } => EntityKind::Execution,
        }
    }
}
