//! Workflow execution records and their lifecycle

use crate::error::PersistenceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an execution
///
/// Transitions only move forward: pending -> processing -> completed | failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ExecutionStatus {
    /// Whether the execution has reached an end state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Whether a record in this state may be overwritten with `next`
    ///
    /// Staying in the same state is allowed so that in-place updates (new
    /// foreign keys, a title) can be persisted. Terminal states are final.
    pub fn can_transition_to(&self, next: ExecutionStatus) -> bool {
        if self.is_terminal() {
            return *self == next;
        }
        next.rank() >= self.rank()
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One attempt to run one content item through the analysis pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: String,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub item_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_title: Option<String>,
    /// Owning source; `None` for ad-hoc runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    /// Start a new attempt: status is `processing` and `started_at` is set immediately
    pub fn start(
        id: impl Into<String>,
        item_url: impl Into<String>,
        source_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: ExecutionStatus::Processing,
            item_id: None,
            item_url: item_url.into(),
            item_title: None,
            source_id,
            transcript_id: None,
            analysis_id: None,
            recommendation_id: None,
            error: None,
            created_at: now,
            started_at: Some(now),
            completed_at: None,
        }
    }

    /// Attach the item identifier when known up front
    pub fn with_item_id(mut self, item_id: Option<String>) -> Self {
        self.item_id = item_id;
        self
    }

    /// Attach the item title when known up front
    pub fn with_item_title(mut self, item_title: Option<String>) -> Self {
        self.item_title = item_title;
        self
    }

    fn transition(&mut self, next: ExecutionStatus) -> Result<(), PersistenceError> {
        if !self.status.can_transition_to(next) {
            return Err(PersistenceError::InvalidTransition {
                id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Mark the execution completed
    ///
    /// Requires all three artifact ids; a completed execution never carries an error.
    pub fn complete(&mut self) -> Result<(), PersistenceError> {
        if !self.has_all_artifacts() {
            return Err(PersistenceError::Write {
                entity: crate::EntityKind::Execution,
                id: self.id.clone(),
                reason: "cannot complete an execution with missing artifacts".to_string(),
            });
        }
        self.transition(ExecutionStatus::Completed)?;
        self.error = None;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the execution failed, keeping whatever artifacts were already linked
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), PersistenceError> {
        self.transition(ExecutionStatus::Failed)?;
        let reason = reason.into();
        self.error = Some(if reason.trim().is_empty() {
            "unknown error".to_string()
        } else {
            reason
        });
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Whether transcript, analysis and recommendation ids are all set
    pub fn has_all_artifacts(&self) -> bool {
        self.transcript_id.is_some() && self.analysis_id.is_some() && self.recommendation_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linked(mut execution: WorkflowExecution) -> WorkflowExecution {
        execution.transcript_id = Some("t".to_string());
        execution.analysis_id = Some("a".to_string());
        execution.recommendation_id = Some("r".to_string());
        execution
    }

    #[test]
    fn test_start_is_processing() {
        let execution = WorkflowExecution::start("e1", "https://youtu.be/abcdefghijk", None);
        assert_eq!(execution.status, ExecutionStatus::Processing);
        assert!(execution.started_at.is_some());
        assert!(execution.completed_at.is_none());
    }

    #[test]
    fn test_transitions_are_monotonic() {
        use ExecutionStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Processing.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Failed.can_transition_to(Processing));
        assert!(!Completed.can_transition_to(Failed));
        assert!(Completed.can_transition_to(Completed));
    }

    #[test]
    fn test_complete_requires_artifacts() {
        let mut execution = WorkflowExecution::start("e1", "u", None);
        assert!(execution.complete().is_err());
        assert_eq!(execution.status, ExecutionStatus::Processing);

        let mut execution = linked(execution);
        execution.complete().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(execution.error.is_none());
        assert!(execution.completed_at.is_some());
    }

    #[test]
    fn test_fail_keeps_partial_progress() {
        let mut execution = WorkflowExecution::start("e1", "u", Some("s1".to_string()));
        execution.transcript_id = Some("t".to_string());
        execution.fail("analysis timed out").unwrap();

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.error.as_deref(), Some("analysis timed out"));
        assert_eq!(execution.transcript_id.as_deref(), Some("t"));
    }

    #[test]
    fn test_fail_never_leaves_empty_error() {
        let mut execution = WorkflowExecution::start("e1", "u", None);
        execution.fail("").unwrap();
        assert_eq!(execution.error.as_deref(), Some("unknown error"));
    }

    #[test]
    fn test_terminal_cannot_restart() {
        let mut execution = linked(WorkflowExecution::start("e1", "u", None));
        execution.complete().unwrap();
        let err = execution.fail("late failure").unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidTransition { .. }));
        assert_eq!(execution.status, ExecutionStatus::Completed);
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_string(&ExecutionStatus::Processing).unwrap(),
            "\"processing\""
        );
    }
}
