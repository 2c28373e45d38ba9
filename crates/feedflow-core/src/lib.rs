//! Domain types and collaborator contracts for feedflow
//!
//! This crate defines the entities the workflow engine and scheduler operate on,
//! the error taxonomy shared by every crate, and the traits external
//! collaborators implement.

pub mod analyzer;
pub mod artifact;
pub mod content;
pub mod context;
pub mod error;
pub mod execution;
pub mod item;
pub mod source;

pub use analyzer::{
    AnalysisOutput, Analyzer, MarketAnalysisOutput, RecommendationOutput, TranscriptOutput,
};
pub use artifact::{MarketAnalysis, Recommendation, SuggestedAction, Transcript, clamp_confidence};
pub use content::{ContentItem, ContentSource};
pub use context::{Holding, HoldingsProvider, PortfolioContext, StaticHoldings};
pub use error::{
    EntityKind, Error, ExternalError, MAX_ERROR_BODY_LEN, PersistenceError, Result, truncate_body,
};
pub use execution::{ExecutionStatus, WorkflowExecution};
pub use source::{Source, SourceKind};
