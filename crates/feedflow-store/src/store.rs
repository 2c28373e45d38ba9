//! The persistence contract

use async_trait::async_trait;
use feedflow_core::{
    MarketAnalysis, PersistenceError, Recommendation, Source, Transcript, WorkflowExecution,
};

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, PersistenceError>;

/// Storage for sources, executions and analysis artifacts
///
/// Every `upsert_*` creates the entity when absent and fully replaces it when
/// present. Every `list_*` and by-parent lookup returns entities newest first
/// by creation time. Implementations must be safe to call concurrently.
#[async_trait]
pub trait Store: Send + Sync {
    // Sources

    async fn upsert_source(&self, source: &Source) -> StoreResult<()>;

    async fn get_source(&self, id: &str) -> StoreResult<Option<Source>>;

    async fn list_sources(&self) -> StoreResult<Vec<Source>>;

    /// Remove a source; executions that reference it are left in place
    ///
    /// Returns whether the source existed.
    async fn delete_source(&self, id: &str) -> StoreResult<bool>;

    // Executions

    /// Write an execution
    ///
    /// Rejects a write that would move an existing record backwards through
    /// its lifecycle with [`PersistenceError::InvalidTransition`].
    async fn upsert_execution(&self, execution: &WorkflowExecution) -> StoreResult<()>;

    async fn get_execution(&self, id: &str) -> StoreResult<Option<WorkflowExecution>>;

    async fn list_executions(&self) -> StoreResult<Vec<WorkflowExecution>>;

    async fn executions_by_source(&self, source_id: &str) -> StoreResult<Vec<WorkflowExecution>>;

    async fn executions_by_item(&self, item_id: &str) -> StoreResult<Vec<WorkflowExecution>>;

    /// Whether any execution links `source_id` and `item_id`
    async fn has_execution_for_item(&self, source_id: &str, item_id: &str) -> StoreResult<bool>;

    // Artifacts

    async fn upsert_transcript(&self, transcript: &Transcript) -> StoreResult<()>;

    async fn get_transcript(&self, id: &str) -> StoreResult<Option<Transcript>>;

    async fn transcripts_by_execution(&self, execution_id: &str) -> StoreResult<Vec<Transcript>>;

    async fn upsert_market_analysis(&self, analysis: &MarketAnalysis) -> StoreResult<()>;

    async fn get_market_analysis(&self, id: &str) -> StoreResult<Option<MarketAnalysis>>;

    async fn list_market_analyses(&self) -> StoreResult<Vec<MarketAnalysis>>;

    async fn analyses_by_transcript(&self, transcript_id: &str)
    -> StoreResult<Vec<MarketAnalysis>>;

    async fn upsert_recommendation(&self, recommendation: &Recommendation) -> StoreResult<()>;

    async fn get_recommendation(&self, id: &str) -> StoreResult<Option<Recommendation>>;

    async fn list_recommendations(&self) -> StoreResult<Vec<Recommendation>>;

    async fn recommendations_by_analysis(
        &self,
        analysis_id: &str,
    ) -> StoreResult<Vec<Recommendation>>;
}
