//! In-memory store

use crate::store::{Store, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feedflow_core::{
    MarketAnalysis, PersistenceError, Recommendation, Source, Transcript, WorkflowExecution,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Anything the memory store keeps in a table
trait Record: Clone {
    fn id(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
}

macro_rules! impl_record {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Record for $ty {
                fn id(&self) -> &str {
                    &self.id
                }

                fn created_at(&self) -> DateTime<Utc> {
                    self.created_at
                }
            }
        )*
    };
}

impl_record!(Source, WorkflowExecution, Transcript, MarketAnalysis, Recommendation);

/// One entity table keyed by id
///
/// `seq` records first insertion so that entities created in the same instant
/// still list in a stable newest-first order. Replacing an entity keeps its seq.
struct Table<T> {
    rows: HashMap<String, (u64, T)>,
    next_seq: u64,
}

impl<T: Record> Table<T> {
    fn new() -> Self {
        Self {
            rows: HashMap::new(),
            next_seq: 0,
        }
    }

    fn upsert(&mut self, value: T) {
        if let Some(row) = self.rows.get_mut(value.id()) {
            row.1 = value;
            return;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.rows.insert(value.id().to_string(), (seq, value));
    }

    fn get(&self, id: &str) -> Option<T> {
        self.rows.get(id).map(|(_, value)| value.clone())
    }

    fn remove(&mut self, id: &str) -> bool {
        self.rows.remove(id).is_some()
    }

    fn select(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        let mut rows: Vec<&(u64, T)> = self.rows.values().filter(|(_, v)| predicate(v)).collect();
        rows.sort_by(|(a_seq, a), (b_seq, b)| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b_seq.cmp(a_seq))
        });
        rows.into_iter().map(|(_, value)| value.clone()).collect()
    }

    fn all(&self) -> Vec<T> {
        self.select(|_| true)
    }
}

struct Tables {
    sources: Table<Source>,
    executions: Table<WorkflowExecution>,
    transcripts: Table<Transcript>,
    analyses: Table<MarketAnalysis>,
    recommendations: Table<Recommendation>,
}

/// Thread-safe in-memory implementation of [`Store`]
///
/// Cloning is cheap and every clone shares the same tables.
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables {
                sources: Table::new(),
                executions: Table::new(),
                transcripts: Table::new(),
                analyses: Table::new(),
                recommendations: Table::new(),
            })),
        }
    }

    /// Create a store pre-populated with sources
    pub async fn with_sources(sources: impl IntoIterator<Item = Source>) -> Self {
        let store = Self::new();
        {
            let mut tables = store.tables.write().await;
            for source in sources {
                tables.sources.upsert(source);
            }
        }
        store
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_source(&self, source: &Source) -> StoreResult<()> {
        self.tables.write().await.sources.upsert(source.clone());
        tracing::debug!(source_id = %source.id, "Stored source");
        Ok(())
    }

    async fn get_source(&self, id: &str) -> StoreResult<Option<Source>> {
        Ok(self.tables.read().await.sources.get(id))
    }

    async fn list_sources(&self) -> StoreResult<Vec<Source>> {
        Ok(self.tables.read().await.sources.all())
    }

    async fn delete_source(&self, id: &str) -> StoreResult<bool> {
        Ok(self.tables.write().await.sources.remove(id))
    }

    async fn upsert_execution(&self, execution: &WorkflowExecution) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.executions.get(&execution.id) {
            if !existing.status.can_transition_to(execution.status) {
                return Err(PersistenceError::InvalidTransition {
                    id: execution.id.clone(),
                    from: existing.status,
                    to: execution.status,
                });
            }
        }
        tables.executions.upsert(execution.clone());
        tracing::debug!(
            execution_id = %execution.id,
            status = %execution.status,
            "Stored execution"
        );
        Ok(())
    }

    async fn get_execution(&self, id: &str) -> StoreResult<Option<WorkflowExecution>> {
        Ok(self.tables.read().await.executions.get(id))
    }

    async fn list_executions(&self) -> StoreResult<Vec<WorkflowExecution>> {
        Ok(self.tables.read().await.executions.all())
    }

    async fn executions_by_source(&self, source_id: &str) -> StoreResult<Vec<WorkflowExecution>> {
        Ok(self
            .tables
            .read()
            .await
            .executions
            .select(|e| e.source_id.as_deref() == Some(source_id)))
    }

    async fn executions_by_item(&self, item_id: &str) -> StoreResult<Vec<WorkflowExecution>> {
        Ok(self
            .tables
            .read()
            .await
            .executions
            .select(|e| e.item_id.as_deref() == Some(item_id)))
    }

    async fn has_execution_for_item(&self, source_id: &str, item_id: &str) -> StoreResult<bool> {
        Ok(self.tables.read().await.executions.rows.values().any(|(_, e)| {
            e.source_id.as_deref() == Some(source_id) && e.item_id.as_deref() == Some(item_id)
        }))
    }

    async fn upsert_transcript(&self, transcript: &Transcript) -> StoreResult<()> {
        self.tables.write().await.transcripts.upsert(transcript.clone());
        Ok(())
    }

    async fn get_transcript(&self, id: &str) -> StoreResult<Option<Transcript>> {
        Ok(self.tables.read().await.transcripts.get(id))
    }

    async fn transcripts_by_execution(&self, execution_id: &str) -> StoreResult<Vec<Transcript>> {
        Ok(self
            .tables
            .read()
            .await
            .transcripts
            .select(|t| t.execution_id == execution_id))
    }

    async fn upsert_market_analysis(&self, analysis: &MarketAnalysis) -> StoreResult<()> {
        self.tables.write().await.analyses.upsert(analysis.clone());
        Ok(())
    }

    async fn get_market_analysis(&self, id: &str) -> StoreResult<Option<MarketAnalysis>> {
        Ok(self.tables.read().await.analyses.get(id))
    }

    async fn list_market_analyses(&self) -> StoreResult<Vec<MarketAnalysis>> {
        Ok(self.tables.read().await.analyses.all())
    }

    async fn analyses_by_transcript(
        &self,
        transcript_id: &str,
    ) -> StoreResult<Vec<MarketAnalysis>> {
        Ok(self
            .tables
            .read()
            .await
            .analyses
            .select(|a| a.transcript_id == transcript_id))
    }

    async fn upsert_recommendation(&self, recommendation: &Recommendation) -> StoreResult<()> {
        self.tables
            .write()
            .await
            .recommendations
            .upsert(recommendation.clone());
        Ok(())
    }

    async fn get_recommendation(&self, id: &str) -> StoreResult<Option<Recommendation>> {
        Ok(self.tables.read().await.recommendations.get(id))
    }

    async fn list_recommendations(&self) -> StoreResult<Vec<Recommendation>> {
        Ok(self.tables.read().await.recommendations.all())
    }

    async fn recommendations_by_analysis(
        &self,
        analysis_id: &str,
    ) -> StoreResult<Vec<Recommendation>> {
        Ok(self
            .tables
            .read()
            .await
            .recommendations
            .select(|r| r.analysis_id == analysis_id))
    }
}
