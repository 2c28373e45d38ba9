//! Administrative service
//!
//! The operations an HTTP layer would expose, as plain async methods over the
//! store, engine and scheduler. Source edits re-register the affected timer.

use crate::cron::validate_schedule;
use crate::engine::Engine;
use crate::scheduler::Scheduler;
use feedflow_core::item::playlist_id_from_url;
use feedflow_core::{
    Error, ExecutionStatus, MarketAnalysis, Recommendation, Result, Source, SourceKind, Transcript,
    WorkflowExecution,
};
use feedflow_store::Store;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

fn default_enabled() -> bool {
    true
}

/// Fields for creating a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSource {
    pub kind: SourceKind,
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl NewSource {
    pub fn new(kind: SourceKind, url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            name: name.into(),
            schedule: None,
            enabled: true,
        }
    }

    pub fn with_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }
}

/// Partial update of a source; unset fields are left alone
///
/// A blank `schedule` clears the override so the default applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUpdate {
    pub kind: Option<SourceKind>,
    pub url: Option<String>,
    pub name: Option<String>,
    pub schedule: Option<String>,
    pub enabled: Option<bool>,
}

/// An execution joined with whichever artifacts exist
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionDetails {
    pub execution: WorkflowExecution,
    pub transcript: Option<Transcript>,
    pub market_analysis: Option<MarketAnalysis>,
    pub recommendation: Option<Recommendation>,
}

/// Aggregate view over stored recommendations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationsSummary {
    pub total: usize,
    pub action_counts: BTreeMap<String, usize>,
    pub average_confidence: f64,
    pub condition_counts: BTreeMap<String, usize>,
    /// Newest recommendations from completed executions
    pub recent: Vec<Recommendation>,
}

/// Administrative facade over the workflow components
#[derive(Clone)]
pub struct WorkflowService {
    store: Arc<dyn Store>,
    engine: Engine,
    scheduler: Scheduler,
}

impl WorkflowService {
    pub fn new(store: Arc<dyn Store>, engine: Engine, scheduler: Scheduler) -> Self {
        Self {
            store,
            engine,
            scheduler,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    // Sources

    pub async fn create_source(&self, new: NewSource) -> Result<Source> {
        validate_source_fields(new.kind, &new.url, &new.name)?;
        let schedule = normalize_schedule(new.schedule)?;

        let mut source = Source::new(Uuid::new_v4().to_string(), new.kind, new.url, new.name)
            .with_enabled(new.enabled);
        source.schedule = schedule;

        self.store.upsert_source(&source).await?;
        info!(source_id = %source.id, kind = %source.kind, url = %source.url, "Source created");
        self.reload(&source.id).await;
        Ok(source)
    }

    pub async fn list_sources(&self) -> Result<Vec<Source>> {
        Ok(self.store.list_sources().await?)
    }

    pub async fn get_source(&self, id: &str) -> Result<Source> {
        self.store
            .get_source(id)
            .await?
            .ok_or_else(|| Error::SourceNotFound(id.to_string()))
    }

    /// Apply `update`; a changed URL or kind drops the cached identifier
    pub async fn update_source(&self, id: &str, update: SourceUpdate) -> Result<Source> {
        let mut source = self.get_source(id).await?;
        let previous_url = source.url.clone();
        let previous_kind = source.kind;

        if let Some(kind) = update.kind {
            source.kind = kind;
        }
        if let Some(url) = update.url {
            source.url = url;
        }
        if let Some(name) = update.name {
            source.name = name;
        }
        if let Some(enabled) = update.enabled {
            source.enabled = enabled;
        }
        if update.schedule.is_some() {
            source.schedule = normalize_schedule(update.schedule)?;
        }
        validate_source_fields(source.kind, &source.url, &source.name)?;

        if source.url != previous_url || source.kind != previous_kind {
            source.resolved_id = None;
        }

        self.store.upsert_source(&source).await?;
        info!(source_id = id, enabled = source.enabled, "Source updated");
        self.reload(id).await;
        Ok(source)
    }

    /// Set or clear a source's schedule override
    pub async fn update_schedule(&self, id: &str, schedule: Option<String>) -> Result<Source> {
        let mut source = self.get_source(id).await?;
        source.schedule = normalize_schedule(schedule)?;
        self.store.upsert_source(&source).await?;
        info!(
            source_id = id,
            schedule = source.schedule.as_deref().unwrap_or("default"),
            "Source schedule updated"
        );
        self.reload(id).await;
        Ok(source)
    }

    /// Delete a source; its executions are left in place
    pub async fn delete_source(&self, id: &str) -> Result<bool> {
        let deleted = self.store.delete_source(id).await?;
        self.scheduler.unregister(id).await;
        if deleted {
            info!(source_id = id, "Source deleted");
        }
        Ok(deleted)
    }

    async fn reload(&self, id: &str) {
        if let Err(e) = self.scheduler.reload_source(id).await {
            warn!(source_id = id, error = %e, "Could not re-register source timer");
        }
    }

    // Triggers

    pub async fn trigger_source(&self, id: &str) -> Result<()> {
        self.scheduler.trigger(id).await
    }

    pub async fn trigger_all(&self) -> Result<usize> {
        self.scheduler.trigger_all().await
    }

    /// Run one item now, optionally attributed to a source
    pub async fn execute(&self, item_url: &str, source_id: Option<&str>) -> Result<WorkflowExecution> {
        if item_url.trim().is_empty() {
            return Err(Error::Validation("item URL must not be empty".to_string()));
        }
        if let Some(source_id) = source_id {
            self.get_source(source_id).await?;
        }
        self.engine.execute(item_url.trim(), source_id).await
    }

    // Executions and artifacts

    /// Executions newest first, optionally for one source
    pub async fn list_executions(
        &self,
        source_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<WorkflowExecution>> {
        let mut executions = match source_id {
            Some(source_id) => self.store.executions_by_source(source_id).await?,
            None => self.store.list_executions().await?,
        };
        if let Some(limit) = limit {
            executions.truncate(limit);
        }
        Ok(executions)
    }

    pub async fn get_execution(&self, id: &str) -> Result<Option<WorkflowExecution>> {
        Ok(self.store.get_execution(id).await?)
    }

    pub async fn execution_details(&self, id: &str) -> Result<Option<ExecutionDetails>> {
        let Some(execution) = self.store.get_execution(id).await? else {
            return Ok(None);
        };

        let transcript = match &execution.transcript_id {
            Some(tid) => self.store.get_transcript(tid).await?,
            None => None,
        };
        let market_analysis = match &execution.analysis_id {
            Some(aid) => self.store.get_market_analysis(aid).await?,
            None => None,
        };
        let recommendation = match &execution.recommendation_id {
            Some(rid) => self.store.get_recommendation(rid).await?,
            None => None,
        };

        Ok(Some(ExecutionDetails {
            execution,
            transcript,
            market_analysis,
            recommendation,
        }))
    }

    pub async fn get_transcript(&self, id: &str) -> Result<Option<Transcript>> {
        Ok(self.store.get_transcript(id).await?)
    }

    pub async fn get_market_analysis(&self, id: &str) -> Result<Option<MarketAnalysis>> {
        Ok(self.store.get_market_analysis(id).await?)
    }

    pub async fn get_recommendation(&self, id: &str) -> Result<Option<Recommendation>> {
        Ok(self.store.get_recommendation(id).await?)
    }

    /// Summarise stored recommendations, keeping the `limit` newest completed ones
    pub async fn recommendations_summary(&self, limit: usize) -> Result<RecommendationsSummary> {
        let recommendations = self.store.list_recommendations().await?;
        let analyses = self.store.list_market_analyses().await?;
        let statuses: HashMap<String, ExecutionStatus> = self
            .store
            .list_executions()
            .await?
            .into_iter()
            .map(|e| (e.id, e.status))
            .collect();

        let mut action_counts = BTreeMap::new();
        for rec in &recommendations {
            *action_counts.entry(rec.action.clone()).or_insert(0) += 1;
        }
        let mut condition_counts = BTreeMap::new();
        for analysis in &analyses {
            *condition_counts
                .entry(analysis.conditions.clone())
                .or_insert(0) += 1;
        }

        let average_confidence = if recommendations.is_empty() {
            0.0
        } else {
            recommendations.iter().map(|r| r.confidence).sum::<f64>() / recommendations.len() as f64
        };

        let recent = recommendations
            .iter()
            .filter(|r| statuses.get(&r.execution_id) == Some(&ExecutionStatus::Completed))
            .take(limit)
            .cloned()
            .collect();

        Ok(RecommendationsSummary {
            total: recommendations.len(),
            action_counts,
            average_confidence,
            condition_counts,
            recent,
        })
    }
}

fn validate_source_fields(kind: SourceKind, url: &str, name: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(Error::Validation("source URL must not be empty".to_string()));
    }
    if name.trim().is_empty() {
        return Err(Error::Validation("source name must not be empty".to_string()));
    }
    if kind == SourceKind::PlaylistFeed && playlist_id_from_url(url).is_none() {
        return Err(Error::Validation(format!("no playlist id in {url}")));
    }
    Ok(())
}

/// Blank means unset; anything else must parse
fn normalize_schedule(schedule: Option<String>) -> Result<Option<String>> {
    match schedule.map(|s| s.trim().to_string()) {
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => {
            validate_schedule(&s)?;
            Ok(Some(s))
        }
        None => Ok(None),
    }
}
