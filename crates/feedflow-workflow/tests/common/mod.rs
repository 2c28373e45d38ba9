//! Fakes shared by the workflow integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use feedflow_core::{
    AnalysisOutput, Analyzer, ContentItem, ContentSource, EntityKind, ExternalError,
    MarketAnalysis, MarketAnalysisOutput, PersistenceError, PortfolioContext, Recommendation,
    RecommendationOutput, Source, Transcript, TranscriptOutput, WorkflowExecution,
};
use feedflow_store::{MemoryStore, Store, StoreResult};
use feedflow_workflow::{Engine, Scheduler, SchedulerConfig};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const CHANNEL_URL: &str = "https://www.youtube.com/@macroweekly";
pub const CHANNEL_ID: &str = "UCmacroweekly00000000000";

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
}

/// `count` items published an hour apart starting at `base_time()`
pub fn items(count: usize) -> Vec<ContentItem> {
    (0..count)
        .map(|i| ContentItem {
            id: format!("vid{i:08}"),
            url: format!("https://www.youtube.com/watch?v=vid{i:08}"),
            title: format!("Episode {i}"),
            published_at: base_time() + Duration::hours(i as i64),
        })
        .collect()
}

pub fn channel_source(id: &str) -> Source {
    Source::new(id, feedflow_core::SourceKind::ChannelFeed, CHANNEL_URL, "Macro Weekly")
}

pub fn config() -> SchedulerConfig {
    SchedulerConfig::builder()
        .list_delay(std::time::Duration::ZERO)
        .build()
        .unwrap()
}

/// Content source serving a fixed item list
#[derive(Default)]
pub struct FakeContent {
    pub items: Mutex<Vec<ContentItem>>,
    pub resolve_error: Mutex<Option<ExternalError>>,
    pub list_error: Mutex<Option<ExternalError>>,
    pub ignore_published_after: AtomicBool,
    pub resolve_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
}

impl FakeContent {
    pub fn with_items(items: Vec<ContentItem>) -> Self {
        let fake = Self::default();
        *fake.items.lock().unwrap() = items;
        fake
    }

    fn listing(&self, max_count: u32, after: Option<DateTime<Utc>>) -> Vec<ContentItem> {
        let after = after.filter(|_| !self.ignore_published_after.load(Ordering::SeqCst));
        let mut listed: Vec<ContentItem> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|item| after.is_none_or(|after| item.published_at > after))
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        listed.truncate(max_count as usize);
        listed
    }
}

#[async_trait]
impl ContentSource for FakeContent {
    async fn resolve_identifier(&self, _url: &str) -> Result<String, ExternalError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        match self.resolve_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(CHANNEL_ID.to_string()),
        }
    }

    async fn list_items(
        &self,
        _identifier: &str,
        max_count: u32,
        published_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<ContentItem>, ExternalError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.list_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.listing(max_count, published_after))
    }

    async fn list_playlist_items(
        &self,
        _playlist_id: &str,
        max_count: u32,
        published_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<ContentItem>, ExternalError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.listing(max_count, published_after))
    }
}

/// Analyzer that fails for chosen URLs and can hold calls until released
#[derive(Default)]
pub struct FakeAnalyzer {
    pub failing_urls: Mutex<HashSet<String>>,
    pub calls: AtomicUsize,
    pub gated: AtomicBool,
    pub entered: Notify,
    pub release: Notify,
}

impl FakeAnalyzer {
    pub fn failing_for(urls: &[&str]) -> Self {
        let fake = Self::default();
        fake.failing_urls
            .lock()
            .unwrap()
            .extend(urls.iter().map(ToString::to_string));
        fake
    }

    pub fn gated() -> Self {
        let fake = Self::default();
        fake.gated.store(true, Ordering::SeqCst);
        fake
    }
}

#[async_trait]
impl Analyzer for FakeAnalyzer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn process(
        &self,
        item_url: &str,
        _context: Option<&PortfolioContext>,
    ) -> Result<AnalysisOutput, ExternalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.gated.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        if self.failing_urls.lock().unwrap().contains(item_url) {
            return Err(ExternalError::Status {
                service: "analysis".to_string(),
                status: 502,
                message: "transcript unavailable".to_string(),
            });
        }
        Ok(AnalysisOutput {
            transcript: TranscriptOutput {
                item_id: String::new(),
                item_title: String::new(),
                text: format!("transcript of {item_url}"),
                duration: Some(600),
            },
            market_analysis: MarketAnalysisOutput {
                conditions: "neutral".to_string(),
                trends: vec!["rates plateau".to_string()],
                risk_factors: vec!["earnings".to_string()],
                summary: "range bound".to_string(),
            },
            recommendation: RecommendationOutput {
                action: "hold".to_string(),
                confidence: 0.6,
                suggested_actions: vec![],
                summary: Some("stay the course".to_string()),
            },
        })
    }
}

/// Memory store whose writes can be switched to fail
#[derive(Default)]
pub struct FailingStore {
    pub inner: MemoryStore,
    pub fail_execution_writes: AtomicBool,
    pub fail_source_writes: AtomicBool,
    pub fail_analysis_writes: AtomicBool,
    /// Item whose next dedup lookup errors; cleared once it fires
    pub fail_dedup_once_for: Mutex<Option<String>>,
}

impl FailingStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }
}

fn write_failure(entity: EntityKind, id: &str) -> PersistenceError {
    PersistenceError::Write {
        entity,
        id: id.to_string(),
        reason: "disk full".to_string(),
    }
}

#[async_trait]
impl Store for FailingStore {
    async fn upsert_source(&self, source: &Source) -> StoreResult<()> {
        if self.fail_source_writes.load(Ordering::SeqCst) {
            return Err(write_failure(EntityKind::Source, &source.id));
        }
        self.inner.upsert_source(source).await
    }

    async fn get_source(&self, id: &str) -> StoreResult<Option<Source>> {
        self.inner.get_source(id).await
    }

    async fn list_sources(&self) -> StoreResult<Vec<Source>> {
        self.inner.list_sources().await
    }

    async fn delete_source(&self, id: &str) -> StoreResult<bool> {
        self.inner.delete_source(id).await
    }

    async fn upsert_execution(&self, execution: &WorkflowExecution) -> StoreResult<()> {
        if self.fail_execution_writes.load(Ordering::SeqCst) {
            return Err(write_failure(EntityKind::Execution, &execution.id));
        }
        self.inner.upsert_execution(execution).await
    }

    async fn get_execution(&self, id: &str) -> StoreResult<Option<WorkflowExecution>> {
        self.inner.get_execution(id).await
    }

    async fn list_executions(&self) -> StoreResult<Vec<WorkflowExecution>> {
        self.inner.list_executions().await
    }

    async fn executions_by_source(&self, source_id: &str) -> StoreResult<Vec<WorkflowExecution>> {
        self.inner.executions_by_source(source_id).await
    }

    async fn executions_by_item(&self, item_id: &str) -> StoreResult<Vec<WorkflowExecution>> {
        self.inner.executions_by_item(item_id).await
    }

    async fn has_execution_for_item(&self, source_id: &str, item_id: &str) -> StoreResult<bool> {
        {
            let mut failing = self.fail_dedup_once_for.lock().unwrap();
            if failing.as_deref() == Some(item_id) {
                failing.take();
                return Err(PersistenceError::Read {
                    entity: EntityKind::Execution,
                    reason: "connection reset".to_string(),
                });
            }
        }
        self.inner.has_execution_for_item(source_id, item_id).await
    }

    async fn upsert_transcript(&self, transcript: &Transcript) -> StoreResult<()> {
        self.inner.upsert_transcript(transcript).await
    }

    async fn get_transcript(&self, id: &str) -> StoreResult<Option<Transcript>> {
        self.inner.get_transcript(id).await
    }

    async fn transcripts_by_execution(&self, execution_id: &str) -> StoreResult<Vec<Transcript>> {
        self.inner.transcripts_by_execution(execution_id).await
    }

    async fn upsert_market_analysis(&self, analysis: &MarketAnalysis) -> StoreResult<()> {
        if self.fail_analysis_writes.load(Ordering::SeqCst) {
            return Err(write_failure(EntityKind::MarketAnalysis, &analysis.id));
        }
        self.inner.upsert_market_analysis(analysis).await
    }

    async fn get_market_analysis(&self, id: &str) -> StoreResult<Option<MarketAnalysis>> {
        self.inner.get_market_analysis(id).await
    }

    async fn list_market_analyses(&self) -> StoreResult<Vec<MarketAnalysis>> {
        self.inner.list_market_analyses().await
    }

    async fn analyses_by_transcript(
        &self,
        transcript_id: &str,
    ) -> StoreResult<Vec<MarketAnalysis>> {
        self.inner.analyses_by_transcript(transcript_id).await
    }

    async fn upsert_recommendation(&self, recommendation: &Recommendation) -> StoreResult<()> {
        self.inner.upsert_recommendation(recommendation).await
    }

    async fn get_recommendation(&self, id: &str) -> StoreResult<Option<Recommendation>> {
        self.inner.get_recommendation(id).await
    }

    async fn list_recommendations(&self) -> StoreResult<Vec<Recommendation>> {
        self.inner.list_recommendations().await
    }

    async fn recommendations_by_analysis(
        &self,
        analysis_id: &str,
    ) -> StoreResult<Vec<Recommendation>> {
        self.inner.recommendations_by_analysis(analysis_id).await
    }
}

/// Wired-up scheduler over `store` with the given fakes
pub struct Harness {
    pub store: Arc<dyn Store>,
    pub content: Arc<FakeContent>,
    pub analyzer: Arc<FakeAnalyzer>,
    pub engine: Engine,
    pub scheduler: Scheduler,
}

impl Harness {
    pub fn new(store: Arc<dyn Store>, content: FakeContent, analyzer: FakeAnalyzer) -> Self {
        Self::with_config(store, content, analyzer, config())
    }

    pub fn with_config(
        store: Arc<dyn Store>,
        content: FakeContent,
        analyzer: FakeAnalyzer,
        config: SchedulerConfig,
    ) -> Self {
        let content = Arc::new(content);
        let analyzer = Arc::new(analyzer);
        let engine = Engine::new(store.clone(), analyzer.clone());
        let scheduler = Scheduler::new(
            store.clone(),
            engine.clone(),
            Some(content.clone() as Arc<dyn ContentSource>),
            config,
        );
        Self {
            store,
            content,
            analyzer,
            engine,
            scheduler,
        }
    }
}
