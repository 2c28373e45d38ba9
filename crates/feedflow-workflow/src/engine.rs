//! Execution engine
//!
//! Drives one content item through the analysis pipeline and keeps the
//! execution record in step with what actually happened:
//!
//! 1. Persist a `processing` execution before any external call
//! 2. Snapshot holdings into a portfolio context
//! 3. Call the analyzer; on failure persist the execution as `failed`
//! 4. Persist transcript, analysis and recommendation, in that order
//! 5. Persist the execution as `completed`

use chrono::Utc;
use feedflow_core::item::video_id_from_url;
use feedflow_core::{
    AnalysisOutput, Analyzer, ContentItem, EntityKind, Error, HoldingsProvider, MarketAnalysis,
    PersistenceError, PortfolioContext, Recommendation, Result, Transcript, WorkflowExecution,
    clamp_confidence,
};
use feedflow_store::Store;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Runs single items through the analysis pipeline
///
/// Safe to call concurrently for different items. The engine never
/// deduplicates; calling it twice for one item creates two executions.
#[derive(Clone)]
pub struct Engine {
    store: Arc<dyn Store>,
    analyzer: Arc<dyn Analyzer>,
    holdings: Option<Arc<dyn HoldingsProvider>>,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, analyzer: Arc<dyn Analyzer>) -> Self {
        Self {
            store,
            analyzer,
            holdings: None,
        }
    }

    /// Pass a holdings snapshot to the analyzer on every execution
    pub fn with_holdings(mut self, holdings: Arc<dyn HoldingsProvider>) -> Self {
        self.holdings = Some(holdings);
        self
    }

    /// Process one item given only its URL
    ///
    /// Returns the completed execution, or [`Error::ExecutionFailed`] carrying
    /// the failed record. A store failure surfaces as [`Error::Persistence`].
    pub async fn execute(
        &self,
        item_url: &str,
        source_id: Option<&str>,
    ) -> Result<WorkflowExecution> {
        let execution = WorkflowExecution::start(new_id(), item_url, source_id.map(String::from))
            .with_item_id(video_id_from_url(item_url));
        self.run(execution).await
    }

    /// Process one item discovered by a source listing
    pub async fn execute_item(
        &self,
        item: &ContentItem,
        source_id: Option<&str>,
    ) -> Result<WorkflowExecution> {
        let execution = WorkflowExecution::start(new_id(), &item.url, source_id.map(String::from))
            .with_item_id(Some(item.id.clone()))
            .with_item_title(Some(item.title.clone()).filter(|t| !t.is_empty()));
        self.run(execution).await
    }

    #[instrument(
        skip(self, execution),
        fields(execution_id = %execution.id, item_url = %execution.item_url)
    )]
    async fn run(&self, mut execution: WorkflowExecution) -> Result<WorkflowExecution> {
        self.persist(&execution, "create").await?;
        debug!("Execution created");

        let context = self.snapshot_context().await;

        let output = match self
            .analyzer
            .process(&execution.item_url, context.as_ref())
            .await
        {
            Ok(output) => output,
            Err(e) => {
                warn!(analyzer = self.analyzer.name(), error = %e, "Analysis failed");
                return Err(self.fail(execution, e.to_string()).await);
            }
        };

        if let Err(e) = self.store_artifacts(&mut execution, output).await {
            let reason = e.to_string();
            // keep the original write failure as the surfaced error
            if let recorded @ Error::Persistence(_) = self.fail(execution, reason).await {
                debug!(error = %recorded, "Could not record artifact failure on execution");
            }
            return Err(Error::Persistence(e));
        }

        execution.complete()?;
        self.persist(&execution, "complete").await?;
        info!(
            item_id = execution.item_id.as_deref().unwrap_or_default(),
            "Execution completed"
        );
        Ok(execution)
    }

    async fn snapshot_context(&self) -> Option<PortfolioContext> {
        let provider = self.holdings.as_ref()?;
        match provider.holdings().await {
            Ok(holdings) if holdings.is_empty() => None,
            Ok(holdings) => Some(PortfolioContext::from_holdings(holdings)),
            Err(e) => {
                warn!(error = %e, "Could not load holdings, continuing without portfolio context");
                None
            }
        }
    }

    /// Write the three artifacts in order, linking each as soon as it is stored
    async fn store_artifacts(
        &self,
        execution: &mut WorkflowExecution,
        output: AnalysisOutput,
    ) -> std::result::Result<(), PersistenceError> {
        let now = Utc::now();
        let AnalysisOutput {
            transcript,
            market_analysis,
            recommendation,
        } = output;

        if execution.item_id.is_none() && !transcript.item_id.is_empty() {
            execution.item_id = Some(transcript.item_id.clone());
        }
        if !transcript.item_title.is_empty() {
            execution.item_title = Some(transcript.item_title.clone());
        }

        let transcript = Transcript {
            id: new_id(),
            execution_id: execution.id.clone(),
            item_id: execution.item_id.clone().unwrap_or(transcript.item_id),
            item_title: transcript.item_title,
            item_url: execution.item_url.clone(),
            text: transcript.text,
            duration: transcript.duration,
            source_id: execution.source_id.clone(),
            created_at: now,
        };
        self.store.upsert_transcript(&transcript).await.inspect_err(|e| {
            error!(entity = %EntityKind::Transcript, id = %transcript.id, error = %e, "Failed to store transcript");
        })?;
        execution.transcript_id = Some(transcript.id.clone());

        let analysis = MarketAnalysis {
            id: new_id(),
            execution_id: execution.id.clone(),
            transcript_id: transcript.id,
            conditions: market_analysis.conditions,
            trends: market_analysis.trends,
            risk_factors: market_analysis.risk_factors,
            summary: market_analysis.summary,
            created_at: now,
        };
        self.store.upsert_market_analysis(&analysis).await.inspect_err(|e| {
            error!(entity = %EntityKind::MarketAnalysis, id = %analysis.id, error = %e, "Failed to store market analysis");
        })?;
        execution.analysis_id = Some(analysis.id.clone());

        let recommendation = Recommendation {
            id: new_id(),
            execution_id: execution.id.clone(),
            analysis_id: analysis.id,
            action: recommendation.action,
            confidence: clamp_confidence(recommendation.confidence),
            suggested_actions: recommendation.suggested_actions,
            summary: recommendation.summary,
            created_at: now,
        };
        self.store
            .upsert_recommendation(&recommendation)
            .await
            .inspect_err(|e| {
                error!(entity = %EntityKind::Recommendation, id = %recommendation.id, error = %e, "Failed to store recommendation");
            })?;
        execution.recommendation_id = Some(recommendation.id);

        Ok(())
    }

    /// Mark `execution` failed and persist it, returning the error to surface
    async fn fail(&self, mut execution: WorkflowExecution, reason: String) -> Error {
        if let Err(e) = execution.fail(reason.clone()) {
            return Error::Persistence(e);
        }
        if let Err(e) = self.persist(&execution, "fail").await {
            return e;
        }
        Error::ExecutionFailed {
            execution: Box::new(execution),
            reason,
        }
    }

    async fn persist(&self, execution: &WorkflowExecution, operation: &str) -> Result<()> {
        self.store.upsert_execution(execution).await.map_err(|e| {
            error!(
                entity = %EntityKind::Execution,
                id = %execution.id,
                operation,
                status = %execution.status,
                error = %e,
                "Failed to store execution"
            );
            Error::Persistence(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use feedflow_core::{
        ExecutionStatus, ExternalError, Holding, MarketAnalysisOutput, RecommendationOutput,
        StaticHoldings, TranscriptOutput,
    };
    use feedflow_store::MemoryStore;
    use std::sync::Mutex;

    struct ScriptedAnalyzer {
        fail_with: Option<ExternalError>,
        seen_context: Mutex<Vec<Option<PortfolioContext>>>,
    }

    impl ScriptedAnalyzer {
        fn ok() -> Self {
            Self {
                fail_with: None,
                seen_context: Mutex::new(Vec::new()),
            }
        }

        fn failing(err: ExternalError) -> Self {
            Self {
                fail_with: Some(err),
                seen_context: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Analyzer for ScriptedAnalyzer {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn process(
            &self,
            _item_url: &str,
            context: Option<&PortfolioContext>,
        ) -> std::result::Result<AnalysisOutput, ExternalError> {
            self.seen_context.lock().unwrap().push(context.cloned());
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            Ok(AnalysisOutput {
                transcript: TranscriptOutput {
                    item_id: "dQw4w9WgXcQ".to_string(),
                    item_title: "Macro weekly".to_string(),
                    text: "transcript".to_string(),
                    duration: Some(900),
                },
                market_analysis: MarketAnalysisOutput {
                    conditions: "bullish".to_string(),
                    trends: vec!["AI capex".to_string()],
                    risk_factors: vec![],
                    summary: "risk on".to_string(),
                },
                recommendation: RecommendationOutput {
                    action: "rebalance".to_string(),
                    confidence: 1.7,
                    suggested_actions: vec![],
                    summary: None,
                },
            })
        }
    }

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    #[tokio::test]
    async fn test_successful_execution_links_artifacts() {
        let store = Arc::new(MemoryStore::new());
        let engine = Engine::new(store.clone(), Arc::new(ScriptedAnalyzer::ok()));

        let execution = engine.execute(URL, Some("s1")).await.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(execution.error.is_none());
        assert_eq!(execution.item_id.as_deref(), Some("dQw4w9WgXcQ"));
        assert_eq!(execution.item_title.as_deref(), Some("Macro weekly"));

        let transcript = store
            .get_transcript(execution.transcript_id.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(transcript.execution_id, execution.id);
        assert_eq!(transcript.source_id.as_deref(), Some("s1"));

        let analysis = store
            .get_market_analysis(execution.analysis_id.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(analysis.transcript_id, transcript.id);

        let recommendation = store
            .get_recommendation(execution.recommendation_id.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(recommendation.analysis_id, analysis.id);
        assert!((recommendation.confidence - 1.0).abs() < f64::EPSILON);

        let stored = store.get_execution(&execution.id).await.unwrap().unwrap();
        assert_eq!(stored, execution);
    }

    #[tokio::test]
    async fn test_analysis_failure_keeps_failed_record() {
        let store = Arc::new(MemoryStore::new());
        let engine = Engine::new(
            store.clone(),
            Arc::new(ScriptedAnalyzer::failing(ExternalError::Status {
                service: "analysis".to_string(),
                status: 500,
                message: "transcript unavailable".to_string(),
            })),
        );

        let err = engine.execute(URL, None).await.unwrap_err();
        let Error::ExecutionFailed { execution, reason } = err else {
            panic!("expected ExecutionFailed");
        };
        assert!(reason.contains("transcript unavailable"));
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert!(execution.completed_at.is_some());
        assert!(execution.transcript_id.is_none());

        let stored = store.get_execution(&execution.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExecutionStatus::Failed);
        assert!(!stored.error.unwrap_or_default().is_empty());
        assert_eq!(stored.item_id.as_deref(), Some("dQw4w9WgXcQ"));
    }

    #[tokio::test]
    async fn test_holdings_snapshot_is_passed() {
        let store = Arc::new(MemoryStore::new());
        let analyzer = Arc::new(ScriptedAnalyzer::ok());
        let engine = Engine::new(store, analyzer.clone()).with_holdings(Arc::new(
            StaticHoldings::new(vec![Holding::new("BTC", 0.1, 6_000.0)]),
        ));

        engine.execute(URL, None).await.unwrap();

        let seen = analyzer.seen_context.lock().unwrap();
        let ctx = seen[0].as_ref().unwrap();
        assert_eq!(ctx.holdings()[0].symbol, "BTC");
    }

    #[tokio::test]
    async fn test_empty_holdings_send_no_context() {
        let store = Arc::new(MemoryStore::new());
        let analyzer = Arc::new(ScriptedAnalyzer::ok());
        let engine = Engine::new(store, analyzer.clone())
            .with_holdings(Arc::new(StaticHoldings::default()));

        engine.execute(URL, None).await.unwrap();
        assert!(analyzer.seen_context.lock().unwrap()[0].is_none());
    }

    #[tokio::test]
    async fn test_same_item_twice_creates_two_executions() {
        let store = Arc::new(MemoryStore::new());
        let engine = Engine::new(store.clone(), Arc::new(ScriptedAnalyzer::ok()));

        let first = engine.execute(URL, Some("s1")).await.unwrap();
        let second = engine.execute(URL, Some("s1")).await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(store.executions_by_item("dQw4w9WgXcQ").await.unwrap().len(), 2);
    }
}
