//! Engine behaviour when artifact writes fail part way

mod common;

use common::{FailingStore, FakeAnalyzer};
use feedflow_core::{ContentItem, EntityKind, Error, ExecutionStatus, PersistenceError};
use feedflow_store::{MemoryStore, Store};
use feedflow_workflow::Engine;
use std::sync::Arc;
use std::sync::atomic::Ordering;

fn item() -> ContentItem {
    ContentItem {
        id: "dQw4w9WgXcQ".to_string(),
        url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
        title: "Macro weekly".to_string(),
        published_at: common::base_time(),
    }
}

#[tokio::test]
async fn test_analysis_write_failure_marks_execution_failed() {
    let failing = Arc::new(FailingStore::new(MemoryStore::new()));
    failing.fail_analysis_writes.store(true, Ordering::SeqCst);
    let store: Arc<dyn Store> = failing.clone();
    let engine = Engine::new(store.clone(), Arc::new(FakeAnalyzer::default()));

    let err = engine.execute_item(&item(), Some("s1")).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Persistence(PersistenceError::Write {
            entity: EntityKind::MarketAnalysis,
            ..
        })
    ));

    let stored = store.list_executions().await.unwrap();
    assert_eq!(stored.len(), 1);
    let execution = &stored[0];
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.error.as_deref().is_some_and(|e| !e.is_empty()));
    assert!(execution.completed_at.is_some());

    let transcript_id = execution.transcript_id.as_deref().unwrap();
    assert!(store.get_transcript(transcript_id).await.unwrap().is_some());
    assert_eq!(execution.analysis_id, None);
    assert_eq!(execution.recommendation_id, None);
    assert!(store.list_recommendations().await.unwrap().is_empty());
}
