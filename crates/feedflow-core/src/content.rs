//! Content-source resolver contract

use crate::error::ExternalError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One published item discovered from a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub url: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
}

/// Resolves source URLs to stable identifiers and lists their recent items
///
/// Quota or rate exhaustion is reported as [`ExternalError::QuotaExceeded`].
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Map a channel URL to its stable identifier
    async fn resolve_identifier(&self, url: &str) -> Result<String, ExternalError>;

    /// Items on a channel published strictly after `published_after`, newest first
    async fn list_items(
        &self,
        identifier: &str,
        max_count: u32,
        published_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<ContentItem>, ExternalError>;

    /// Items in a playlist published strictly after `published_after`
    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        max_count: u32,
        published_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<ContentItem>, ExternalError>;
}
