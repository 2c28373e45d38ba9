//! Per-kind resolution and listing
//!
//! The scheduler selects one strategy per tick from the source's kind. Each
//! strategy knows how to turn the source URL into a stable identifier and how
//! to list the items published under that identifier.

use chrono::{DateTime, Utc};
use feedflow_core::item::{playlist_id_from_url, video_id_from_url};
use feedflow_core::{ContentItem, ContentSource, ExternalError, Source, SourceKind};
use std::sync::Arc;

const RESOLVER: &str = "content-source";

fn not_configured() -> ExternalError {
    ExternalError::NotConfigured {
        service: RESOLVER.to_string(),
        message: "no content-source client configured".to_string(),
    }
}

/// Resolution and listing behaviour for one source kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStrategy {
    /// Resolve through the content source, list through its search API
    Channel,
    /// Parse the playlist id locally, list through playlist items
    Playlist,
    /// The source URL is the one item; nothing to resolve or list remotely
    Direct,
}

impl SourceStrategy {
    pub fn for_kind(kind: SourceKind) -> Self {
        match kind {
            SourceKind::ChannelFeed => Self::Channel,
            SourceKind::PlaylistFeed => Self::Playlist,
            SourceKind::AuthenticatedScrape => Self::Direct,
        }
    }

    /// Stable identifier for `source`
    pub async fn resolve(
        &self,
        content: Option<&Arc<dyn ContentSource>>,
        source: &Source,
    ) -> Result<String, ExternalError> {
        match self {
            Self::Channel => {
                content
                    .ok_or_else(not_configured)?
                    .resolve_identifier(&source.url)
                    .await
            }
            Self::Playlist => playlist_id_from_url(&source.url).ok_or_else(|| {
                ExternalError::NotFound {
                    service: RESOLVER.to_string(),
                    what: format!("playlist id in {}", source.url),
                }
            }),
            Self::Direct => Ok(video_id_from_url(&source.url).unwrap_or_else(|| source.url.clone())),
        }
    }

    /// Whether listing goes through the content-source API
    pub fn lists_remotely(&self) -> bool {
        !matches!(self, Self::Direct)
    }

    /// Items published after `after`, at most `max_count`
    pub async fn list(
        &self,
        content: Option<&Arc<dyn ContentSource>>,
        source: &Source,
        identifier: &str,
        max_count: u32,
        after: Option<DateTime<Utc>>,
    ) -> Result<Vec<ContentItem>, ExternalError> {
        match self {
            Self::Channel => {
                content
                    .ok_or_else(not_configured)?
                    .list_items(identifier, max_count, after)
                    .await
            }
            Self::Playlist => {
                content
                    .ok_or_else(not_configured)?
                    .list_playlist_items(identifier, max_count, after)
                    .await
            }
            Self::Direct => Ok(vec![ContentItem {
                id: identifier.to_string(),
                url: source.url.clone(),
                title: source.name.clone(),
                published_at: Utc::now(),
            }]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(kind: SourceKind, url: &str) -> Source {
        Source::new("s1", kind, url, "Name")
    }

    #[tokio::test]
    async fn test_playlist_resolves_locally() {
        let strategy = SourceStrategy::for_kind(SourceKind::PlaylistFeed);
        let id = strategy
            .resolve(
                None,
                &source(
                    SourceKind::PlaylistFeed,
                    "https://www.youtube.com/playlist?list=PLmarkets",
                ),
            )
            .await
            .unwrap();
        assert_eq!(id, "PLmarkets");
    }

    #[tokio::test]
    async fn test_channel_without_client_is_not_configured() {
        let strategy = SourceStrategy::for_kind(SourceKind::ChannelFeed);
        let err = strategy
            .resolve(None, &source(SourceKind::ChannelFeed, "https://www.youtube.com/@x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExternalError::NotConfigured { .. }));
    }

    #[tokio::test]
    async fn test_direct_source_is_a_single_item() {
        let source = source(
            SourceKind::AuthenticatedScrape,
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        );
        let strategy = SourceStrategy::for_kind(source.kind);
        assert!(!strategy.lists_remotely());

        let id = strategy.resolve(None, &source).await.unwrap();
        assert_eq!(id, "dQw4w9WgXcQ");

        let items = strategy.list(None, &source, &id, 50, None).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "dQw4w9WgXcQ");
        assert_eq!(items[0].url, source.url);
    }
}
