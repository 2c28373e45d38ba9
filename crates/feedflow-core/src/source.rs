//! Monitored content sources

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a source is monitored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A channel feed listed through the platform search API
    #[serde(alias = "channel")]
    ChannelFeed,
    /// A playlist listed through the playlist-items API
    #[serde(alias = "playlist")]
    PlaylistFeed,
    /// A page only reachable through an authenticated scraper
    #[serde(alias = "web_scraper")]
    AuthenticatedScrape,
}

impl SourceKind {
    /// Stable lowercase name used in logs and configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChannelFeed => "channel_feed",
            Self::PlaylistFeed => "playlist_feed",
            Self::AuthenticatedScrape => "authenticated_scrape",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "channel_feed" | "channel" => Ok(Self::ChannelFeed),
            "playlist_feed" | "playlist" => Ok(Self::PlaylistFeed),
            "authenticated_scrape" | "web_scraper" => Ok(Self::AuthenticatedScrape),
            other => Err(format!(
                "unknown source kind '{other}': expected channel_feed, playlist_feed or authenticated_scrape"
            )),
        }
    }
}

/// A configured, recurring origin of content items
///
/// `resolved_id` is filled in lazily by the scheduler the first time resolution
/// succeeds. `last_processed` is the checkpoint and is only ever moved by the
/// scheduler after a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub kind: SourceKind,
    pub url: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_id: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// 5-field cron expression; the scheduler default applies when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_processed: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl Source {
    /// Create a new enabled source with no schedule override
    pub fn new(
        id: impl Into<String>,
        kind: SourceKind,
        url: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            url: url.into(),
            name: name.into(),
            resolved_id: None,
            enabled: true,
            schedule: None,
            last_processed: None,
            created_at: Utc::now(),
        }
    }

    /// Set the schedule expression
    pub fn with_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    /// Set the enabled flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Seed a previously resolved identifier
    pub fn with_resolved_id(mut self, resolved_id: impl Into<String>) -> Self {
        self.resolved_id = Some(resolved_id.into());
        self
    }

    /// Seed a checkpoint
    pub fn with_last_processed(mut self, at: DateTime<Utc>) -> Self {
        self.last_processed = Some(at);
        self
    }

    /// Schedule to register: the source's own, or `default` when unset or blank
    pub fn effective_schedule<'a>(&'a self, default: &'a str) -> &'a str {
        self.schedule
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(default)
    }

    /// Move the checkpoint forward to `candidate`, never backwards
    ///
    /// Returns whether the checkpoint changed.
    pub fn advance_checkpoint(&mut self, candidate: DateTime<Utc>) -> bool {
        match self.last_processed {
            Some(current) if current >= candidate => false,
            _ => {
                self.last_processed = Some(candidate);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_kind_parsing_accepts_legacy_names() {
        assert_eq!("channel".parse::<SourceKind>(), Ok(SourceKind::ChannelFeed));
        assert_eq!("playlist_feed".parse::<SourceKind>(), Ok(SourceKind::PlaylistFeed));
        assert_eq!(
            "web_scraper".parse::<SourceKind>(),
            Ok(SourceKind::AuthenticatedScrape)
        );
        assert!("rss".parse::<SourceKind>().is_err());
    }

    #[test]
    fn test_kind_serde() {
        let kind: SourceKind = serde_json::from_str("\"channel\"").unwrap();
        assert_eq!(kind, SourceKind::ChannelFeed);
        assert_eq!(
            serde_json::to_string(&SourceKind::AuthenticatedScrape).unwrap(),
            "\"authenticated_scrape\""
        );
    }

    #[test]
    fn test_effective_schedule() {
        let source = Source::new("s1", SourceKind::ChannelFeed, "https://x", "x");
        assert_eq!(source.effective_schedule("0 9 * * *"), "0 9 * * *");

        let source = source.with_schedule("  ");
        assert_eq!(source.effective_schedule("0 9 * * *"), "0 9 * * *");

        let source = source.with_schedule("*/15 * * * *");
        assert_eq!(source.effective_schedule("0 9 * * *"), "*/15 * * * *");
    }

    #[test]
    fn test_checkpoint_never_moves_backwards() {
        let earlier = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        let mut source = Source::new("s1", SourceKind::ChannelFeed, "https://x", "x");
        assert!(source.advance_checkpoint(later));
        assert!(!source.advance_checkpoint(earlier));
        assert_eq!(source.last_processed, Some(later));
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = r#"{
            "id": "s1",
            "kind": "channel",
            "url": "https://www.youtube.com/@markets",
            "name": "Markets",
            "created_at": "2024-01-01T00:00:00Z"
        }"#;
        let source: Source = serde_json::from_str(json).unwrap();
        assert!(source.enabled);
        assert!(source.schedule.is_none());
        assert!(source.resolved_id.is_none());
    }
}
