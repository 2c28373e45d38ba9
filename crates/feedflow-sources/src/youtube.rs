//! Data API v3 client

use crate::config::YouTubeConfig;
use crate::error::{Result, SourceError};
use crate::locator::{ChannelLocator, parse_channel_url};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use cached::{Cached, TimedCache};
use chrono::{DateTime, SecondsFormat, Utc};
use feedflow_core::item::watch_url;
use feedflow_core::{ContentItem, ContentSource, ExternalError, truncate_body};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Upper bound the API accepts for `maxResults`
pub const MAX_RESULTS: u32 = 50;

/// Playlist pages read per listing before stopping short of the end
const MAX_PLAYLIST_PAGES: usize = 10;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    published_at: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    snippet: Snippet,
    content_details: PlaylistContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistContentDetails {
    video_id: String,
    #[serde(default)]
    video_published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelsResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    id: String,
}

/// Data API client
///
/// Requests pass through a shared token-bucket limiter; transient failures are
/// retried. Handle and custom-name lookups are cached for the configured TTL.
#[derive(Clone)]
pub struct YouTubeClient {
    client: Client,
    api_key: String,
    base_url: String,
    rate_limiter: SharedRateLimiter,
    retry: RetryPolicy,
    channel_cache: Arc<RwLock<TimedCache<String, String>>>,
}

impl std::fmt::Debug for YouTubeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YouTubeClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl YouTubeClient {
    /// Create a client; fails when the configuration carries no API key
    pub fn new(config: YouTubeConfig) -> Result<Self> {
        config.validate()?;
        let api_key = config.api_key.clone().ok_or_else(|| {
            SourceError::Config(format!(
                "{} is not set",
                crate::config::API_KEY_ENV
            ))
        })?;

        let client = Client::builder().timeout(config.request_timeout).build()?;
        let rate = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(rate)));

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            rate_limiter,
            retry: config.retry,
            channel_cache: Arc::new(RwLock::new(TimedCache::with_lifespan(config.handle_cache_ttl))),
        })
    }

    /// Create a client from `YOUTUBE_API_KEY`, or `None` when it is unset
    pub fn from_env() -> Result<Option<Self>> {
        let config = YouTubeConfig::from_env();
        if !config.has_api_key() {
            return Ok(None);
        }
        Self::new(config).map(Some)
    }

    /// Resolve a channel URL to its stable channel id
    #[instrument(skip(self))]
    pub async fn resolve_channel_id(&self, url: &str) -> Result<String> {
        match parse_channel_url(url)? {
            ChannelLocator::ChannelId(id) => Ok(id),
            ChannelLocator::Handle(handle) => self.lookup_channel("forHandle", &handle).await,
            ChannelLocator::Username(name) => self.lookup_channel("forUsername", &name).await,
        }
    }

    async fn lookup_channel(&self, key: &str, value: &str) -> Result<String> {
        let cache_key = format!("{key}:{value}");
        if let Some(id) = self.channel_cache.write().await.cache_get(&cache_key).cloned() {
            debug!(%cache_key, "Channel lookup cache hit");
            return Ok(id);
        }

        let params = [("part", "id".to_string()), (key, value.to_string())];
        let response: ChannelsResponse = self.get_json("channels", &params).await?;
        let id = response
            .items
            .into_iter()
            .next()
            .map(|item| item.id)
            .ok_or_else(|| SourceError::ChannelNotFound(value.to_string()))?;

        if self.channel_cache.write().await.cache_set(cache_key, id.clone()).is_some() {
            debug!(%value, "Replaced cached channel lookup");
        }
        Ok(id)
    }

    /// Recent videos on a channel, newest first
    #[instrument(skip(self))]
    pub async fn channel_videos(
        &self,
        channel_id: &str,
        max_results: u32,
        published_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<ContentItem>> {
        let mut params = vec![
            ("channelId", channel_id.to_string()),
            ("type", "video".to_string()),
            ("order", "date".to_string()),
            ("part", "snippet".to_string()),
            ("maxResults", clamp_max_results(max_results).to_string()),
        ];
        if let Some(after) = published_after {
            params.push((
                "publishedAfter",
                after.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        }

        let response: SearchResponse = self.get_json("search", &params).await?;
        Ok(search_items(response, published_after))
    }

    /// Videos in a playlist published after the checkpoint, newest first
    ///
    /// Playlists are not ordered by publish time, so pages are followed until
    /// the playlist ends or the page limit is reached.
    #[instrument(skip(self))]
    pub async fn playlist_videos(
        &self,
        playlist_id: &str,
        max_results: u32,
        published_after: Option<DateTime<Utc>>,
    ) -> Result<Vec<ContentItem>> {
        let fetch_page = move |page_token: Option<String>| {
            let mut params = vec![
                ("playlistId", playlist_id.to_string()),
                ("part", "snippet,contentDetails".to_string()),
                ("maxResults", MAX_RESULTS.to_string()),
            ];
            if let Some(token) = page_token {
                params.push(("pageToken", token));
            }
            async move {
                self.get_json::<PlaylistItemsResponse>("playlistItems", &params)
                    .await
            }
        };
        collect_playlist_pages(fetch_page, published_after, clamp_max_results(max_results)).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let body = self
            .retry
            .execute(endpoint, || self.get_once(endpoint, params))
            .await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn get_once(&self, endpoint: &str, params: &[(&str, String)]) -> Result<String> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/{endpoint}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        Ok(body)
    }
}

#[async_trait]
impl ContentSource for YouTubeClient {
    async fn resolve_identifier(&self, url: &str) -> std::result::Result<String, ExternalError> {
        Ok(self.resolve_channel_id(url).await?)
    }

    async fn list_items(
        &self,
        identifier: &str,
        max_count: u32,
        published_after: Option<DateTime<Utc>>,
    ) -> std::result::Result<Vec<ContentItem>, ExternalError> {
        Ok(self
            .channel_videos(identifier, max_count, published_after)
            .await?)
    }

    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        max_count: u32,
        published_after: Option<DateTime<Utc>>,
    ) -> std::result::Result<Vec<ContentItem>, ExternalError> {
        Ok(self
            .playlist_videos(playlist_id, max_count, published_after)
            .await?)
    }
}

/// Clamp a requested batch size into the range the API accepts
pub fn clamp_max_results(requested: u32) -> u32 {
    requested.clamp(1, MAX_RESULTS)
}

fn status_error(status: StatusCode, body: &str) -> SourceError {
    match status {
        StatusCode::FORBIDDEN => {
            SourceError::QuotaExceeded("quota exceeded or API key invalid".to_string())
        }
        StatusCode::UNAUTHORIZED => {
            SourceError::Unauthorized("API key is invalid or missing".to_string())
        }
        StatusCode::BAD_REQUEST => SourceError::Api {
            status: status.as_u16(),
            message: format!("invalid request: {}", truncate_body(body)),
        },
        _ => SourceError::Api {
            status: status.as_u16(),
            message: truncate_body(body),
        },
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn is_after(published_at: DateTime<Utc>, after: Option<DateTime<Utc>>) -> bool {
    after.is_none_or(|after| published_at > after)
}

fn search_items(response: SearchResponse, after: Option<DateTime<Utc>>) -> Vec<ContentItem> {
    response
        .items
        .into_iter()
        .filter_map(|item| {
            let id = item.id.video_id?;
            let published_at = parse_timestamp(&item.snippet.published_at)?;
            Some(ContentItem {
                url: watch_url(&id),
                id,
                title: item.snippet.title,
                published_at,
            })
        })
        .filter(|item| is_after(item.published_at, after))
        .collect()
}

fn playlist_items(response: PlaylistItemsResponse, after: Option<DateTime<Utc>>) -> Vec<ContentItem> {
    let mut items: Vec<ContentItem> = response
        .items
        .into_iter()
        .filter_map(|item| {
            let raw = item
                .content_details
                .video_published_at
                .as_deref()
                .unwrap_or(&item.snippet.published_at);
            let published_at = parse_timestamp(raw)?;
            let id = item.content_details.video_id;
            Some(ContentItem {
                url: watch_url(&id),
                id,
                title: item.snippet.title,
                published_at,
            })
        })
        .filter(|item| is_after(item.published_at, after))
        .collect();
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    items
}

/// Gather matching items across playlist pages
///
/// With a checkpoint the oldest `max_results` new items are kept, so a capped
/// batch never jumps the checkpoint past unprocessed items. Without one the
/// newest are kept.
async fn collect_playlist_pages<F, Fut>(
    mut fetch_page: F,
    after: Option<DateTime<Utc>>,
    max_results: u32,
) -> Result<Vec<ContentItem>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<PlaylistItemsResponse>>,
{
    let mut collected = Vec::new();
    let mut page_token = None;
    for page in 1..=MAX_PLAYLIST_PAGES {
        let mut response = fetch_page(page_token.take()).await?;
        let next = response.next_page_token.take().filter(|token| !token.is_empty());
        collected.extend(playlist_items(response, after));
        match next {
            Some(token) if page < MAX_PLAYLIST_PAGES => page_token = Some(token),
            Some(_) => debug!(pages = page, "Playlist page limit reached"),
            None => break,
        }
    }

    // newest first
    collected.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    collected.dedup_by(|a, b| a.id == b.id);
    let keep = max_results as usize;
    if after.is_some() && collected.len() > keep {
        collected.drain(..collected.len() - keep);
    }
    collected.truncate(keep);
    Ok(collected)
}
