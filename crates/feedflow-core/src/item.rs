//! Item URL helpers

use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::unwrap_used)]
static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:youtube\.com/(?:watch\?(?:.*&)?v=|embed/|shorts/|live/|v/)|youtu\.be/)([A-Za-z0-9_-]{11})",
    )
    .unwrap()
});

#[allow(clippy::unwrap_used)]
static PLAYLIST_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[?&]list=([A-Za-z0-9_-]+)").unwrap()
});

#[allow(clippy::unwrap_used)]
static BARE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// Extract the 11-character video id from a watch, short, embed or live URL
pub fn video_id_from_url(url: &str) -> Option<String> {
    VIDEO_ID
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Playlist id from a `list=` query parameter, or the input itself when it is a bare id
pub fn playlist_id_from_url(input: &str) -> Option<String> {
    let input = input.trim();
    if BARE_ID.is_match(input) {
        return Some(input.to_string());
    }
    PLAYLIST_ID
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Canonical watch URL for a video id
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}
