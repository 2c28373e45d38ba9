//! Channel URL shape parsing

use crate::error::{Result, SourceError};
use url::Url;

/// How a channel URL identifies its channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelLocator {
    /// `/channel/UC…`: the stable id itself, no lookup needed
    ChannelId(String),
    /// `/@handle`: resolved with a `forHandle` lookup
    Handle(String),
    /// `/c/name` or `/user/name`: resolved with a `forUsername` lookup
    Username(String),
}

impl ChannelLocator {
    /// Whether resolving this locator needs an API round-trip
    pub fn needs_lookup(&self) -> bool {
        !matches!(self, Self::ChannelId(_))
    }
}

/// Whether `id` looks like a canonical channel id
pub fn is_channel_id(id: &str) -> bool {
    id.starts_with("UC") && id.len() >= 24
}

fn parse_url(input: &str) -> Option<Url> {
    let input = input.trim();
    Url::parse(input)
        .ok()
        .or_else(|| Url::parse(&format!("https://{input}")).ok())
}

/// Work out how a channel URL names its channel
pub fn parse_channel_url(input: &str) -> Result<ChannelLocator> {
    let unsupported = || SourceError::UnsupportedUrl(input.to_string());
    let url = parse_url(input).ok_or_else(unsupported)?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        ["channel", id, ..] if is_channel_id(id) => Ok(ChannelLocator::ChannelId((*id).to_string())),
        [first, ..] if first.len() > 1 && first.starts_with('@') => {
            Ok(ChannelLocator::Handle(first[1..].to_string()))
        }
        ["c" | "user", name, ..] => Ok(ChannelLocator::Username((*name).to_string())),
        _ => Err(unsupported()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_channel_parses_locally() {
        let locator =
            parse_channel_url("https://www.youtube.com/channel/UCabcdefghijklmnopqrstuv/videos")
                .unwrap();
        assert_eq!(
            locator,
            ChannelLocator::ChannelId("UCabcdefghijklmnopqrstuv".to_string())
        );
        assert!(!locator.needs_lookup());
    }

    #[test]
    fn test_handle_and_custom_names_need_lookup() {
        assert_eq!(
            parse_channel_url("https://www.youtube.com/@MarketWatch?si=1").unwrap(),
            ChannelLocator::Handle("MarketWatch".to_string())
        );
        assert_eq!(
            parse_channel_url("youtube.com/c/Bloomberg").unwrap(),
            ChannelLocator::Username("Bloomberg".to_string())
        );
        assert_eq!(
            parse_channel_url("https://www.youtube.com/user/cnbc/").unwrap(),
            ChannelLocator::Username("cnbc".to_string())
        );
        assert!(parse_channel_url("https://www.youtube.com/@x").unwrap().needs_lookup());
    }

    #[test]
    fn test_short_channel_id_is_unsupported() {
        assert!(matches!(
            parse_channel_url("https://www.youtube.com/channel/UCshort"),
            Err(SourceError::UnsupportedUrl(_))
        ));
        assert!(parse_channel_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ").is_err());
        assert!(parse_channel_url("https://www.youtube.com/@").is_err());
    }
}
