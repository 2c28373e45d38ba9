//! Content-source resolver for feedflow
//!
//! Implements [`feedflow_core::ContentSource`] on top of the video platform's
//! Data API: channel URL resolution (canonical id, handle, custom name),
//! channel listing through search, and playlist listing.

pub mod config;
pub mod error;
pub mod locator;
pub mod retry;
pub mod youtube;

pub use config::{YouTubeConfig, YouTubeConfigBuilder};
pub use error::{Result, SourceError};
pub use locator::{ChannelLocator, parse_channel_url};
pub use retry::RetryPolicy;
pub use youtube::YouTubeClient;
