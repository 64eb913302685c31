//! Feed client abstraction.
//!
//! The external feed is reached through an explicitly constructed
//! [`FeedClient`] handle passed into each capture call — never a module-level
//! singleton — so tests and offline runs can swap in the static provider.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

use crate::config::Config;

/// One message as delivered by the feed, before capture.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedMessage {
    pub id: i64,
    #[serde(default)]
    pub sender_id: Option<i64>,
    #[serde(default)]
    pub text: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub views: Option<i64>,
    /// Provider-interpreted media locator (URL for http, relative path for
    /// static). Present only when the message carries a photo.
    #[serde(default)]
    pub media: Option<String>,
}

/// A session with the external feed.
#[async_trait]
pub trait FeedClient: Send + Sync {
    fn provider(&self) -> &str;

    /// Fetch up to `limit` most-recent messages for a channel, newest first
    /// in feed-delivery order.
    async fn recent_messages(&self, channel: &str, limit: usize) -> Result<Vec<FeedMessage>>;

    /// Download the media behind a locator to `dest`. The caller has already
    /// checked that `dest` does not exist.
    async fn download_media(&self, locator: &str, dest: &Path) -> Result<()>;
}

/// Construct the configured feed provider.
pub fn open_feed(config: &Config) -> Result<Box<dyn FeedClient>> {
    match config.feed.provider.as_str() {
        "http" => Ok(Box::new(crate::feed_http::HttpFeed::new(config)?)),
        "static" => Ok(Box::new(crate::feed_static::StaticFeed::new(config)?)),
        other => bail!("Unknown feed provider: '{}'", other),
    }
}
