//! HTTP feed gateway provider.
//!
//! Talks to a feed gateway exposing channel history as JSON:
//!
//! ```text
//! GET {base_url}/channels/{channel}/messages?limit={n}
//!   -> [ { "id": 123, "sender_id": ..., "text": ..., "timestamp": ...,
//!          "views": ..., "media": "https://..." }, ... ]
//! ```
//!
//! Media locators are absolute URLs fetched with the same client.
//!
//! # Environment Variables
//!
//! - `GRAMFLOW_FEED_TOKEN` — optional bearer token sent on every request.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::config::Config;
use crate::feed::{FeedClient, FeedMessage};
use crate::partition::channel_slug;

pub struct HttpFeed {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpFeed {
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .feed
            .base_url
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("HTTP feed provider requires feed.base_url"))?
            .trim_end_matches('/')
            .to_string();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.feed.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url,
            token: std::env::var("GRAMFLOW_FEED_TOKEN").ok(),
            client,
        })
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl FeedClient for HttpFeed {
    fn provider(&self) -> &str {
        "http"
    }

    async fn recent_messages(&self, channel: &str, limit: usize) -> Result<Vec<FeedMessage>> {
        let url = format!(
            "{}/channels/{}/messages",
            self.base_url,
            channel_slug(channel)
        );

        let response = self
            .authorize(self.client.get(&url).query(&[("limit", limit.to_string())]))
            .send()
            .await
            .with_context(|| format!("Feed request failed: {}", url))?;

        if !response.status().is_success() {
            bail!("Feed returned {} for channel {}", response.status(), channel);
        }

        let messages: Vec<FeedMessage> = response
            .json()
            .await
            .with_context(|| format!("Failed to decode feed response for {}", channel))?;

        Ok(messages)
    }

    async fn download_media(&self, locator: &str, dest: &Path) -> Result<()> {
        let response = self
            .authorize(self.client.get(locator))
            .send()
            .await
            .with_context(|| format!("Media request failed: {}", locator))?;

        if !response.status().is_success() {
            bail!("Media download returned {} for {}", response.status(), locator);
        }

        let bytes = response.bytes().await?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, &bytes)
            .with_context(|| format!("Failed to write media file: {}", dest.display()))?;
        Ok(())
    }
}
