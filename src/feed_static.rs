//! Static fixture feed provider.
//!
//! Reads channel history from local JSON fixtures instead of the network:
//! `<fixture_root>/<channel>.json` holds the same array shape the HTTP
//! gateway returns, and media locators are paths relative to the fixture
//! root. Used by the test suite and for offline replays of captured feeds.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::feed::{FeedClient, FeedMessage};
use crate::partition::channel_slug;

pub struct StaticFeed {
    fixture_root: PathBuf,
}

impl StaticFeed {
    pub fn new(config: &Config) -> Result<Self> {
        let fixture_root = config
            .feed
            .fixture_root
            .clone()
            .ok_or_else(|| anyhow::anyhow!("Static feed provider requires feed.fixture_root"))?;

        if !fixture_root.exists() {
            bail!(
                "Static feed fixture root does not exist: {}",
                fixture_root.display()
            );
        }

        Ok(Self { fixture_root })
    }
}

#[async_trait]
impl FeedClient for StaticFeed {
    fn provider(&self) -> &str {
        "static"
    }

    async fn recent_messages(&self, channel: &str, limit: usize) -> Result<Vec<FeedMessage>> {
        let path = self
            .fixture_root
            .join(format!("{}.json", channel_slug(channel)));

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read feed fixture: {}", path.display()))?;
        let mut messages: Vec<FeedMessage> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse feed fixture: {}", path.display()))?;

        messages.truncate(limit);
        Ok(messages)
    }

    async fn download_media(&self, locator: &str, dest: &Path) -> Result<()> {
        let source = self.fixture_root.join(locator);
        if !source.exists() {
            bail!("Media fixture does not exist: {}", source.display());
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&source, dest)
            .with_context(|| format!("Failed to copy media fixture to {}", dest.display()))?;
        Ok(())
    }
}
