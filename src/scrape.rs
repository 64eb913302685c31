//! Scrape stage: Source Connector + Raw Store Writer.
//!
//! For each configured channel, fetches recent messages from the feed,
//! filters out every id already present in any prior capture partition
//! (cross-date de-duplication), downloads missing media to deterministic
//! paths, and replaces today's partition atomically with the merged set.
//! A feed failure on one channel never aborts the others.

use anyhow::Result;
use chrono::NaiveDate;

use crate::config::Config;
use crate::feed::{self, FeedClient};
use crate::models::{CaptureSummary, ChannelCapture, Message};
use crate::partition;

pub async fn run_scrape(config: &Config, date: NaiveDate) -> Result<CaptureSummary> {
    let client = feed::open_feed(config)?;
    let mut summary = CaptureSummary::default();

    for channel in &config.feed.channels {
        let capture = match capture_channel(client.as_ref(), config, channel, date).await {
            Ok(capture) => capture,
            Err(e) => {
                // Per-channel isolation: log and keep going.
                eprintln!("warning: scrape failed for {}: {:#}", channel, e);
                ChannelCapture {
                    channel: channel.clone(),
                    new_messages: 0,
                    media_downloaded: 0,
                    media_reused: 0,
                    error: Some(format!("{:#}", e)),
                }
            }
        };
        summary.channels.push(capture);
    }

    println!("scrape {} ({} provider)", date, client.provider());
    for c in &summary.channels {
        match &c.error {
            Some(err) => println!("  {:<24} FAILED: {}", c.channel, err),
            None => println!(
                "  {:<24} {} new, {} media downloaded, {} reused",
                c.channel, c.new_messages, c.media_downloaded, c.media_reused
            ),
        }
    }
    println!("  total new messages: {}", summary.total_new());
    if summary.failed_channels() > 0 {
        println!("  channels failed: {}", summary.failed_channels());
    }

    Ok(summary)
}

/// Capture one channel for one logical date.
pub async fn capture_channel(
    client: &dyn FeedClient,
    config: &Config,
    channel: &str,
    date: NaiveDate,
) -> Result<ChannelCapture> {
    let root = &config.raw.root;
    let slug = partition::channel_slug(channel);

    // Ids from every prior partition, any date. This, not the date, is the
    // primary duplicate-avoidance mechanism.
    let seen = partition::seen_ids(root, &slug)?;

    let fetched = client
        .recent_messages(channel, config.feed.fetch_limit)
        .await?;

    let images = partition::images_dir(root, date, &slug);
    let mut new_messages: Vec<Message> = Vec::new();
    let mut media_downloaded = 0u64;
    let mut media_reused = 0u64;

    for feed_msg in fetched {
        if seen.contains(&feed_msg.id) {
            continue;
        }

        let mut message = Message {
            channel: channel.to_string(),
            message_id: feed_msg.id,
            sender_id: feed_msg.sender_id,
            message_content: feed_msg.text,
            timestamp: feed_msg.timestamp,
            views: feed_msg.views,
            image_path: None,
        };

        if let Some(locator) = &feed_msg.media {
            let dest = images.join(format!("{}.jpg", feed_msg.id));
            let relative = format!(
                "{}/{}/images/{}.jpg",
                date.format(partition::DATE_FMT),
                slug,
                feed_msg.id
            );
            if dest.exists() {
                // Idempotent media fetch: the artifact is already on disk.
                message.image_path = Some(relative);
                media_reused += 1;
            } else {
                match client.download_media(locator, &dest).await {
                    Ok(()) => {
                        message.image_path = Some(relative);
                        media_downloaded += 1;
                    }
                    Err(e) => {
                        // Keep the message, just without an artifact.
                        eprintln!(
                            "warning: media download failed for {} message {}: {:#}",
                            channel, feed_msg.id, e
                        );
                    }
                }
            }
        }

        new_messages.push(message);
    }

    let count = new_messages.len() as u64;
    if !new_messages.is_empty() {
        let path = partition::partition_file(root, date, &slug);
        // Same-day re-runs merge with the partition already on disk; the
        // existing entry wins on id collision.
        let existing = if path.exists() {
            match partition::read_partition(&path) {
                Ok(messages) => messages,
                Err(e) => {
                    eprintln!("warning: could not merge existing partition: {:#}", e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let merged = partition::merge_by_id(existing, new_messages);
        partition::write_partition(&path, &merged)?;
    }

    Ok(ChannelCapture {
        channel: channel.to_string(),
        new_messages: count,
        media_downloaded,
        media_reused,
        error: None,
    })
}
