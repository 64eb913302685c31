//! Core data types flowing through the pipeline.
//!
//! These mirror the on-disk formats: raw capture partitions hold arrays of
//! [`Message`], the detection batch file holds an array of [`Detection`].
//! Both are immutable once written; de-duplication happens before writing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scraped message, as persisted in a raw capture partition.
///
/// Identified by `(channel, message_id)`; the id is unique across the union
/// of all capture partitions for its channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub channel: String,
    pub message_id: i64,
    pub sender_id: Option<i64>,
    pub message_content: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub views: Option<i64>,
    /// Path of the captured media artifact, relative to the raw store root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

/// One detected object in one media artifact.
///
/// Unique per `(message_id, image_filename, detected_object_class)`; the
/// detections table enforces this, the batch file merely accumulates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub message_id: i64,
    pub detected_object_class: String,
    pub confidence_score: f64,
    pub image_filename: String,
    pub relative_path: String,
    pub processed_at: DateTime<Utc>,
}

/// Outcome of capturing one channel.
#[derive(Debug, Clone)]
pub struct ChannelCapture {
    pub channel: String,
    pub new_messages: u64,
    pub media_downloaded: u64,
    pub media_reused: u64,
    /// Set when the feed failed for this channel; other channels still ran.
    pub error: Option<String>,
}

/// Outcome of the scrape stage across all configured channels.
#[derive(Debug, Clone, Default)]
pub struct CaptureSummary {
    pub channels: Vec<ChannelCapture>,
}

impl CaptureSummary {
    pub fn total_new(&self) -> u64 {
        self.channels.iter().map(|c| c.new_messages).sum()
    }

    pub fn failed_channels(&self) -> usize {
        self.channels.iter().filter(|c| c.error.is_some()).count()
    }
}

/// Outcome of the raw-store load stage.
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    pub partitions_seen: u64,
    pub partitions_skipped: u64,
    pub messages_inserted: u64,
}

/// Outcome of the enrichment detection stage.
#[derive(Debug, Clone, Default)]
pub struct DetectionSummary {
    pub artifacts_seen: u64,
    pub artifacts_skipped: u64,
    pub artifacts_processed: u64,
    pub new_detections: u64,
}

/// Aggregate counts from one full pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub messages_captured: u64,
    pub messages_loaded: u64,
    pub detections_found: u64,
    pub detections_loaded: u64,
}

/// One day of activity for a channel.
#[derive(Debug, Clone)]
pub struct ActivityRow {
    pub date: String,
    pub message_count: i64,
}

/// A message matching a text search.
#[derive(Debug, Clone)]
pub struct MessageHit {
    pub message_id: i64,
    pub channel: String,
    pub message_timestamp: String,
    pub message_text: String,
}

/// A known-vocabulary keyword and its frequency.
#[derive(Debug, Clone)]
pub struct KeywordCount {
    pub keyword: String,
    pub count: u64,
}
