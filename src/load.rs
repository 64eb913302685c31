//! Load stage: move raw capture partitions into the structured store.
//!
//! Walks every partition under the raw root and inserts one row per message
//! with capture provenance attached. Idempotence is item-level: the
//! `UNIQUE(channel, message_id)` constraint plus `ON CONFLICT DO NOTHING`
//! means a partition can be loaded, appended to same-day, and loaded again —
//! only the missing rows are inserted. Malformed partitions are skipped with
//! a warning and never abort the walk.

use anyhow::Result;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::models::{LoadSummary, Message};
use crate::partition::{self, PartitionRef};

pub async fn run_load(config: &Config) -> Result<LoadSummary> {
    let pool = db::connect(config).await?;
    let mut summary = LoadSummary::default();

    for part in partition::walk_partitions(&config.raw.root) {
        summary.partitions_seen += 1;

        let messages = match partition::read_partition(&part.path) {
            Ok(messages) => messages,
            Err(e) => {
                eprintln!("warning: skipping partition: {:#}", e);
                summary.partitions_skipped += 1;
                continue;
            }
        };

        for message in &messages {
            match insert_message(&pool, &part, message).await {
                Ok(true) => summary.messages_inserted += 1,
                Ok(false) => {} // already loaded
                Err(e) => eprintln!(
                    "warning: failed to load message {} from {}: {:#}",
                    message.message_id, part.relative, e
                ),
            }
        }
    }

    println!("load {}", config.raw.root.display());
    println!("  partitions seen: {}", summary.partitions_seen);
    println!("  partitions skipped: {}", summary.partitions_skipped);
    println!("  messages inserted: {}", summary.messages_inserted);

    pool.close().await;
    Ok(summary)
}

/// Insert one message row; returns whether a row was actually written.
async fn insert_message(pool: &SqlitePool, part: &PartitionRef, message: &Message) -> Result<bool> {
    let mut hasher = Sha256::new();
    hasher.update(message.channel.as_bytes());
    hasher.update(message.message_id.to_le_bytes());
    hasher.update(message.timestamp.timestamp().to_le_bytes());
    if let Some(text) = &message.message_content {
        hasher.update(text.as_bytes());
    }
    let dedup_hash = format!("{:x}", hasher.finalize());

    let now = chrono::Utc::now().timestamp();

    let result = sqlx::query(
        r#"
        INSERT INTO messages
            (channel, message_id, sender_id, message_text, message_timestamp,
             views, has_media, image_path, capture_date, source_file, dedup_hash, loaded_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(channel, message_id) DO NOTHING
        "#,
    )
    .bind(&message.channel)
    .bind(message.message_id)
    .bind(message.sender_id)
    .bind(&message.message_content)
    .bind(message.timestamp.to_rfc3339())
    .bind(message.views)
    .bind(message.image_path.is_some())
    .bind(&message.image_path)
    .bind(part.capture_date.format(partition::DATE_FMT).to_string())
    .bind(&part.relative)
    .bind(&dedup_hash)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
