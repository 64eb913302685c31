//! Database statistics and health overview.
//!
//! A quick summary of what's loaded: message and detection counts plus a
//! per-channel breakdown. Used by `gf stats` to confirm that captures and
//! loads are landing where expected.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

struct ChannelStats {
    channel: String,
    message_count: i64,
    with_media: i64,
    last_message: Option<String>,
}

pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_messages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
        .fetch_one(&pool)
        .await?;

    let total_detections: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM detections")
        .fetch_one(&pool)
        .await?;

    let distinct_classes: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT detected_object_class) FROM detections")
            .fetch_one(&pool)
            .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("gramflow — Database Stats");
    println!("=========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Messages:    {}", total_messages);
    println!("  Detections:  {} ({} classes)", total_detections, distinct_classes);

    let rows = sqlx::query(
        r#"
        SELECT
            channel,
            COUNT(*) AS message_count,
            SUM(has_media) AS with_media,
            MAX(message_timestamp) AS last_message
        FROM messages
        GROUP BY channel
        ORDER BY message_count DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let channels: Vec<ChannelStats> = rows
        .iter()
        .map(|row| ChannelStats {
            channel: row.get("channel"),
            message_count: row.get("message_count"),
            with_media: row.get::<Option<i64>, _>("with_media").unwrap_or(0),
            last_message: row.get("last_message"),
        })
        .collect();

    if !channels.is_empty() {
        println!();
        println!("  By channel:");
        println!(
            "  {:<24} {:>8} {:>10}   {}",
            "CHANNEL", "MESSAGES", "WITH MEDIA", "LAST MESSAGE"
        );
        println!("  {}", "-".repeat(68));
        for c in &channels {
            println!(
                "  {:<24} {:>8} {:>10}   {}",
                c.channel,
                c.message_count,
                c.with_media,
                c.last_message.as_deref().unwrap_or("-")
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
