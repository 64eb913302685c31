//! Read-only query surface over the loaded tables.
//!
//! Three derived views: per-day activity for a channel, free-text message
//! search (capped at 100 rows), and known-vocabulary keyword frequencies
//! across all message bodies.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use crate::config::Config;
use crate::db;
use crate::models::{ActivityRow, KeywordCount, MessageHit};

const SEARCH_LIMIT: i64 = 100;

/// Daily message counts for one channel, ordered by date.
pub async fn channel_activity(pool: &SqlitePool, channel: &str) -> Result<Vec<ActivityRow>> {
    let rows = sqlx::query(
        r#"
        SELECT date(message_timestamp) AS day, COUNT(*) AS message_count
        FROM messages
        WHERE channel = ?
        GROUP BY day
        ORDER BY day
        "#,
    )
    .bind(channel)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| ActivityRow {
            date: row.get("day"),
            message_count: row.get("message_count"),
        })
        .collect())
}

/// Case-insensitive substring search over message text, at most 100 hits.
pub async fn search_messages(pool: &SqlitePool, query: &str) -> Result<Vec<MessageHit>> {
    let pattern = format!("%{}%", query);
    let rows = sqlx::query(
        r#"
        SELECT message_id, channel, message_timestamp, message_text
        FROM messages
        WHERE message_text LIKE ?
        LIMIT ?
        "#,
    )
    .bind(&pattern)
    .bind(SEARCH_LIMIT)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| MessageHit {
            message_id: row.get("message_id"),
            channel: row.get("channel"),
            message_timestamp: row.get("message_timestamp"),
            message_text: row.get("message_text"),
        })
        .collect())
}

/// Lowercase, strip non-alphanumerics, split on whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(|s| s.to_string())
        .collect()
}

/// Top-N known-vocabulary keywords by frequency across all message bodies.
pub async fn top_keywords(
    pool: &SqlitePool,
    vocabulary: &[String],
    limit: usize,
) -> Result<Vec<KeywordCount>> {
    let rows = sqlx::query("SELECT message_text FROM messages WHERE message_text IS NOT NULL")
        .fetch_all(pool)
        .await?;

    let known: std::collections::HashSet<&str> =
        vocabulary.iter().map(|s| s.as_str()).collect();
    let mut counts: HashMap<String, u64> = HashMap::new();

    for row in &rows {
        let text: String = row.get("message_text");
        for token in tokenize(&text) {
            if known.contains(token.as_str()) {
                *counts.entry(token).or_insert(0) += 1;
            }
        }
    }

    let mut ranked: Vec<KeywordCount> = counts
        .into_iter()
        .map(|(keyword, count)| KeywordCount { keyword, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then(a.keyword.cmp(&b.keyword)));
    ranked.truncate(limit);
    Ok(ranked)
}

pub async fn run_activity(config: &Config, channel: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let rows = channel_activity(&pool, channel).await?;

    if rows.is_empty() {
        println!("No activity for {}.", channel);
    } else {
        println!("{:<12} {:>8}", "DATE", "COUNT");
        for row in &rows {
            println!("{:<12} {:>8}", row.date, row.message_count);
        }
    }

    pool.close().await;
    Ok(())
}

pub async fn run_search(config: &Config, query: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let hits = search_messages(&pool, query).await?;

    if hits.is_empty() {
        println!("No results.");
    } else {
        for hit in &hits {
            let preview: String = hit.message_text.chars().take(80).collect();
            println!(
                "[{}] {} {} — {}",
                hit.message_timestamp, hit.channel, hit.message_id, preview
            );
        }
        println!("{} result(s)", hits.len());
    }

    pool.close().await;
    Ok(())
}

pub async fn run_keywords(config: &Config, limit: usize) -> Result<()> {
    let pool = db::connect(config).await?;
    let ranked = top_keywords(&pool, &config.query.known_keywords, limit).await?;

    if ranked.is_empty() {
        println!("No known keywords found.");
    } else {
        println!("{:<20} {:>8}", "KEYWORD", "COUNT");
        for entry in &ranked {
            println!("{:<20} {:>8}", entry.keyword, entry.count);
        }
    }

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_strips_punctuation_and_lowercases() {
        assert_eq!(
            tokenize("New FACEMASK stock!! Call +251-911..."),
            vec!["new", "facemask", "stock", "call", "251", "911"]
        );
    }

    #[test]
    fn tokenize_empty_text() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("!!! ---").is_empty());
    }
}
