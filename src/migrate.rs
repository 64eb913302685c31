use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Messages fact table. The UNIQUE(channel, message_id) constraint is what
    // makes the loader idempotent at item granularity: re-loading any
    // partition, partial or rewritten, inserts exactly the missing rows.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            channel TEXT NOT NULL,
            message_id INTEGER NOT NULL,
            sender_id INTEGER,
            message_text TEXT,
            message_timestamp TEXT NOT NULL,
            views INTEGER,
            has_media INTEGER NOT NULL DEFAULT 0,
            image_path TEXT,
            capture_date TEXT NOT NULL,
            source_file TEXT NOT NULL,
            dedup_hash TEXT NOT NULL,
            loaded_at INTEGER NOT NULL,
            UNIQUE(channel, message_id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Detections table. The unique triple makes re-loading the batch file a
    // no-op for already-inserted rows (first write wins).
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS detections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id INTEGER NOT NULL,
            detected_object_class TEXT NOT NULL,
            confidence_score REAL NOT NULL,
            image_filename TEXT NOT NULL,
            relative_path TEXT NOT NULL,
            processed_at TEXT NOT NULL,
            loaded_at INTEGER NOT NULL,
            UNIQUE(message_id, image_filename, detected_object_class)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_channel ON messages(channel)")
        .execute(&pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages(message_timestamp)",
    )
    .execute(&pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_detections_message_id ON detections(message_id)")
        .execute(&pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_detections_class ON detections(detected_object_class)",
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
