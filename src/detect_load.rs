//! Load-detections stage: batch file into the detections table.
//!
//! Each record is decoded and inserted individually so one malformed record
//! cannot poison the rest of the batch; duplicates of the
//! `(message_id, image_filename, detected_object_class)` triple are silent
//! no-ops and not counted.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::models::Detection;

pub async fn run_load_detections(config: &Config) -> Result<u64> {
    let batch_file = config.detection.batch_file();
    if !batch_file.exists() {
        // Nothing detected yet; a no-op, not a failure.
        println!("load-detections: no batch file at {}", batch_file.display());
        return Ok(0);
    }

    let content = std::fs::read_to_string(&batch_file)
        .with_context(|| format!("Failed to read {}", batch_file.display()))?;

    // Decode to values first so each record is validated in isolation.
    let records: Vec<serde_json::Value> = match serde_json::from_str(&content) {
        Ok(records) => records,
        Err(e) => {
            eprintln!(
                "warning: detection batch {} is not a JSON array: {}",
                batch_file.display(),
                e
            );
            return Ok(0);
        }
    };

    let pool = db::connect(config).await?;
    let mut inserted = 0u64;
    let mut skipped = 0u64;

    for (index, record) in records.into_iter().enumerate() {
        let detection: Detection = match serde_json::from_value(record) {
            Ok(detection) => detection,
            Err(e) => {
                eprintln!("warning: skipping malformed detection record {}: {}", index, e);
                skipped += 1;
                continue;
            }
        };

        match insert_detection(&pool, &detection).await {
            Ok(true) => inserted += 1,
            Ok(false) => {} // duplicate triple
            Err(e) => {
                eprintln!("warning: skipping detection record {}: {:#}", index, e);
                skipped += 1;
            }
        }
    }

    println!("load-detections {}", batch_file.display());
    println!("  inserted: {}", inserted);
    println!("  skipped: {}", skipped);

    pool.close().await;
    Ok(inserted)
}

/// Insert one detection row; returns whether a row was actually written.
/// Each statement is its own implicit transaction, so a failure here leaves
/// previously inserted records untouched.
async fn insert_detection(pool: &SqlitePool, detection: &Detection) -> Result<bool> {
    let now = chrono::Utc::now().timestamp();

    let result = sqlx::query(
        r#"
        INSERT INTO detections
            (message_id, detected_object_class, confidence_score,
             image_filename, relative_path, processed_at, loaded_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(message_id, image_filename, detected_object_class) DO NOTHING
        "#,
    )
    .bind(detection.message_id)
    .bind(&detection.detected_object_class)
    .bind(detection.confidence_score)
    .bind(&detection.image_filename)
    .bind(&detection.relative_path)
    .bind(detection.processed_at.to_rfc3339())
    .bind(now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
