//! Raw capture-partition storage.
//!
//! Layout: `<root>/<YYYY-MM-DD>/<channel>/<channel>.json`, a JSON array of
//! messages, with media under `<root>/<date>/<channel>/images/<id>.jpg`.
//! Partition files are replaced whole via a temp file + rename, never
//! appended in place, so readers only ever see a complete array.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::models::Message;

pub const DATE_FMT: &str = "%Y-%m-%d";

/// A channel handle with the leading `@` stripped, usable as a directory name.
pub fn channel_slug(channel: &str) -> String {
    channel.trim_start_matches('@').to_string()
}

pub fn partition_dir(root: &Path, date: NaiveDate, slug: &str) -> PathBuf {
    root.join(date.format(DATE_FMT).to_string()).join(slug)
}

pub fn partition_file(root: &Path, date: NaiveDate, slug: &str) -> PathBuf {
    partition_dir(root, date, slug).join(format!("{}.json", slug))
}

pub fn images_dir(root: &Path, date: NaiveDate, slug: &str) -> PathBuf {
    partition_dir(root, date, slug).join("images")
}

/// Parse a partition file into messages.
pub fn read_partition(path: &Path) -> Result<Vec<Message>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read partition: {}", path.display()))?;
    let messages: Vec<Message> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse partition: {}", path.display()))?;
    Ok(messages)
}

/// Replace a partition file atomically (write temp file, then rename).
pub fn write_partition(path: &Path, messages: &[Message]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Partition path has no parent: {}", path.display()))?;
    std::fs::create_dir_all(parent)?;

    let tmp = parent.join(".partition.tmp");
    let content = serde_json::to_string_pretty(messages)?;
    std::fs::write(&tmp, content)
        .with_context(|| format!("Failed to write partition temp file: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace partition: {}", path.display()))?;
    Ok(())
}

/// Collect every message id ever captured for a channel, across all dates.
///
/// This is the primary duplicate-avoidance input for the scraper: an id seen
/// in any prior partition is filtered before today's partition is written.
/// Unreadable partition files are warned about and skipped.
pub fn seen_ids(root: &Path, slug: &str) -> Result<HashSet<i64>> {
    let mut seen = HashSet::new();
    if !root.exists() {
        return Ok(seen);
    }

    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let candidate = entry.path().join(slug).join(format!("{}.json", slug));
        if !candidate.exists() {
            continue;
        }
        match read_partition(&candidate) {
            Ok(messages) => seen.extend(messages.iter().map(|m| m.message_id)),
            Err(e) => eprintln!("warning: skipping unreadable partition: {:#}", e),
        }
    }

    Ok(seen)
}

/// Merge today's existing partition contents with newly fetched messages.
///
/// Keyed by `message_id`; an existing entry wins over a new one with the same
/// id, and insertion order is preserved (existing first, then new).
pub fn merge_by_id(existing: Vec<Message>, new: Vec<Message>) -> Vec<Message> {
    let mut merged: Vec<Message> = Vec::with_capacity(existing.len() + new.len());
    let mut ids: HashSet<i64> = HashSet::new();

    for message in existing.into_iter().chain(new) {
        if ids.insert(message.message_id) {
            merged.push(message);
        }
    }

    merged
}

/// A partition file located under the raw store root, with its logical
/// coordinates derived from the path.
#[derive(Debug, Clone)]
pub struct PartitionRef {
    pub path: PathBuf,
    /// Path relative to the raw root, stored as load provenance.
    pub relative: String,
    pub capture_date: NaiveDate,
    pub channel: String,
}

/// Walk the raw store and return every well-formed partition reference.
///
/// Files whose path does not match `<date>/<channel>/<name>.json` (or whose
/// date component does not parse) are warned about and skipped; they never
/// abort the walk.
pub fn walk_partitions(root: &Path) -> Vec<PartitionRef> {
    let mut partitions = Vec::new();
    if !root.exists() {
        return partitions;
    }

    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let relative = match path.strip_prefix(root) {
            Ok(r) => r,
            Err(_) => continue,
        };

        let components: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        // Expect <date>/<channel>/<file>.json
        if components.len() != 3 {
            eprintln!(
                "warning: skipping unexpected file in raw store: {}",
                relative.display()
            );
            continue;
        }

        let capture_date = match NaiveDate::parse_from_str(&components[0], DATE_FMT) {
            Ok(d) => d,
            Err(_) => {
                eprintln!(
                    "warning: skipping partition with bad date folder: {}",
                    relative.display()
                );
                continue;
            }
        };

        partitions.push(PartitionRef {
            path: path.to_path_buf(),
            relative: relative.to_string_lossy().replace('\\', "/"),
            capture_date,
            channel: components[1].clone(),
        });
    }

    partitions.sort_by(|a, b| a.relative.cmp(&b.relative));
    partitions
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn msg(id: i64) -> Message {
        Message {
            channel: "@test".to_string(),
            message_id: id,
            sender_id: Some(1),
            message_content: Some(format!("message {}", id)),
            timestamp: Utc::now(),
            views: None,
            image_path: None,
        }
    }

    #[test]
    fn merge_prefers_existing_and_preserves_order() {
        let existing = vec![msg(1), msg(2)];
        let mut replacement = msg(2);
        replacement.message_content = Some("rewritten".to_string());
        let new = vec![replacement, msg(3)];

        let merged = merge_by_id(existing, new);
        let ids: Vec<i64> = merged.iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(merged[1].message_content.as_deref(), Some("message 2"));
    }

    #[test]
    fn merge_with_empty_existing() {
        let merged = merge_by_id(Vec::new(), vec![msg(7), msg(7), msg(8)]);
        let ids: Vec<i64> = merged.iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![7, 8]);
    }

    #[test]
    fn slug_strips_handle_prefix() {
        assert_eq!(channel_slug("@CheMed123"), "CheMed123");
        assert_eq!(channel_slug("tikvahpharma"), "tikvahpharma");
    }

    #[test]
    fn walk_skips_malformed_paths() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();

        let good = root.join("2025-07-01").join("chan");
        std::fs::create_dir_all(&good).unwrap();
        std::fs::write(good.join("chan.json"), "[]").unwrap();

        // Bad date folder
        let bad = root.join("not-a-date").join("chan");
        std::fs::create_dir_all(&bad).unwrap();
        std::fs::write(bad.join("chan.json"), "[]").unwrap();

        // Stray file at the wrong depth
        std::fs::write(root.join("stray.json"), "[]").unwrap();

        let partitions = walk_partitions(root);
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].channel, "chan");
        assert_eq!(partitions[0].relative, "2025-07-01/chan/chan.json");
    }

    #[test]
    fn write_then_read_round_trips() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("2025-07-01").join("chan").join("chan.json");

        write_partition(&path, &[msg(1), msg(2)]).unwrap();
        let loaded = read_partition(&path).unwrap();
        assert_eq!(loaded.len(), 2);

        // Replacing the file keeps a single complete array
        write_partition(&path, &[msg(1), msg(2), msg(3)]).unwrap();
        assert_eq!(read_partition(&path).unwrap().len(), 3);
    }

    #[test]
    fn seen_ids_spans_all_dates() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path();

        let d1 = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2025, 7, 2).unwrap();
        write_partition(&partition_file(root, d1, "chan"), &[msg(1)]).unwrap();
        write_partition(&partition_file(root, d2, "chan"), &[msg(2), msg(3)]).unwrap();

        let seen = seen_ids(root, "chan").unwrap();
        assert_eq!(seen, HashSet::from([1, 2, 3]));
    }
}
