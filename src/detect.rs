//! Detect stage: enrich captured media with object detections.
//!
//! Enumerates every `.jpg` under the raw store, skips artifacts already
//! present in the detection batch file (keyed by both message id and relative
//! path), runs the configured models on the rest, and rewrites the batch file
//! whole with the accumulated set. An annotated copy of each processed
//! artifact is mirrored under the detection output root whether or not
//! anything was found.
//!
//! The batch-file skip-set is a shortcut only; the detections table's unique
//! constraint remains the source of truth when the batch is loaded.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

use crate::config::{Config, ModelConfig};
use crate::models::{Detection, DetectionSummary};

/// One raw detection as produced by a model backend.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDetection {
    pub class: String,
    pub confidence: f64,
    /// `[x1, y1, x2, y2]` pixel box, used by backends that draw annotations.
    #[serde(default)]
    #[allow(dead_code)]
    pub bbox: Option<[i64; 4]>,
}

/// A detection model run against one image at a time.
pub trait ObjectModel {
    fn name(&self) -> &str;

    /// Detections below this are dropped before recording.
    fn min_confidence(&self) -> f64;

    /// Run the model on `image`. A backend that draws bounding boxes writes
    /// the annotated copy to `annotated`; others leave it absent and the
    /// caller mirrors the original bytes instead.
    fn detect(&self, image: &Path, annotated: &Path) -> Result<Vec<RawDetection>>;
}

/// Subprocess-backed model. The configured argv is invoked with the image
/// path and the annotated output path appended; stdout must be a JSON array
/// of `{class, confidence, bbox}` objects.
pub struct CommandModel {
    name: String,
    argv: Vec<String>,
    min_confidence: f64,
}

impl ObjectModel for CommandModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    fn detect(&self, image: &Path, annotated: &Path) -> Result<Vec<RawDetection>> {
        let mut cmd = Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..]);
        cmd.arg(image);
        cmd.arg(annotated);

        let output = cmd
            .output()
            .with_context(|| format!("Failed to execute detector '{}'", self.argv[0]))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("Detector '{}' failed: {}", self.name, stderr.trim());
        }

        let detections: Vec<RawDetection> = serde_json::from_slice(&output.stdout)
            .with_context(|| format!("Detector '{}' produced invalid JSON", self.name))?;
        Ok(detections)
    }
}

/// Fixture-backed model: a JSON object mapping image filenames to detection
/// arrays. Images absent from the map yield no detections.
pub struct StaticModel {
    name: String,
    fixture: HashMap<String, Vec<RawDetection>>,
    min_confidence: f64,
}

impl StaticModel {
    fn load(name: &str, path: &Path, min_confidence: f64) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model fixture: {}", path.display()))?;
        let fixture: HashMap<String, Vec<RawDetection>> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse model fixture: {}", path.display()))?;
        Ok(Self {
            name: name.to_string(),
            fixture,
            min_confidence,
        })
    }
}

impl ObjectModel for StaticModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    fn detect(&self, image: &Path, _annotated: &Path) -> Result<Vec<RawDetection>> {
        let filename = image
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(self.fixture.get(&filename).cloned().unwrap_or_default())
    }
}

fn build_model(name: &str, config: &ModelConfig) -> Result<Option<Box<dyn ObjectModel>>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "command" => Ok(Some(Box::new(CommandModel {
            name: name.to_string(),
            argv: config.command.clone(),
            min_confidence: config.min_confidence,
        }))),
        "static" => {
            let fixture = config
                .fixture
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Static model '{}' has no fixture", name))?;
            Ok(Some(Box::new(StaticModel::load(
                name,
                fixture,
                config.min_confidence,
            )?)))
        }
        other => bail!("Unknown detection provider: '{}'", other),
    }
}

/// The models enabled in config, in run order (general first).
pub fn build_models(config: &Config) -> Result<Vec<Box<dyn ObjectModel>>> {
    let mut models = Vec::new();
    if let Some(m) = build_model("general", &config.detection.general)? {
        models.push(m);
    }
    if let Some(m) = build_model("specialized", &config.detection.specialized)? {
        models.push(m);
    }
    Ok(models)
}

/// Read the existing batch file; missing or unparseable files yield an empty
/// set (a bad batch file is warned about, not fatal — the next successful run
/// rewrites it whole).
pub fn load_existing_detections(batch_file: &Path) -> Vec<Detection> {
    if !batch_file.exists() {
        return Vec::new();
    }
    match std::fs::read_to_string(batch_file) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(detections) => detections,
            Err(e) => {
                eprintln!(
                    "warning: failed to parse existing detection file {}: {}",
                    batch_file.display(),
                    e
                );
                Vec::new()
            }
        },
        Err(e) => {
            eprintln!(
                "warning: failed to read existing detection file {}: {}",
                batch_file.display(),
                e
            );
            Vec::new()
        }
    }
}

/// Message id derived from an artifact filename; `None` for non-conforming
/// names, which are skipped entirely.
pub fn message_id_from_filename(path: &Path) -> Option<i64> {
    path.file_stem()?.to_str()?.parse::<i64>().ok()
}

pub fn run_detect(config: &Config) -> Result<DetectionSummary> {
    let models = build_models(config)?;
    if models.is_empty() {
        bail!("No detection model enabled. Configure detection.general or detection.specialized.");
    }

    let media_root = &config.raw.root;
    let output_root = &config.detection.output_root;
    let batch_file = config.detection.batch_file();

    let existing = load_existing_detections(&batch_file);

    // Defense in depth: skip by message id and by relative path.
    let seen_ids: HashSet<i64> = existing.iter().map(|d| d.message_id).collect();
    let seen_paths: HashSet<&str> = existing.iter().map(|d| d.relative_path.as_str()).collect();

    let mut summary = DetectionSummary::default();
    let mut new_detections: Vec<Detection> = Vec::new();

    for entry in WalkDir::new(media_root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let image = entry.path();
        if image.extension().and_then(|e| e.to_str()) != Some("jpg") {
            continue;
        }

        let message_id = match message_id_from_filename(image) {
            Some(id) => id,
            None => continue,
        };

        summary.artifacts_seen += 1;

        let relative = image
            .strip_prefix(media_root)
            .unwrap_or(image)
            .to_string_lossy()
            .replace('\\', "/");

        if seen_ids.contains(&message_id) || seen_paths.contains(relative.as_str()) {
            summary.artifacts_skipped += 1;
            continue;
        }

        match process_artifact(&models, image, &relative, message_id, output_root) {
            Ok(detections) => {
                summary.artifacts_processed += 1;
                summary.new_detections += detections.len() as u64;
                new_detections.extend(detections);
            }
            Err(e) => {
                eprintln!("warning: detection failed for {}: {:#}", relative, e);
            }
        }
    }

    // Rewrite the whole batch: prior detections plus this run's.
    let all: Vec<Detection> = existing.into_iter().chain(new_detections).collect();
    if !all.is_empty() {
        if let Some(parent) = batch_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&all)?;
        std::fs::write(&batch_file, content)
            .with_context(|| format!("Failed to write {}", batch_file.display()))?;
    }

    println!("detect {}", media_root.display());
    println!("  artifacts seen: {}", summary.artifacts_seen);
    println!("  already detected: {}", summary.artifacts_skipped);
    println!("  processed: {}", summary.artifacts_processed);
    println!("  new detections: {}", summary.new_detections);

    Ok(summary)
}

/// Run every model against one artifact and mirror its annotated copy.
fn process_artifact(
    models: &[Box<dyn ObjectModel>],
    image: &Path,
    relative: &str,
    message_id: i64,
    output_root: &Path,
) -> Result<Vec<Detection>> {
    let annotated: PathBuf = output_root.join(relative);
    if let Some(parent) = annotated.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let filename = image
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let processed_at = chrono::Utc::now();

    let mut detections = Vec::new();
    for model in models {
        for raw in model.detect(image, &annotated)? {
            if raw.confidence < model.min_confidence() {
                continue;
            }
            detections.push(Detection {
                message_id,
                detected_object_class: raw.class,
                confidence_score: raw.confidence,
                image_filename: filename.clone(),
                relative_path: relative.to_string(),
                processed_at,
            });
        }
    }

    // The annotated copy exists even when nothing was detected; if no backend
    // wrote one, mirror the original bytes.
    if !annotated.exists() {
        std::fs::copy(image, &annotated)
            .with_context(|| format!("Failed to mirror artifact to {}", annotated.display()))?;
    }

    Ok(detections)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_must_be_integer_stem() {
        assert_eq!(
            message_id_from_filename(Path::new("a/b/images/1042.jpg")),
            Some(1042)
        );
        assert_eq!(message_id_from_filename(Path::new("images/cover.jpg")), None);
        assert_eq!(message_id_from_filename(Path::new("images/12a.jpg")), None);
    }

    #[test]
    fn static_model_thresholds_apply() {
        let tmp = tempfile::TempDir::new().unwrap();
        let fixture = tmp.path().join("model.json");
        std::fs::write(
            &fixture,
            r#"{"5.jpg": [
                {"class": "pill", "confidence": 0.95},
                {"class": "pill", "confidence": 0.40}
            ]}"#,
        )
        .unwrap();

        let image = tmp.path().join("5.jpg");
        std::fs::write(&image, b"jpegbytes").unwrap();

        let model = StaticModel::load("specialized", &fixture, 0.70).unwrap();
        let raw = model.detect(&image, &tmp.path().join("out.jpg")).unwrap();
        // The model returns everything; run_detect applies the threshold.
        assert_eq!(raw.len(), 2);
        let kept: Vec<_> = raw
            .iter()
            .filter(|d| d.confidence >= model.min_confidence())
            .collect();
        assert_eq!(kept.len(), 1);
        assert!((kept[0].confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn missing_batch_file_is_empty() {
        let tmp = tempfile::TempDir::new().unwrap();
        let existing = load_existing_detections(&tmp.path().join("nope.json"));
        assert!(existing.is_empty());
    }

    #[test]
    fn corrupt_batch_file_is_empty_not_fatal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("image_detections.json");
        std::fs::write(&path, "{not json").unwrap();
        let existing = load_existing_detections(&path);
        assert!(existing.is_empty());
    }
}
