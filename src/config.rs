use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub raw: RawStoreConfig,
    pub feed: FeedConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub transform: TransformConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RawStoreConfig {
    /// Root of the raw capture store: `<root>/<date>/<channel>/<channel>.json`.
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    /// Feed provider: `http` or `static`.
    #[serde(default = "default_feed_provider")]
    pub provider: String,
    /// Base URL of the feed gateway (http provider).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Directory holding `<channel>.json` fixtures (static provider).
    #[serde(default)]
    pub fixture_root: Option<PathBuf>,
    /// Channels to capture, e.g. `["@CheMed123"]`.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Most-recent messages fetched per channel per capture.
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_feed_provider() -> String {
    "http".to_string()
}
fn default_fetch_limit() -> usize {
    200
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectionConfig {
    /// Root for annotated copies and the detection batch file.
    #[serde(default = "default_detection_output_root")]
    pub output_root: PathBuf,
    #[serde(default = "default_general_model")]
    pub general: ModelConfig,
    #[serde(default = "default_specialized_model")]
    pub specialized: ModelConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            output_root: default_detection_output_root(),
            general: default_general_model(),
            specialized: default_specialized_model(),
        }
    }
}

impl DetectionConfig {
    /// The single JSON array holding all detections found so far.
    pub fn batch_file(&self) -> PathBuf {
        self.output_root.join("image_detections.json")
    }
}

fn default_detection_output_root() -> PathBuf {
    PathBuf::from("data/raw/detected_images")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Model provider: `command`, `static`, or `disabled`.
    #[serde(default = "default_model_provider")]
    pub provider: String,
    /// Detector invocation (command provider); the image path and the
    /// annotated output path are appended as the last two arguments.
    #[serde(default)]
    pub command: Vec<String>,
    /// JSON fixture mapping image filenames to detections (static provider).
    #[serde(default)]
    pub fixture: Option<PathBuf>,
    /// Detections below this confidence are dropped.
    #[serde(default)]
    pub min_confidence: f64,
}

fn default_model_provider() -> String {
    "disabled".to_string()
}

fn default_general_model() -> ModelConfig {
    ModelConfig {
        provider: default_model_provider(),
        command: Vec::new(),
        fixture: None,
        // The general model is intentionally unfiltered.
        min_confidence: 0.0,
    }
}

fn default_specialized_model() -> ModelConfig {
    ModelConfig {
        provider: default_model_provider(),
        command: Vec::new(),
        fixture: None,
        min_confidence: 0.70,
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TransformConfig {
    /// External transform invocation, e.g. `["dbt", "run"]`. Unset means the
    /// transform stage is a recorded no-op.
    #[serde(default)]
    pub command: Option<Vec<String>>,
    /// Working directory for the transform command.
    #[serde(default)]
    pub workdir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ScheduleConfig {
    /// Daily trigger time for `gf run --watch`, `HH:MM` (UTC).
    #[serde(default)]
    pub daily_at: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    /// Vocabulary counted by `gf query keywords`.
    #[serde(default = "default_known_keywords")]
    pub known_keywords: Vec<String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            known_keywords: default_known_keywords(),
        }
    }
}

fn default_known_keywords() -> Vec<String> {
    [
        "cosmetics",
        "vucryl",
        "gloves",
        "ventilators",
        "syringe",
        "wheelchair",
        "alcohol",
        "metoclorpromid",
        "forceps",
        "ibuprofen",
        "facemask",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate feed
    match config.feed.provider.as_str() {
        "http" => {
            if config.feed.base_url.is_none() {
                anyhow::bail!("feed.base_url must be set when feed.provider is 'http'");
            }
        }
        "static" => {
            if config.feed.fixture_root.is_none() {
                anyhow::bail!("feed.fixture_root must be set when feed.provider is 'static'");
            }
        }
        other => anyhow::bail!("Unknown feed provider: '{}'. Must be http or static.", other),
    }

    if config.feed.fetch_limit == 0 {
        anyhow::bail!("feed.fetch_limit must be > 0");
    }

    // Validate detection models
    for (name, model) in [
        ("general", &config.detection.general),
        ("specialized", &config.detection.specialized),
    ] {
        match model.provider.as_str() {
            "disabled" => {}
            "command" => {
                if model.command.is_empty() {
                    anyhow::bail!(
                        "detection.{}.command must be set when provider is 'command'",
                        name
                    );
                }
            }
            "static" => {
                if model.fixture.is_none() {
                    anyhow::bail!(
                        "detection.{}.fixture must be set when provider is 'static'",
                        name
                    );
                }
            }
            other => anyhow::bail!(
                "Unknown detection provider for '{}': '{}'. Must be command, static, or disabled.",
                name,
                other
            ),
        }
        if !(0.0..=1.0).contains(&model.min_confidence) {
            anyhow::bail!("detection.{}.min_confidence must be in [0.0, 1.0]", name);
        }
    }

    // Validate transform
    if let Some(cmd) = &config.transform.command {
        if cmd.is_empty() {
            anyhow::bail!("transform.command must not be an empty list");
        }
    }

    // Validate schedule
    if let Some(at) = &config.schedule.daily_at {
        chrono::NaiveTime::parse_from_str(at, "%H:%M")
            .with_context(|| format!("schedule.daily_at must be HH:MM, got '{}'", at))?;
    }

    Ok(config)
}
