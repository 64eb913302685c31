//! Pipeline orchestration.
//!
//! A fixed five-stage sequence: Scrape → Load → Transform → Detect →
//! LoadDetections. A stage runs only after its predecessor succeeded; the
//! first failure halts the run and is attributed structurally via
//! [`StageError`] rather than by wherever an error happened to bubble up.
//!
//! `run_watch` re-runs the pipeline daily; each tick is an independent
//! instance. Overlapping runs from separate processes are not guarded.

use anyhow::{bail, Context, Result};
use chrono::{NaiveTime, Utc};
use std::fmt;
use std::process::Command;
use thiserror::Error;

use crate::config::Config;
use crate::detect;
use crate::detect_load;
use crate::load;
use crate::models::PipelineReport;
use crate::scrape;

/// The five pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scrape,
    Load,
    Transform,
    Detect,
    LoadDetections,
}

impl Stage {
    pub const ORDER: [Stage; 5] = [
        Stage::Scrape,
        Stage::Load,
        Stage::Transform,
        Stage::Detect,
        Stage::LoadDetections,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Scrape => "scrape",
            Stage::Load => "load",
            Stage::Transform => "transform",
            Stage::Detect => "detect",
            Stage::LoadDetections => "load-detections",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A pipeline run that halted at a specific stage.
#[derive(Debug, Error)]
#[error("pipeline failed at stage '{stage}': {cause:#}")]
pub struct StageError {
    pub stage: Stage,
    pub cause: anyhow::Error,
}

fn at(stage: Stage) -> impl FnOnce(anyhow::Error) -> StageError {
    move |cause| StageError { stage, cause }
}

/// Execute one full pipeline instance.
pub async fn run_pipeline(config: &Config) -> Result<PipelineReport, StageError> {
    let mut report = PipelineReport::default();
    let date = Utc::now().date_naive();

    let capture = scrape::run_scrape(config, date)
        .await
        .map_err(at(Stage::Scrape))?;
    report.messages_captured = capture.total_new();

    let loaded = load::run_load(config).await.map_err(at(Stage::Load))?;
    report.messages_loaded = loaded.messages_inserted;

    run_transform(config).map_err(at(Stage::Transform))?;

    let detected = detect::run_detect(config).map_err(at(Stage::Detect))?;
    report.detections_found = detected.new_detections;

    report.detections_loaded = detect_load::run_load_detections(config)
        .await
        .map_err(at(Stage::LoadDetections))?;

    println!("pipeline ok");
    println!("  captured: {}", report.messages_captured);
    println!("  loaded: {}", report.messages_loaded);
    println!("  detections found: {}", report.detections_found);
    println!("  detections loaded: {}", report.detections_loaded);

    Ok(report)
}

/// The transform stage is an external command with a success/failure signal.
/// No configured command means the stage is a recorded no-op.
fn run_transform(config: &Config) -> Result<()> {
    let argv = match &config.transform.command {
        Some(argv) => argv,
        None => {
            println!("transform: no command configured, skipping");
            return Ok(());
        }
    };

    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..]);
    if let Some(workdir) = &config.transform.workdir {
        cmd.current_dir(workdir);
    }

    let output = cmd
        .output()
        .with_context(|| format!("Failed to execute transform command '{}'", argv[0]))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("transform command exited non-zero: {}", stderr.trim());
    }

    println!("transform ok ({})", argv.join(" "));
    Ok(())
}

/// Run the pipeline once a day at `schedule.daily_at`, forever. A failed run
/// is reported and the next tick still happens; ticks share nothing but the
/// persisted stores.
pub async fn run_watch(config: &Config) -> Result<()> {
    let at_str = config
        .schedule
        .daily_at
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("run --watch requires schedule.daily_at in config"))?;
    let daily_at = NaiveTime::parse_from_str(at_str, "%H:%M")?;

    loop {
        let wait = until_next(daily_at);
        println!(
            "watch: next run at {} UTC (in {}s)",
            at_str,
            wait.as_secs()
        );
        tokio::time::sleep(wait).await;

        if let Err(e) = run_pipeline(config).await {
            eprintln!("error: {}", e);
        }
    }
}

fn until_next(daily_at: NaiveTime) -> std::time::Duration {
    let now = Utc::now();
    let today = now.date_naive().and_time(daily_at).and_utc();
    let next = if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    };
    (next - now).to_std().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_is_fixed() {
        let names: Vec<&str> = Stage::ORDER.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["scrape", "load", "transform", "detect", "load-detections"]
        );
    }

    #[test]
    fn stage_error_names_the_stage() {
        let err = StageError {
            stage: Stage::Transform,
            cause: anyhow::anyhow!("dbt exited with status 2"),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("transform"));
        assert!(rendered.contains("dbt exited"));
    }

    #[test]
    fn next_tick_is_within_a_day() {
        let wait = until_next(NaiveTime::from_hms_opt(3, 30, 0).unwrap());
        assert!(wait <= std::time::Duration::from_secs(86_400));
    }
}
