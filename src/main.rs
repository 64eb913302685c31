//! # gramflow CLI (`gf`)
//!
//! The `gf` binary drives the ingestion pipeline and the read-only query
//! surface over its derived tables.
//!
//! ## Usage
//!
//! ```bash
//! gf --config ./config/gramflow.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `gf init` | Create the SQLite database and run schema migrations |
//! | `gf sources` | List configured channels and their capture state |
//! | `gf scrape` | Capture new messages and media into raw partitions |
//! | `gf load` | Load raw partitions into the messages table |
//! | `gf detect` | Run detection models over captured images |
//! | `gf load-detections` | Load the detection batch into the detections table |
//! | `gf run` | Execute all five stages in order (optionally on a schedule) |
//! | `gf query ...` | Channel activity, message search, keyword frequencies |
//! | `gf stats` | Database row counts and per-channel breakdown |

mod config;
mod db;
mod detect;
mod detect_load;
mod feed;
mod feed_http;
mod feed_static;
mod load;
mod migrate;
mod models;
mod partition;
mod pipeline;
mod query;
mod scrape;
mod sources;
mod stats;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// gramflow — an idempotent scrape/load/detect pipeline for public
/// messaging channels.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/gramflow.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "gf",
    about = "gramflow — an idempotent scrape/load/detect pipeline for public messaging channels",
    version,
    long_about = "gramflow captures messages and images from public messaging channels into \
    date/channel raw partitions, loads them into SQLite, optionally runs an external transform, \
    enriches images with object-detection results, and exposes read-only queries over the \
    derived tables. Every stage tolerates re-runs without duplicating data."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/gramflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file, the messages and detections tables
    /// with their uniqueness constraints, and all indexes. Idempotent.
    Init,

    /// List configured channels and their capture state.
    Sources,

    /// Capture new messages and media from the feed.
    ///
    /// For each configured channel, fetches recent messages, filters out ids
    /// already captured on any prior date, downloads missing media, and
    /// replaces today's partition atomically. A feed failure on one channel
    /// does not abort the others.
    Scrape {
        /// Capture date (YYYY-MM-DD); defaults to today (UTC).
        #[arg(long)]
        date: Option<String>,
    },

    /// Load raw partitions into the messages table.
    ///
    /// Item-level idempotent: re-running over already-loaded partitions
    /// inserts zero additional rows.
    Load,

    /// Run detection models over captured images.
    ///
    /// Skips artifacts already present in the detection batch file and
    /// mirrors an annotated copy of each processed image.
    Detect,

    /// Load the detection batch file into the detections table.
    ///
    /// Duplicate (message, image, class) triples are silent no-ops; one
    /// malformed record does not abort the batch.
    LoadDetections,

    /// Execute the full pipeline: scrape, load, transform, detect,
    /// load-detections. A stage failure halts the run.
    Run {
        /// Keep running, triggering one pipeline instance daily at
        /// `schedule.daily_at`.
        #[arg(long)]
        watch: bool,
    },

    /// Read-only queries over the loaded tables.
    Query {
        #[command(subcommand)]
        action: QueryAction,
    },

    /// Database row counts and per-channel breakdown.
    Stats,
}

/// Query subcommands.
#[derive(Subcommand)]
enum QueryAction {
    /// Daily message counts for a channel.
    Activity {
        /// Channel handle, e.g. `@CheMed123`.
        channel: String,
    },
    /// Search message text (case-insensitive substring, at most 100 hits).
    Search {
        /// The text to search for.
        query: String,
    },
    /// Top known-vocabulary keywords by frequency.
    Keywords {
        /// Maximum number of keywords to return.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Scrape { date } => {
            let date = match date {
                Some(s) => chrono::NaiveDate::parse_from_str(&s, partition::DATE_FMT)?,
                None => chrono::Utc::now().date_naive(),
            };
            scrape::run_scrape(&cfg, date).await?;
        }
        Commands::Load => {
            load::run_load(&cfg).await?;
        }
        Commands::Detect => {
            detect::run_detect(&cfg)?;
        }
        Commands::LoadDetections => {
            detect_load::run_load_detections(&cfg).await?;
        }
        Commands::Run { watch } => {
            if watch {
                pipeline::run_watch(&cfg).await?;
            } else {
                pipeline::run_pipeline(&cfg).await?;
            }
        }
        Commands::Query { action } => match action {
            QueryAction::Activity { channel } => {
                query::run_activity(&cfg, &channel).await?;
            }
            QueryAction::Search { query: text } => {
                query::run_search(&cfg, &text).await?;
            }
            QueryAction::Keywords { limit } => {
                query::run_keywords(&cfg, limit).await?;
            }
        },
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
