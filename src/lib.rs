//! # gramflow
//!
//! An idempotent, multi-stage ingestion pipeline for public messaging
//! channels: scrape messages and media into raw capture partitions, load
//! them into SQLite, run an optional external transform, enrich images with
//! object detections, and load the detections under a uniqueness constraint.
//!
//! ## Pipeline
//!
//! ```text
//! ┌────────┐   ┌──────┐   ┌───────────┐   ┌────────┐   ┌─────────────────┐
//! │ Scrape │──▶│ Load │──▶│ Transform │──▶│ Detect │──▶│ Load detections │
//! └────────┘   └──────┘   └───────────┘   └────────┘   └─────────────────┘
//!  feed → raw   raw → db    external cmd    images →      batch → db
//!  partitions                               batch file
//! ```
//!
//! Every stage is idempotent against re-runs: the scraper filters ids seen in
//! any prior partition, the loaders insert with `ON CONFLICT DO NOTHING`, and
//! the detector skips artifacts already in the batch file. A stage runs only
//! after its predecessor succeeds; the first failure halts the run with the
//! failing stage attached ([`pipeline::StageError`]).
//!
//! ## Quick Start
//!
//! ```bash
//! gf init                       # create database
//! gf scrape                     # capture today's messages + media
//! gf load                       # raw partitions → messages table
//! gf detect                     # images → detection batch file
//! gf load-detections            # batch file → detections table
//! gf run                        # all five stages in order
//! gf query activity @CheMed123
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`feed`] | Feed client trait and provider dispatch |
//! | [`partition`] | Raw capture-partition storage |
//! | [`scrape`] | Source connector + raw store writer |
//! | [`load`] | Raw partitions → structured store |
//! | [`detect`] | Object-detection enrichment |
//! | [`detect_load`] | Detection batch → structured store |
//! | [`pipeline`] | Five-stage orchestrator |
//! | [`query`] | Read-only query surface |

pub mod config;
pub mod db;
pub mod detect;
pub mod detect_load;
pub mod feed;
pub mod feed_http;
pub mod feed_static;
pub mod load;
pub mod migrate;
pub mod models;
pub mod partition;
pub mod pipeline;
pub mod query;
pub mod scrape;
pub mod sources;
pub mod stats;
