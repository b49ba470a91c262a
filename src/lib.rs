//! # News Brief
//!
//! A news aggregation pipeline that pulls articles from news APIs and RSS
//! feeds, has a generative model score, annotate and translate them, and
//! publishes static HTML pages plus JSON records per category and language.
//!
//! ## Architecture
//!
//! Each category runs through the same stages:
//! 1. **Fetching**: every configured source in parallel ([`sources`])
//! 2. **Deduplication**: by normalized URL and title
//! 3. **Enrichment**: one model call scores up to 20 articles
//! 4. **Translation**: one model call per target language, English fallback
//! 5. **Output**: HTML and JSON per (category, language) ([`outputs`])
//!
//! Categories are scheduled with staggered starts under a global run budget
//! ([`pipeline::orchestrator`]).
//!
//! The crate also ships a GIS layer refresher ([`gis`]) used by the
//! `gis_scraper` binary.

pub mod api;
pub mod cli;
pub mod config;
pub mod gis;
pub mod models;
pub mod outputs;
pub mod pipeline;
pub mod sources;
pub mod utils;

use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

/// Install the global subscriber: `RUST_LOG` filtering (default `info`),
/// RFC 3339 UTC timestamps.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();
}

/// Load `.env` (from `path`, or searched upward from the working directory),
/// then install the subscriber so a `RUST_LOG` set there takes effect.
///
/// Returns the file that was loaded, if any.
pub fn init_environment(path: Option<&Path>) -> Option<PathBuf> {
    let loaded = match path {
        Some(p) => dotenvy::from_path(p).ok().map(|_| p.to_path_buf()),
        None => dotenvy::dotenv().ok(),
    };
    init_tracing();
    loaded
}
