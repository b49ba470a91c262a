//! Command-line interface definitions for both binaries.
//!
//! Arguments are parsed with `clap` derive; the settings file path can also
//! come from the environment.

use crate::config::RunMode;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for `news_brief`.
///
/// # Examples
///
/// ```sh
/// # Hourly categories with built-in settings
/// news_brief
///
/// # Every category, settings from a file
/// news_brief daily --config ./news_brief.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Which categories to run: `hourly` skips daily-only categories
    #[arg(value_enum, default_value_t)]
    pub mode: RunMode,

    /// Optional path to a YAML settings file
    #[arg(short, long, env = "NEWS_BRIEF_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Command-line arguments for `gis_scraper`.
#[derive(Parser, Debug)]
#[command(name = "gis_scraper", author, version, about = "Refresh municipal GIS layers on a weekday rotation")]
pub struct GisCli {
    /// Run as if today were this weekday (0 = Monday … 6 = Sunday)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=6))]
    pub day: Option<u8>,

    /// Refresh every rotated layer regardless of the day
    #[arg(long)]
    pub all: bool,

    /// Root directory holding the layer groups
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,
}
