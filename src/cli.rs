//! Command-line interface definition for Orthowatch
//!
//! This module defines the CLI structure using clap's derive API. The tool
//! has a single mode of operation, so there are no subcommands: one run
//! checks the previous-year and current-year layers and exits.

use crate::config::SyncStrategy;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

/// Orthowatch - Geoportal orthophoto sheet watcher
///
/// Queries the orthophoto index WFS for sheets registered since the last
/// run and posts a summary with a GeoJSON extract to a webhook.
#[derive(Parser, Debug, Clone)]
#[command(name = "orthowatch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Reference date (YYYY-MM-DD) used instead of yesterday
    #[arg(value_name = "DATE")]
    pub date: Option<NaiveDate>,

    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Webhook URL notifications are posted to
    #[arg(long, env = "WEBHOOK_URL", hide_env_values = true)]
    pub webhook_url: Option<String>,

    /// Directory holding the per-layer watermark files
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// Change-detection strategy (range, equality)
    #[arg(long, value_enum)]
    pub strategy: Option<SyncStrategy>,

    /// Skip rendering the map image
    #[arg(long)]
    pub no_plot: bool,

    /// Log the notification instead of sending it; never writes watermarks
    #[arg(long)]
    pub dry_run: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub json_logs: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            date: None,
            config: Some("config/config.yaml".to_string()),
            webhook_url: None,
            state_dir: None,
            strategy: None,
            no_plot: false,
            dry_run: false,
            json_logs: false,
            verbose: false,
        }
    }
}
