//! Configuration management for Orthowatch
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//! Everything the pipeline used to read from globals (service URL, layer
//! naming, message limits) lives here and is handed to the orchestrator
//! at construction.

use crate::error::{OrthowatchError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for Orthowatch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote WFS settings
    #[serde(default)]
    pub wfs: WfsConfig,
    /// Webhook delivery settings
    #[serde(default)]
    pub notifier: NotifierConfig,
    /// Change-detection settings
    #[serde(default)]
    pub sync: SyncConfig,
    /// Map image settings
    #[serde(default)]
    pub plot: PlotConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// WFS endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WfsConfig {
    /// GetFeature endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Layer name template; `{year}` is replaced with the dataset year
    #[serde(default = "default_layer_template")]
    pub layer_template: String,

    /// Number of retries after the first attempt
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Delay before the first retry (milliseconds), doubled on each retry
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on a single backoff delay (milliseconds)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Per-attempt request timeout (seconds)
    #[serde(default = "default_wfs_timeout")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "https://mapy.geoportal.gov.pl/wss/service/PZGIK/ORTO/WFS/Skorowidze".to_string()
}

fn default_layer_template() -> String {
    "SkorowidzOrtofomapy{year}".to_string()
}

fn default_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    120_000
}

fn default_wfs_timeout() -> u64 {
    300
}

impl Default for WfsConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            layer_template: default_layer_template(),
            retries: default_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            timeout_seconds: default_wfs_timeout(),
        }
    }
}

/// Webhook notifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Webhook endpoint; normally supplied through `WEBHOOK_URL`
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Messages longer than this many characters are truncated
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Ask the chat service not to unfurl links into embeds
    #[serde(default = "default_suppress_embeds")]
    pub suppress_embeds: bool,

    /// Request timeout (seconds)
    #[serde(default = "default_notifier_timeout")]
    pub timeout_seconds: u64,
}

fn default_max_message_chars() -> usize {
    2000
}

fn default_suppress_embeds() -> bool {
    true
}

fn default_notifier_timeout() -> u64 {
    60
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            max_message_chars: default_max_message_chars(),
            suppress_embeds: default_suppress_embeds(),
            timeout_seconds: default_notifier_timeout(),
        }
    }
}

/// How new sheets are detected
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    /// `watermark < dt_pzgik <= yesterday`, watermark advanced after delivery
    #[default]
    Range,
    /// `dt_pzgik == yesterday`, watermark never read or written
    Equality,
}

/// Change-detection configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Detection strategy
    #[serde(default)]
    pub strategy: SyncStrategy,

    /// Directory holding `last_date_{year}.txt` files
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// Build the notification but do not send it or persist anything
    #[serde(default)]
    pub dry_run: bool,
}

/// Map image configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Render and attach a PNG of the new sheets
    #[serde(default = "default_plot_enabled")]
    pub enabled: bool,

    /// Slippy-map tile URL with `{z}`, `{x}`, `{y}` placeholders; `None`
    /// draws on a plain background
    #[serde(default = "default_tile_url_template")]
    pub tile_url_template: Option<String>,

    /// Image width in pixels
    #[serde(default = "default_plot_width")]
    pub width: u32,

    /// Image height in pixels
    #[serde(default = "default_plot_height")]
    pub height: u32,

    /// Highest basemap zoom level requested
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u8,

    /// User-Agent sent to the tile server
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_plot_enabled() -> bool {
    true
}

fn default_tile_url_template() -> Option<String> {
    Some("https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string())
}

fn default_plot_width() -> u32 {
    1024
}

fn default_plot_height() -> u32 {
    1024
}

fn default_max_zoom() -> u8 {
    12
}

fn default_user_agent() -> String {
    format!("orthowatch/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            enabled: default_plot_enabled(),
            tile_url_template: default_tile_url_template(),
            width: default_plot_width(),
            height: default_plot_height(),
            max_zoom: default_max_zoom(),
            user_agent: default_user_agent(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json_format: bool,

    /// Optional file receiving a copy of the log
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "orthowatch=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            Self::default()
        };

        config.apply_env_vars()?;
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| OrthowatchError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| OrthowatchError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) -> Result<()> {
        if let Ok(webhook_url) = std::env::var("WEBHOOK_URL") {
            if !webhook_url.is_empty() {
                self.notifier.webhook_url = Some(webhook_url);
            }
        }

        if let Ok(base_url) = std::env::var("ORTHOWATCH_WFS_URL") {
            self.wfs.base_url = base_url;
        }

        if let Ok(template) = std::env::var("ORTHOWATCH_LAYER_TEMPLATE") {
            self.wfs.layer_template = template;
        }

        if let Ok(retries) = std::env::var("ORTHOWATCH_RETRIES") {
            self.wfs.retries = retries.parse().map_err(|_| {
                OrthowatchError::Config(format!("Invalid ORTHOWATCH_RETRIES: {}", retries))
            })?;
        }

        if let Ok(timeout) = std::env::var("ORTHOWATCH_TIMEOUT_SECONDS") {
            self.wfs.timeout_seconds = timeout.parse().map_err(|_| {
                OrthowatchError::Config(format!("Invalid ORTHOWATCH_TIMEOUT_SECONDS: {}", timeout))
            })?;
        }

        if let Ok(state_dir) = std::env::var("ORTHOWATCH_STATE_DIR") {
            self.sync.state_dir = Some(PathBuf::from(state_dir));
        }

        if let Ok(strategy) = std::env::var("ORTHOWATCH_STRATEGY") {
            self.sync.strategy = match strategy.to_lowercase().as_str() {
                "range" => SyncStrategy::Range,
                "equality" => SyncStrategy::Equality,
                _ => {
                    return Err(OrthowatchError::Config(format!(
                        "Invalid ORTHOWATCH_STRATEGY: {}",
                        strategy
                    ))
                    .into())
                }
            };
        }

        if let Ok(plot) = std::env::var("ORTHOWATCH_PLOT") {
            self.plot.enabled = plot.parse::<bool>().map_err(|_| {
                OrthowatchError::Config(format!("Invalid ORTHOWATCH_PLOT: {}", plot))
            })?;
        }

        if let Ok(level) = std::env::var("ORTHOWATCH_LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(webhook_url) = &cli.webhook_url {
            if !webhook_url.is_empty() {
                self.notifier.webhook_url = Some(webhook_url.clone());
            }
        }
        if let Some(state_dir) = &cli.state_dir {
            self.sync.state_dir = Some(state_dir.clone());
        }
        if let Some(strategy) = cli.strategy {
            self.sync.strategy = strategy;
        }
        if cli.no_plot {
            self.plot.enabled = false;
        }
        if cli.dry_run {
            self.sync.dry_run = true;
        }
        if cli.json_logs {
            self.logging.json_format = true;
        }
        if cli.verbose {
            self.logging.level = "orthowatch=debug".to_string();
        }
    }

    /// Directory the watermark files live in
    ///
    /// Falls back to the platform data directory, then to the working
    /// directory when no data directory can be determined.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(dir) = &self.sync.state_dir {
            return dir.clone();
        }
        ProjectDirs::from("pl", "orthowatch", "orthowatch")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `OrthowatchError::Config` naming the first offending value.
    /// The webhook URL is only required outside of dry runs.
    pub fn validate(&self) -> Result<()> {
        match self.notifier.webhook_url.as_deref() {
            Some(url) if !url.trim().is_empty() => {
                url::Url::parse(url)
                    .map_err(|e| OrthowatchError::Config(format!("Invalid webhook URL: {}", e)))?;
            }
            // Dry runs print the message instead of posting it.
            _ if self.sync.dry_run => {}
            _ => {
                return Err(
                    OrthowatchError::Config("Missing env variable: WEBHOOK_URL".to_string()).into(),
                );
            }
        }

        url::Url::parse(&self.wfs.base_url)
            .map_err(|e| OrthowatchError::Config(format!("Invalid WFS base URL: {}", e)))?;

        if !self.wfs.layer_template.contains("{year}") {
            return Err(OrthowatchError::Config(
                "wfs.layer_template must contain a {year} placeholder".to_string(),
            )
            .into());
        }

        if self.wfs.retries > 10 {
            return Err(OrthowatchError::Config(
                "wfs.retries must be less than or equal to 10".to_string(),
            )
            .into());
        }

        if self.wfs.timeout_seconds == 0 {
            return Err(OrthowatchError::Config(
                "wfs.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.notifier.max_message_chars == 0 {
            return Err(OrthowatchError::Config(
                "notifier.max_message_chars must be greater than 0".to_string(),
            )
            .into());
        }

        if self.plot.width == 0 || self.plot.height == 0 {
            return Err(OrthowatchError::Config(
                "plot.width and plot.height must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}
