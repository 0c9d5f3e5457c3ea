//! Orthowatch - Geoportal orthophoto sheet watcher
//!
#![doc = "Orthowatch - Geoportal orthophoto sheet watcher"]
#![doc = "Main entry point, meant to be run once a day by a scheduler."]

use anyhow::Result;
use chrono::{Days, Local};

use orthowatch::cli::Cli;
use orthowatch::config::Config;
use orthowatch::logging::init_logging;
use orthowatch::sync::SyncOrchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    // Pick up WEBHOOK_URL and ORTHOWATCH_* from a local .env; real
    // environment variables take precedence.
    dotenvy::dotenv().ok();

    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    init_logging(&config.logging)?;

    // Validate configuration
    config.validate()?;

    // DATE stands in for "yesterday", so the run behaves as if started the
    // following day.
    let today = match cli.date {
        Some(date) => date
            .checked_add_days(Days::new(1))
            .ok_or_else(|| anyhow::anyhow!("Date out of range: {}", date))?,
        None => Local::now().date_naive(),
    };
    tracing::info!(
        %today,
        strategy = ?config.sync.strategy,
        dry_run = config.sync.dry_run,
        "Starting orthophoto check"
    );

    let orchestrator = SyncOrchestrator::from_config(&config)?;
    let report = orchestrator.run(today).await;

    if report.has_failures() {
        let failed: Vec<String> = report.failures().map(|l| l.layer.to_string()).collect();
        anyhow::bail!("Failed layers: {}", failed.join(", "));
    }

    tracing::info!("Orthophoto check finished");
    Ok(())
}
