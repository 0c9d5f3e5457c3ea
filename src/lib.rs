//! Orthowatch - Geoportal orthophoto sheet watcher library
//!
//! Watches the yearly orthophoto index layers published over WFS, detects
//! sheets registered since the previous run and announces them on a
//! webhook with a GeoJSON extract and an optional map image.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `wfs`: GetFeature queries, HTTP fetching with retries, response parsing
//! - `storage`: per-layer watermark persistence
//! - `artifacts`: GeoJSON and PNG attachments
//! - `notify`: message formatting and webhook delivery
//! - `sync`: the per-layer pipeline tying everything together
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//! - `logging`: tracing subscriber setup
//!
//! # Example
//!
//! ```no_run
//! use orthowatch::{Config, SyncOrchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let orchestrator = SyncOrchestrator::from_config(&config)?;
//!     let report = orchestrator.run(chrono::Local::now().date_naive()).await;
//!     assert!(!report.has_failures());
//!     Ok(())
//! }
//! ```

pub mod artifacts;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;
pub mod storage;
pub mod sync;
pub mod wfs;

// Re-export commonly used types
pub use config::{Config, SyncStrategy};
pub use error::{OrthowatchError, Result};
pub use notify::{NotificationPayload, Notifier, WebhookNotifier};
pub use storage::{FileWatermarkStore, WatermarkStore};
pub use sync::{RunReport, SyncOrchestrator, SyncOutcome};
pub use wfs::{Layer, QuerySpec, WfsClient};

#[cfg(test)]
pub mod test_utils;
