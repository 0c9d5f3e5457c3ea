//! Change detection per layer
//!
//! A layer cycle loads the watermark, queries the index for sheets
//! registered after it, and when something matched builds the attachments,
//! notifies, and only then advances the watermark. Any error leaves the
//! stored watermark untouched so the next run retries the same window.

use crate::artifacts::{to_geometry_collection, Attachment, PlotRenderer, RasterPlotRenderer};
use crate::config::{Config, SyncStrategy};
use crate::error::{OrthowatchError, Result};
use crate::notify::{
    format_message, Announcement, DryRunNotifier, NotificationPayload, Notifier, WebhookNotifier,
};
use crate::storage::{format_watermark, FileWatermarkStore, ReadOnlyStore, WatermarkStore};
use crate::wfs::{interpret, Layer, QuerySpec, ResponseSummary, WfsClient};
use chrono::{Datelike, NaiveDate};
use std::fmt;
use tracing::Instrument;

/// Result of one layer cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing new matched
    NoChange,
    /// New sheets were announced and the watermark moved `from` → `to`
    Advanced {
        from: NaiveDate,
        to: NaiveDate,
        matched: u64,
    },
    /// Sheets registered on `date` were announced; no watermark involved
    Notified { date: NaiveDate, matched: u64 },
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::NoChange => write!(f, "no change"),
            SyncOutcome::Advanced { from, to, matched } => {
                write!(f, "{} new sheets, watermark {} -> {}", matched, from, to)
            }
            SyncOutcome::Notified { date, matched } => {
                write!(f, "{} sheets registered on {}", matched, date)
            }
        }
    }
}

/// Outcome of one layer within a run
#[derive(Debug)]
pub struct LayerReport {
    pub layer: Layer,
    pub result: Result<SyncOutcome>,
}

/// Outcomes of every layer processed by [`SyncOrchestrator::run`]
#[derive(Debug, Default)]
pub struct RunReport {
    pub layers: Vec<LayerReport>,
}

impl RunReport {
    /// Layers whose cycle returned an error
    pub fn failures(&self) -> impl Iterator<Item = &LayerReport> {
        self.layers.iter().filter(|l| l.result.is_err())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Title of the map image for a date range
pub fn plot_title(old: &str, new: &str) -> String {
    format!("Ortofotomapy dodane między {} a {}", old, new)
}

/// Drives the per-layer pipeline
pub struct SyncOrchestrator {
    client: WfsClient,
    store: Box<dyn WatermarkStore>,
    notifier: Box<dyn Notifier>,
    renderer: Option<Box<dyn PlotRenderer>>,
    strategy: SyncStrategy,
    layer_template: String,
}

impl SyncOrchestrator {
    /// Create an orchestrator using the range strategy and no plot
    pub fn new(
        client: WfsClient,
        store: Box<dyn WatermarkStore>,
        notifier: Box<dyn Notifier>,
        layer_template: impl Into<String>,
    ) -> Self {
        Self {
            client,
            store,
            notifier,
            renderer: None,
            strategy: SyncStrategy::default(),
            layer_template: layer_template.into(),
        }
    }

    pub fn with_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_renderer(mut self, renderer: Box<dyn PlotRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Wire up the production components described by `config`
    ///
    /// Dry runs keep reading the real watermark files but never write them
    /// and print the message instead of posting it.
    ///
    /// # Errors
    ///
    /// Returns error if an HTTP client cannot be built or the webhook URL is
    /// missing outside of a dry run
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = WfsClient::new(&config.wfs)?;
        let files = FileWatermarkStore::new(config.state_dir());
        tracing::debug!(state_dir = %files.dir().display(), "Using watermark directory");

        let (store, notifier): (Box<dyn WatermarkStore>, Box<dyn Notifier>) =
            if config.sync.dry_run {
                (Box::new(ReadOnlyStore::new(files)), Box::new(DryRunNotifier))
            } else {
                (
                    Box::new(files),
                    Box::new(WebhookNotifier::new(&config.notifier)?),
                )
            };

        let mut orchestrator = Self::new(client, store, notifier, &config.wfs.layer_template)
            .with_strategy(config.sync.strategy);
        if config.plot.enabled {
            let renderer = RasterPlotRenderer::new(&config.plot)?;
            orchestrator = orchestrator.with_renderer(Box::new(renderer));
        }
        Ok(orchestrator)
    }

    /// Previous-year and current-year layers, years taken from yesterday
    pub fn layers_for(&self, today: NaiveDate) -> [Layer; 2] {
        let year = today.pred_opt().unwrap_or(today).year();
        [
            Layer::from_template(&self.layer_template, year - 1),
            Layer::from_template(&self.layer_template, year),
        ]
    }

    /// Process both layers in order
    ///
    /// A failing layer is logged and recorded; the next one still runs.
    pub async fn run(&self, today: NaiveDate) -> RunReport {
        let mut report = RunReport::default();
        for layer in self.layers_for(today) {
            let span = crate::layer_span!(layer, self.strategy);
            let result = self.run_layer(&layer, today).instrument(span).await;
            match &result {
                Ok(outcome) => tracing::info!(layer = %layer, %outcome, "Layer processed"),
                Err(e) => {
                    let error = format!("{:#}", e);
                    tracing::error!(layer = %layer, %error, "Layer failed")
                }
            }
            report.layers.push(LayerReport { layer, result });
        }
        report
    }

    /// Run one cycle for `layer` as of `today`
    ///
    /// # Errors
    ///
    /// Propagates storage, fetch, parse, format and delivery failures; the
    /// watermark is only written after a successful delivery
    pub async fn run_layer(&self, layer: &Layer, today: NaiveDate) -> Result<SyncOutcome> {
        let yesterday = today
            .pred_opt()
            .ok_or_else(|| OrthowatchError::Validation(format!("No day before {}", today)))?;

        match self.strategy {
            SyncStrategy::Range => self.run_range(layer, yesterday).await,
            SyncStrategy::Equality => self.run_equality(layer, yesterday).await,
        }
    }

    async fn run_range(&self, layer: &Layer, yesterday: NaiveDate) -> Result<SyncOutcome> {
        let watermark = self.store.load(layer)?;
        let lower = watermark.unwrap_or(yesterday);
        tracing::info!(
            watermark = ?watermark,
            lower = %lower,
            upper = %yesterday,
            "Checking for new sheets"
        );

        let query = QuerySpec::range(layer, lower, yesterday)?;
        let Some(summary) = self.query(&query).await? else {
            return Ok(SyncOutcome::NoChange);
        };

        let newest = summary.max_registered;
        let announced = QuerySpec::range(layer, lower, newest)?;
        self.deliver(layer, lower, newest, &summary, &announced).await?;
        self.store.save(layer, newest)?;

        Ok(SyncOutcome::Advanced {
            from: lower,
            to: newest,
            matched: summary.matched,
        })
    }

    async fn run_equality(&self, layer: &Layer, yesterday: NaiveDate) -> Result<SyncOutcome> {
        tracing::info!(date = %yesterday, "Checking for sheets registered on date");

        let query = QuerySpec::equal(layer, yesterday);
        let Some(summary) = self.query(&query).await? else {
            return Ok(SyncOutcome::NoChange);
        };

        self.deliver(layer, yesterday, yesterday, &summary, &query).await?;
        Ok(SyncOutcome::Notified {
            date: yesterday,
            matched: summary.matched,
        })
    }

    async fn query(&self, query: &QuerySpec) -> Result<Option<ResponseSummary>> {
        let doc = self.client.fetch(query).await?;
        let summary = interpret::summarize(&doc)?;
        match &summary {
            Some(s) => tracing::info!(
                matched = s.matched,
                returned = s.records.len(),
                newest = %s.max_registered,
                "New sheets found"
            ),
            None => tracing::info!("No new sheets"),
        }
        Ok(summary)
    }

    async fn deliver(
        &self,
        layer: &Layer,
        old: NaiveDate,
        new: NaiveDate,
        summary: &ResponseSummary,
        announced: &QuerySpec,
    ) -> Result<()> {
        let (old, new) = (format_watermark(old), format_watermark(new));
        let url = announced.to_url(self.client.base_url())?;

        let collection = to_geometry_collection(summary);
        let mut payload = NotificationPayload::default()
            .with_attachment(Attachment::geojson(&old, &new, collection.to_bytes()?));

        if let Some(renderer) = &self.renderer {
            match renderer.render(&collection, &plot_title(&old, &new)).await {
                Ok(png) => {
                    payload = payload.with_attachment(Attachment::png(&old, &new, png));
                }
                Err(e) => {
                    let error = format!("{:#}", e);
                    tracing::warn!(%error, "Plot rendering failed, sending without image")
                }
            }
        }

        payload.content = format_message(&Announcement {
            old_date: old,
            new_date: new,
            matched: summary.matched,
            layer: layer.name().to_string(),
            url: url.to_string(),
        });

        self.notifier.notify(&payload).await
    }
}

impl fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("client", &self.client)
            .field("strategy", &self.strategy)
            .field("layer_template", &self.layer_template)
            .field("plot", &self.renderer.is_some())
            .finish()
    }
}
