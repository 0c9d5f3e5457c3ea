//! Test utilities for Orthowatch
//!
//! Temporary directories, canned WFS responses, in-memory stand-ins for the
//! store and notifier seams, and assertion helpers shared by the unit tests.

use crate::config::Config;
use crate::error::{OrthowatchError, Result};
use crate::notify::{NotificationPayload, Notifier};
use crate::storage::WatermarkStore;
use crate::wfs::Layer;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

/// Create a temporary directory for testing
///
/// # Returns
///
/// Returns a TempDir that will be cleaned up when dropped
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Create a test file with the given content
///
/// # Panics
///
/// Panics if file creation or writing fails
pub fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Parse a `YYYY-MM-DD` literal
pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("Invalid test date")
}

/// Assert that an error is an `OrthowatchError` whose message contains
/// `expected`
///
/// # Panics
///
/// Panics if the result is Ok, the error is not an `OrthowatchError`, or the
/// message doesn't contain the expected text
pub fn assert_error_contains<T>(result: anyhow::Result<T>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let inner = e
                .downcast_ref::<OrthowatchError>()
                .unwrap_or_else(|| panic!("Not an OrthowatchError: {:#}", e));
            let error_msg = inner.to_string();
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// One `wfs:member` sheet with lat/lon corners and an optional `dt_pzgik`
pub fn member_xml(lower: &str, upper: &str, registered: Option<&str>) -> String {
    let registered = registered
        .map(|d| {
            format!(
                "<ms:dt_pzgik><gml:timePosition>{}</gml:timePosition></ms:dt_pzgik>",
                d
            )
        })
        .unwrap_or_default();
    format!(
        r#"<wfs:member><ms:SkorowidzOrtofomapy2024 gml:id="s.1">
<gml:boundedBy><gml:Envelope srsName="urn:ogc:def:crs:EPSG::4326">
<gml:lowerCorner>{}</gml:lowerCorner><gml:upperCorner>{}</gml:upperCorner>
</gml:Envelope></gml:boundedBy>
<ms:url_do_pobrania>https://opendata.example/sheet.tif</ms:url_do_pobrania>{}
</ms:SkorowidzOrtofomapy2024></wfs:member>"#,
        lower, upper, registered
    )
}

/// A `wfs:FeatureCollection` with the given root attributes and members
pub fn feature_collection_xml(attrs: &str, members: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<wfs:FeatureCollection xmlns:wfs="http://www.opengis.net/wfs/2.0"
    xmlns:gml="http://www.opengis.net/gml/3.2" xmlns:ms="http://www.gugik.gov.pl" {}>
<wfs:boundedBy><gml:Envelope srsName="urn:ogc:def:crs:EPSG::4326">
<gml:lowerCorner>52.1 21.0</gml:lowerCorner><gml:upperCorner>52.5 21.5</gml:upperCorner>
</gml:Envelope></wfs:boundedBy>
{}
</wfs:FeatureCollection>"#,
        attrs, members
    )
}

/// Create a test configuration that passes validation
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.notifier.webhook_url = Some("https://hooks.example/api/webhooks/1/token".to_string());
    config.plot.tile_url_template = None;
    config
}

/// Create a test configuration YAML string
pub fn test_config_yaml() -> String {
    r#"
wfs:
  base_url: http://localhost:8080/wfs
  layer_template: "SkorowidzOrtofomapy{year}"
  retries: 2
  backoff_base_ms: 10
  timeout_seconds: 5

notifier:
  webhook_url: http://localhost:8080/hook
  max_message_chars: 2000

sync:
  strategy: range
  state_dir: /tmp/orthowatch-test

plot:
  enabled: false

logging:
  level: orthowatch=debug
"#
    .to_string()
}

/// In-process watermark store that counts saves
#[derive(Default)]
pub struct MemoryWatermarkStore {
    dates: Mutex<HashMap<String, NaiveDate>>,
    saves: Mutex<usize>,
}

impl MemoryWatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with one layer's watermark
    pub fn with(layer: &Layer, date: NaiveDate) -> Self {
        let store = Self::new();
        store
            .dates
            .lock()
            .unwrap()
            .insert(layer.name().to_string(), date);
        store
    }

    /// Number of successful `save` calls
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }

    /// Current watermark without going through the trait
    pub fn get(&self, layer: &Layer) -> Option<NaiveDate> {
        self.dates.lock().unwrap().get(layer.name()).copied()
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    fn load(&self, layer: &Layer) -> Result<Option<NaiveDate>> {
        Ok(self.get(layer))
    }

    fn save(&self, layer: &Layer, date: NaiveDate) -> Result<()> {
        self.dates
            .lock()
            .unwrap()
            .insert(layer.name().to_string(), date);
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }
}

/// Notifier that keeps every payload in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<NotificationPayload>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads received so far
    pub fn sent(&self) -> Vec<NotificationPayload> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, payload: &NotificationPayload) -> Result<()> {
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wfs::Document;

    #[test]
    fn test_temp_dir_creation() {
        let dir = temp_dir();
        assert!(dir.path().exists());
    }

    #[test]
    fn test_create_test_file() {
        let dir = temp_dir();
        let path = create_test_file(&dir, "test.txt", "content");
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "content");
    }

    #[test]
    fn test_assert_error_contains_success() {
        let result: anyhow::Result<()> =
            Err(OrthowatchError::Config("test error message".to_string()).into());
        assert_error_contains(result, "test error");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        let result: anyhow::Result<()> = Ok(());
        assert_error_contains(result, "error");
    }

    #[test]
    #[should_panic(expected = "does not contain")]
    fn test_assert_error_contains_wrong_message() {
        let result: anyhow::Result<()> =
            Err(OrthowatchError::Config("different error".to_string()).into());
        assert_error_contains(result, "not present");
    }

    #[test]
    fn test_test_config_is_valid() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_test_config_yaml() {
        let config: Config = serde_yaml::from_str(&test_config_yaml()).unwrap();
        assert_eq!(config.wfs.retries, 2);
        assert!(!config.plot.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_memory_store_counts_saves() {
        let layer = Layer::new("SkorowidzOrtofomapy2024", 2024);
        let store = MemoryWatermarkStore::with(&layer, date("2024-06-01"));
        assert_eq!(store.load(&layer).unwrap(), Some(date("2024-06-01")));
        assert_eq!(store.save_count(), 0);

        store.save(&layer, date("2024-06-10")).unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.get(&layer), Some(date("2024-06-10")));
    }

    #[tokio::test]
    async fn test_recording_notifier() {
        let recorder = RecordingNotifier::new();
        recorder
            .notify(&NotificationPayload::new("hello"))
            .await
            .unwrap();
        assert_eq!(recorder.sent().len(), 1);
        assert_eq!(recorder.sent()[0].content, "hello");
    }

    #[test]
    fn test_fixture_xml_parses() {
        let xml = feature_collection_xml(
            r#"numberMatched="1" numberReturned="1""#,
            &member_xml("52.1 21.0", "52.2 21.1", Some("2024-06-10")),
        );
        assert!(Document::parse(xml.as_bytes()).is_ok());
    }
}
