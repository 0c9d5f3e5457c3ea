use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use orthowatch::config::{NotifierConfig, WfsConfig};

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

#[allow(dead_code)]
pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("invalid test date")
}

/// WFS settings pointing at a mock server with millisecond backoff
#[allow(dead_code)]
pub fn wfs_config(base_url: &str, retries: u32) -> WfsConfig {
    WfsConfig {
        base_url: base_url.to_string(),
        retries,
        backoff_base_ms: 5,
        max_backoff_ms: 20,
        timeout_seconds: 5,
        ..WfsConfig::default()
    }
}

#[allow(dead_code)]
pub fn notifier_config(webhook_url: &str) -> NotifierConfig {
    NotifierConfig {
        webhook_url: Some(webhook_url.to_string()),
        timeout_seconds: 5,
        ..NotifierConfig::default()
    }
}

#[allow(dead_code)]
pub fn member_xml(lower: &str, upper: &str, registered: &str) -> String {
    format!(
        r#"<wfs:member><ms:SkorowidzOrtofomapy2024 gml:id="SkorowidzOrtofomapy2024.1">
<gml:boundedBy><gml:Envelope srsName="urn:ogc:def:crs:EPSG::4326">
<gml:lowerCorner>{}</gml:lowerCorner><gml:upperCorner>{}</gml:upperCorner>
</gml:Envelope></gml:boundedBy>
<ms:akt_data><gml:timePosition>2024-05-20</gml:timePosition></ms:akt_data>
<ms:dt_pzgik><gml:timePosition>{}</gml:timePosition></ms:dt_pzgik>
<ms:url_do_pobrania>https://opendata.example/ortofoto/sheet.tif</ms:url_do_pobrania>
</ms:SkorowidzOrtofomapy2024></wfs:member>"#,
        lower, upper, registered
    )
}

/// Response matching `registered.len()` sheets
#[allow(dead_code)]
pub fn feature_collection_xml(registered: &[&str]) -> String {
    let attrs = format!(
        r#"numberMatched="{n}" numberReturned="{n}""#,
        n = registered.len()
    );
    collection_with_attrs_xml(&attrs, registered)
}

/// Response whose root carries only `attrs` besides the namespaces
#[allow(dead_code)]
pub fn collection_with_attrs_xml(attrs: &str, registered: &[&str]) -> String {
    let members: String = registered
        .iter()
        .enumerate()
        .map(|(i, d)| {
            let lat = 52.1 + i as f64 * 0.05;
            member_xml(
                &format!("{:.2} 21.0", lat),
                &format!("{:.2} 21.1", lat + 0.05),
                d,
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<wfs:FeatureCollection xmlns:wfs="http://www.opengis.net/wfs/2.0"
    xmlns:gml="http://www.opengis.net/gml/3.2" xmlns:ms="http://www.gugik.gov.pl"
    timeStamp="2024-06-15T06:00:00Z" {attrs}>
<wfs:boundedBy><gml:Envelope srsName="urn:ogc:def:crs:EPSG::4326">
<gml:lowerCorner>52.1 21.0</gml:lowerCorner><gml:upperCorner>52.5 21.5</gml:upperCorner>
</gml:Envelope></wfs:boundedBy>
{members}
</wfs:FeatureCollection>"#,
        attrs = attrs,
        members = members
    )
}

/// Response with no members
#[allow(dead_code)]
pub fn empty_collection_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<wfs:FeatureCollection xmlns:wfs="http://www.opengis.net/wfs/2.0"
    xmlns:gml="http://www.opengis.net/gml/3.2" numberMatched="0" numberReturned="0">
</wfs:FeatureCollection>"#
        .to_string()
}
