//! Field extraction from GetFeature responses
//!
//! Every function here is pure over a parsed [`Document`]. Optional sheet
//! attributes that are missing come back as `None`; only the structure the
//! pipeline cannot work without (the collection root, `boundedBy`, envelope
//! corners, register dates once sheets were matched) raises
//! `OrthowatchError::Format`.

use crate::error::{OrthowatchError, Result};
use crate::wfs::document::{Document, Element};
use crate::wfs::types::{Envelope, Record, ResponseSummary};
use chrono::NaiveDate;

/// WFS 2.0 namespace
pub const WFS_NS: &str = "http://www.opengis.net/wfs/2.0";
/// GML 3.2 namespace
pub const GML_NS: &str = "http://www.opengis.net/gml/3.2";
/// GUGiK application schema namespace
pub const GUGIK_NS: &str = "http://www.gugik.gov.pl";

fn format_error(message: impl Into<String>) -> anyhow::Error {
    OrthowatchError::Format(message.into()).into()
}

/// Number of features matched by the query
///
/// Reads `numberMatched`; when the server reports `unknown` the value of
/// `numberReturned` is used instead. Returns `None` when neither is present.
///
/// # Errors
///
/// Returns `OrthowatchError::Format` when the root is not a
/// `wfs:FeatureCollection` or the count is not a non-negative integer
pub fn matched_count(doc: &Document) -> Result<Option<u64>> {
    if !doc.root.name.is(WFS_NS, "FeatureCollection") {
        return Err(format_error(format!(
            "Expected tag 'wfs:FeatureCollection' got: {}",
            doc.root.name
        )));
    }

    let raw = match doc.root.attr("numberMatched") {
        Some("unknown") => doc.root.attr("numberReturned"),
        other => other,
    };

    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|_| format_error(format!("Invalid feature count: {:?}", value))),
    }
}

/// Latest `dt_pzgik` among the returned sheets
///
/// Timestamps are compared as text, which orders ISO-8601 values
/// chronologically; the date part of the winner is returned.
///
/// # Errors
///
/// Returns `OrthowatchError::Format` when there are no register dates, a
/// register date has no `gml:timePosition`, or the maximum is not a date
pub fn max_registered_date(doc: &Document) -> Result<NaiveDate> {
    let mut latest: Option<&str> = None;
    for element in doc.root.find_all(GUGIK_NS, "dt_pzgik") {
        let text = element
            .child(GML_NS, "timePosition")
            .and_then(Element::text)
            .ok_or_else(|| format_error("dt_pzgik without gml:timePosition"))?;
        if latest.map_or(true, |current| text > current) {
            latest = Some(text);
        }
    }

    let latest = latest.ok_or_else(|| format_error("Response contains no dt_pzgik values"))?;
    parse_date_prefix(latest)
}

fn parse_date_prefix(text: &str) -> Result<NaiveDate> {
    text.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        .ok_or_else(|| format_error(format!("Invalid register date: {:?}", text)))
}

/// Envelope and chosen attributes of every `wfs:member`
///
/// # Errors
///
/// Returns `OrthowatchError::Format` when a member lacks a usable envelope
pub fn extract_records(doc: &Document) -> Result<Vec<Record>> {
    doc.root
        .find_all(WFS_NS, "member")
        .into_iter()
        .map(|member| {
            Ok(Record {
                envelope: envelope_of(member)?,
                published: time_position(member, "akt_data"),
                registered: time_position(member, "dt_pzgik"),
                download_url: member
                    .find(GUGIK_NS, "url_do_pobrania")
                    .and_then(Element::text)
                    .map(str::to_string),
            })
        })
        .collect()
}

fn time_position(member: &Element, property: &str) -> Option<String> {
    member
        .find(GUGIK_NS, property)
        .and_then(|e| e.child(GML_NS, "timePosition"))
        .and_then(Element::text)
        .map(str::to_string)
}

/// Overall extent from the collection's `wfs:boundedBy`
///
/// # Errors
///
/// Returns `OrthowatchError::Format` when `wfs:boundedBy` or its envelope
/// is missing or malformed
pub fn bounding_box_of(doc: &Document) -> Result<Envelope> {
    let bounded_by = doc
        .root
        .find(WFS_NS, "boundedBy")
        .ok_or_else(|| format_error("Response has no wfs:boundedBy"))?;
    envelope_of(bounded_by)
}

/// First `gml:Envelope` below `element`, converted to lon/lat order
///
/// EPSG:4326 as served by the service is latitude-first, so a corner
/// `"52.1 21.0"` is latitude 52.1, longitude 21.0.
pub fn envelope_of(element: &Element) -> Result<Envelope> {
    let envelope = element
        .find(GML_NS, "Envelope")
        .ok_or_else(|| format_error(format!("<{}> has no gml:Envelope", element.name)))?;
    let (ymin, xmin) = corner(envelope, "lowerCorner")?;
    let (ymax, xmax) = corner(envelope, "upperCorner")?;
    Ok(Envelope::new(xmin, ymin, xmax, ymax))
}

fn corner(envelope: &Element, name: &str) -> Result<(f64, f64)> {
    let text = envelope
        .child(GML_NS, name)
        .and_then(Element::text)
        .ok_or_else(|| format_error(format!("gml:Envelope has no {}", name)))?;
    parse_corner(text)
}

/// Parse a `"lat lon"` corner into `(lat, lon)`
pub fn parse_corner(text: &str) -> Result<(f64, f64)> {
    let mut parts = text.split_whitespace();
    let (first, second) = match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), None) => (a, b),
        _ => return Err(format_error(format!("Invalid corner: {:?}", text))),
    };
    let parse = |v: &str| {
        v.parse::<f64>()
            .map_err(|_| format_error(format!("Invalid coordinate {:?} in corner {:?}", v, text)))
    };
    Ok((parse(first)?, parse(second)?))
}

/// Interpret a whole response
///
/// Returns `None` when the service matched nothing, without looking at any
/// other part of the document.
pub fn summarize(doc: &Document) -> Result<Option<ResponseSummary>> {
    let matched = match matched_count(doc)? {
        None | Some(0) => return Ok(None),
        Some(n) => n,
    };

    Ok(Some(ResponseSummary {
        matched,
        max_registered: max_registered_date(doc)?,
        bbox: bounding_box_of(doc)?,
        records: extract_records(doc)?,
    }))
}
