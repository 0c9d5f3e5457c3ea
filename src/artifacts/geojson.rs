//! GeoJSON export of matched sheets
//!
//! Each sheet becomes a rectangular polygon built from its envelope; the
//! attributes shown to users travel along as feature properties.

use crate::error::Result;
use crate::wfs::types::{Envelope, Record, ResponseSummary};
use serde::{Deserialize, Serialize};

/// MIME type of the exported file
pub const GEOJSON_MIME: &str = "application/geo+json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionType {
    FeatureCollection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureType {
    Feature,
}

/// GeoJSON geometry; only polygons are produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
}

impl Geometry {
    /// Closed ring (xmin,ymin) → (xmin,ymax) → (xmax,ymax) → (xmax,ymin) → (xmin,ymin)
    pub fn rectangle(e: &Envelope) -> Self {
        Geometry::Polygon {
            coordinates: vec![vec![
                [e.xmin, e.ymin],
                [e.xmin, e.ymax],
                [e.xmax, e.ymax],
                [e.xmax, e.ymin],
                [e.xmin, e.ymin],
            ]],
        }
    }

    /// Every vertex of every ring
    pub fn vertices(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        match self {
            Geometry::Polygon { coordinates } => {
                coordinates.iter().flatten().map(|[x, y]| (*x, *y))
            }
        }
    }

    /// Bounding box of the vertices
    pub fn envelope(&self) -> Option<Envelope> {
        Envelope::from_points(self.vertices())
    }
}

/// Attributes attached to each sheet polygon
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetProperties {
    pub akt_data: Option<String>,
    pub dt_pzgik: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: FeatureType,
    pub geometry: Geometry,
    pub properties: SheetProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: CollectionType,
    pub features: Vec<Feature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
}

impl FeatureCollection {
    /// Union of the declared `bbox` and every feature vertex
    pub fn extent(&self) -> Option<Envelope> {
        let declared = self
            .bbox
            .into_iter()
            .flat_map(|[xmin, ymin, xmax, ymax]| [(xmin, ymin), (xmax, ymax)]);
        let vertices = self.features.iter().flat_map(|f| f.geometry.vertices());
        Envelope::from_points(declared.chain(vertices))
    }

    /// Pretty-printed GeoJSON
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

fn feature(record: &Record) -> Feature {
    Feature {
        kind: FeatureType::Feature,
        geometry: Geometry::rectangle(&record.envelope),
        properties: SheetProperties {
            akt_data: record.published.clone(),
            dt_pzgik: record.registered.clone(),
            url: record.download_url.clone(),
        },
    }
}

/// One polygon feature per record, wrapped with the response bbox
pub fn to_geometry_collection(summary: &ResponseSummary) -> FeatureCollection {
    tracing::debug!(features = summary.records.len(), "Converting response to GeoJSON");
    FeatureCollection {
        kind: CollectionType::FeatureCollection,
        features: summary.records.iter().map(feature).collect(),
        bbox: Some(summary.bbox.to_array()),
    }
}
