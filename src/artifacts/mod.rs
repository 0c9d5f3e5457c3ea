//! Files attached to a notification
//!
//! - `geojson`: sheet rectangles as a GeoJSON `FeatureCollection`
//! - `plot`: optional PNG map of the same rectangles

pub mod geojson;
pub mod plot;

pub use geojson::{to_geometry_collection, FeatureCollection, GEOJSON_MIME};
pub use plot::{PlotRenderer, RasterPlotRenderer, ATTRIBUTION, PNG_MIME};

use bytes::Bytes;

/// One file sent alongside a message
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    /// Multipart form field name
    pub field_name: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Bytes,
}

impl Attachment {
    pub fn new(
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        mime: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: file_name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    /// GeoJSON attachment named after the reported date range
    pub fn geojson(old: &str, new: &str, bytes: Vec<u8>) -> Self {
        Self::new(
            "file",
            format!("zasiegi_{}_{}.geojson", old, new),
            GEOJSON_MIME,
            bytes,
        )
    }

    /// PNG attachment named after the reported date range
    pub fn png(old: &str, new: &str, bytes: Vec<u8>) -> Self {
        Self::new("image", format!("zasiegi_{}_{}.png", old, new), PNG_MIME, bytes)
    }
}
