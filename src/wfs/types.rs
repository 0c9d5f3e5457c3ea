use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One yearly partition of the orthophoto index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Layer {
    name: String,
    year: i32,
}

impl Layer {
    /// Create a layer from an explicit name
    pub fn new(name: impl Into<String>, year: i32) -> Self {
        Self {
            name: name.into(),
            year,
        }
    }

    /// Create a layer by substituting `year` into a `{year}` template
    pub fn from_template(template: &str, year: i32) -> Self {
        Self::new(template.replace("{year}", &year.to_string()), year)
    }

    /// WFS type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dataset year
    pub fn year(&self) -> i32 {
        self.year
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Axis-aligned bounding box in EPSG:4326, longitude first
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Envelope {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Smallest envelope containing every point
    ///
    /// Returns `None` for an empty iterator.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        points.into_iter().fold(None, |acc, (x, y)| match acc {
            None => Some(Self::new(x, y, x, y)),
            Some(e) => Some(Self::new(
                e.xmin.min(x),
                e.ymin.min(y),
                e.xmax.max(x),
                e.ymax.max(y),
            )),
        })
    }

    /// `[xmin, ymin, xmax, ymax]`, the GeoJSON `bbox` member layout
    pub fn to_array(&self) -> [f64; 4] {
        [self.xmin, self.ymin, self.xmax, self.ymax]
    }
}

/// One matched orthophoto sheet
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub envelope: Envelope,
    /// `dt_pzgik`: when the sheet entered the national register
    pub registered: Option<String>,
    /// `akt_data`: acquisition/publication date of the imagery
    pub published: Option<String>,
    /// `url_do_pobrania`
    pub download_url: Option<String>,
}

/// Everything the pipeline needs from one GetFeature response
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSummary {
    pub matched: u64,
    pub max_registered: NaiveDate,
    pub bbox: Envelope,
    pub records: Vec<Record>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_from_template() {
        let layer = Layer::from_template("tiles-{year}", 2024);
        assert_eq!(layer.name(), "tiles-2024");
        assert_eq!(layer.year(), 2024);
        assert_eq!(layer.to_string(), "tiles-2024");
    }

    #[test]
    fn test_envelope_from_points() {
        let env = Envelope::from_points([(21.0, 52.5), (21.5, 52.1), (21.2, 52.3)]).unwrap();
        assert_eq!(env, Envelope::new(21.0, 52.1, 21.5, 52.5));
    }

    #[test]
    fn test_envelope_from_no_points() {
        assert!(Envelope::from_points(Vec::<(f64, f64)>::new()).is_none());
    }

    #[test]
    fn test_envelope_to_array() {
        let env = Envelope::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(env.to_array(), [1.0, 2.0, 3.0, 4.0]);
    }
}
