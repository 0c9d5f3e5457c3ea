//! GetFeature query construction
//!
//! A [`QuerySpec`] names a layer and a predicate over the register date
//! property. It knows how to render itself as the OGC Filter fragment and
//! the full query-string the service expects.

use crate::error::{OrthowatchError, Result};
use crate::wfs::Layer;
use chrono::NaiveDate;
use url::Url;

/// Property holding the date a sheet entered the register
pub const REGISTERED_PROPERTY: &str = "dt_pzgik";

/// GML 3.2.1 output encoding requested from the service
pub const OUTPUT_FORMAT: &str = "text/xml; subtype=gml/3.2.1";

/// Spatial reference requested from the service
pub const SRS_NAME: &str = "EPSG:4326";

/// Date predicate applied to [`REGISTERED_PROPERTY`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// `lower < date <= upper`
    Range { lower: NaiveDate, upper: NaiveDate },
    /// `date == value`
    Equal(NaiveDate),
}

/// A single GetFeature request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub layer: Layer,
    pub predicate: Predicate,
}

impl QuerySpec {
    /// Half-open range query `lower < dt_pzgik <= upper`
    ///
    /// # Errors
    ///
    /// Returns `OrthowatchError::Validation` when `lower` is after `upper`;
    /// such a filter would be sent verbatim and silently match nothing.
    pub fn range(layer: &Layer, lower: NaiveDate, upper: NaiveDate) -> Result<Self> {
        if lower > upper {
            return Err(OrthowatchError::Validation(format!(
                "lower bound {} is after upper bound {} for layer {}",
                lower, upper, layer
            ))
            .into());
        }
        Ok(Self {
            layer: layer.clone(),
            predicate: Predicate::Range { lower, upper },
        })
    }

    /// Single-day query `dt_pzgik == date`
    pub fn equal(layer: &Layer, date: NaiveDate) -> Self {
        Self {
            layer: layer.clone(),
            predicate: Predicate::Equal(date),
        }
    }

    /// OGC Filter XML for the predicate
    pub fn filter_xml(&self) -> String {
        match self.predicate {
            Predicate::Range { lower, upper } => format!(
                "<Filter>\n  <PropertyIsGreaterThan>\n    <PropertyName>{prop}</PropertyName>\n    \
                 <LowerBoundary><Literal>{lower}</Literal></LowerBoundary>\n    \
                 <UpperBoundary><Literal>{upper}</Literal></UpperBoundary>\n  \
                 </PropertyIsGreaterThan>\n</Filter>",
                prop = REGISTERED_PROPERTY,
                lower = lower.format("%Y-%m-%d"),
                upper = upper.format("%Y-%m-%d"),
            ),
            Predicate::Equal(date) => format!(
                "<Filter>\n  <PropertyIsEqualTo>\n    <PropertyName>{prop}</PropertyName>\n    \
                 <Literal>{date}</Literal>\n  </PropertyIsEqualTo>\n</Filter>",
                prop = REGISTERED_PROPERTY,
                date = date.format("%Y-%m-%d"),
            ),
        }
    }

    /// Query parameters in the order the service documents them
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("SERVICE", "WFS".to_string()),
            ("REQUEST", "GetFeature".to_string()),
            ("VERSION", "2.0.0".to_string()),
            ("outputFormat", OUTPUT_FORMAT.to_string()),
            ("SRSNAME", SRS_NAME.to_string()),
            ("TYPENAME", self.layer.name().to_string()),
            ("Filter", self.filter_xml()),
        ]
    }

    /// Full GET URL, reproducible by pasting it into a browser
    ///
    /// # Errors
    ///
    /// Returns `OrthowatchError::Config` when `base_url` is not a URL
    pub fn to_url(&self, base_url: &str) -> Result<Url> {
        let params = self.to_params();
        Url::parse_with_params(
            base_url,
            params.iter().map(|(k, v)| (*k, v.as_str())),
        )
        .map_err(|e| OrthowatchError::Config(format!("Invalid WFS base URL: {}", e)).into())
    }

    /// Lower bound of a range query, the date itself for an equality query
    pub fn lower(&self) -> NaiveDate {
        match self.predicate {
            Predicate::Range { lower, .. } => lower,
            Predicate::Equal(date) => date,
        }
    }

    /// Upper bound of a range query, the date itself for an equality query
    pub fn upper(&self) -> NaiveDate {
        match self.predicate {
            Predicate::Range { upper, .. } => upper,
            Predicate::Equal(date) => date,
        }
    }
}
