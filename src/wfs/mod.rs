//! Orthophoto index WFS access
//!
//! - `query`: GetFeature parameters and OGC filters
//! - `client`: HTTP fetching with retries
//! - `document`: XML element tree
//! - `interpret`: field extraction from responses
//! - `types`: layers, envelopes and records

pub mod client;
pub mod document;
pub mod interpret;
pub mod query;
pub mod types;

pub use client::{RetryPolicy, WfsClient};
pub use document::{Document, Element};
pub use query::{Predicate, QuerySpec};
pub use types::{Envelope, Layer, Record, ResponseSummary};
