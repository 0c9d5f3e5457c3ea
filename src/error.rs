//! Error types for Orthowatch
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Orthowatch operations
///
/// Every variant is fatal to the layer cycle that raised it. The only
/// recoverable failure in the pipeline (plot rendering) is handled in
/// [`crate::sync`] before it ever becomes one of these.
#[derive(Error, Debug)]
pub enum OrthowatchError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Watermark read/write faults
    #[error("Storage error: {0}")]
    Storage(String),

    /// Transport failure or non-2xx status after retries were exhausted
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Response body is not well-formed XML
    #[error("Parse error: {0}")]
    Parse(String),

    /// A structurally required element or attribute is missing or malformed
    #[error("Format error: {0}")]
    Format(String),

    /// Webhook delivery failed
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Inputs rejected before any request is made
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Orthowatch operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
