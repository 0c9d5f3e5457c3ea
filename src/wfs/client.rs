//! HTTP client for the orthophoto index WFS
//!
//! This module provides GetFeature fetching with:
//! - Retries on 429/5xx gateway statuses and connection failures
//! - Exponential backoff between attempts
//! - A per-attempt timeout
//! - Parsing of the body into a [`Document`]

use crate::config::WfsConfig;
use crate::error::{OrthowatchError, Result};
use crate::wfs::document::Document;
use crate::wfs::query::QuerySpec;
use bytes::Bytes;
use std::time::Duration;

/// Statuses worth retrying; everything else non-2xx is final
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Retry schedule for GetFeature requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    /// Delay before the first retry
    pub backoff_base: Duration,
    /// Cap on any single delay
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Build the policy from WFS configuration
    pub fn from_config(config: &WfsConfig) -> Self {
        Self {
            retries: config.retries,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before retry number `retry` (1-based)
    ///
    /// `backoff_base * 2^(retry - 1)`, capped at `max_backoff`.
    ///
    /// # Examples
    ///
    /// ```
    /// use orthowatch::wfs::client::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy {
    ///     retries: 3,
    ///     backoff_base: Duration::from_secs(1),
    ///     max_backoff: Duration::from_secs(60),
    /// };
    /// assert_eq!(policy.delay_for(1), Duration::from_secs(1));
    /// assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    /// ```
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Whether a response status should be retried
    pub fn is_retryable_status(status: u16) -> bool {
        RETRYABLE_STATUSES.contains(&status)
    }
}

enum Attempt {
    Done(Bytes),
    Retry(String),
    Fatal(String),
}

/// GetFeature client
///
/// Holds one `reqwest::Client` configured with the per-attempt timeout.
#[derive(Clone)]
pub struct WfsClient {
    client: reqwest::Client,
    base_url: String,
    policy: RetryPolicy,
    timeout: Duration,
}

impl WfsClient {
    /// Create a client from WFS configuration
    ///
    /// # Errors
    ///
    /// Returns error if the underlying HTTP client cannot be built
    pub fn new(config: &WfsConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_seconds);
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            policy: RetryPolicy::from_config(config),
            timeout,
        })
    }

    /// Endpoint queries are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run a query and parse the response
    ///
    /// # Errors
    ///
    /// Returns `OrthowatchError::Fetch` when the final attempt fails or
    /// returns a non-2xx status, and `OrthowatchError::Parse` when the body
    /// is not XML. Parse failures are never retried.
    pub async fn fetch(&self, spec: &QuerySpec) -> Result<Document> {
        let body = self.fetch_bytes(spec).await?;
        tracing::debug!(bytes = body.len(), "Received GetFeature response");
        Document::parse(&body)
    }

    async fn fetch_bytes(&self, spec: &QuerySpec) -> Result<Bytes> {
        let params = spec.to_params();
        tracing::info!(layer = %spec.layer, url = %self.base_url, "Making GetFeature request");
        tracing::debug!(filter = %spec.filter_xml(), "GetFeature filter");

        let mut retry = 0u32;
        loop {
            match self.attempt(&params).await {
                Attempt::Done(bytes) => return Ok(bytes),
                Attempt::Retry(reason) if retry < self.policy.retries => {
                    retry += 1;
                    let delay = self.policy.delay_for(retry);
                    tracing::warn!(
                        retry,
                        max_retries = self.policy.retries,
                        delay_ms = delay.as_millis() as u64,
                        "GetFeature attempt failed: {}",
                        reason
                    );
                    tokio::time::sleep(delay).await;
                }
                Attempt::Retry(reason) => {
                    return Err(OrthowatchError::Fetch(format!(
                        "{} (gave up after {} retries)",
                        reason, self.policy.retries
                    ))
                    .into());
                }
                Attempt::Fatal(reason) => return Err(OrthowatchError::Fetch(reason).into()),
            }
        }
    }

    async fn attempt(&self, params: &[(&'static str, String)]) -> Attempt {
        let response = match self.client.get(&self.base_url).query(params).send().await {
            Ok(response) => response,
            Err(e) if is_transient(&e) => {
                return Attempt::Retry(format!("request to {} failed: {}", self.base_url, e))
            }
            Err(e) => return Attempt::Fatal(format!("request to {} failed: {}", self.base_url, e)),
        };

        let status = response.status();
        if !status.is_success() {
            let reason = format!("HTTP {} for {}", status.as_u16(), self.base_url);
            return if RetryPolicy::is_retryable_status(status.as_u16()) {
                Attempt::Retry(reason)
            } else {
                Attempt::Fatal(reason)
            };
        }

        match response.bytes().await {
            Ok(bytes) => Attempt::Done(bytes),
            Err(e) if is_transient(&e) => {
                Attempt::Retry(format!("reading response body failed: {}", e))
            }
            Err(e) => Attempt::Fatal(format!("Failed to read response body: {}", e)),
        }
    }
}

/// Connection drops, resets and timeouts are worth another attempt; a
/// malformed request, a redirect loop or an undecodable body is not.
fn is_transient(e: &reqwest::Error) -> bool {
    !(e.is_builder() || e.is_redirect() || e.is_decode())
}

impl std::fmt::Debug for WfsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WfsClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("policy", &self.policy)
            .finish()
    }
}
