//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - The fetch strategy interface shared by plain and rendered fetches
//! - Building HTTP clients with proper user agent strings
//! - Retry with exponential backoff for transient transport failures
//! - Content classification (HTML / PDF / other)

use async_trait::async_trait;
use rand::Rng;
use reqwest::{redirect::Policy, Client};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Maximum redirect hops followed for one request
pub const MAX_REDIRECTS: usize = 10;

/// Transport-level failure: no HTTP response was obtained
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("timeout: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    /// Unusable request or redirect loop; retrying cannot help
    #[error("request failed: {0}")]
    Request(String),

    /// Connection dropped or reset mid-exchange
    #[error("network error: {0}")]
    Network(String),

    #[error("body read failed: {0}")]
    Body(String),

    #[error("render failed: {0}")]
    Render(String),
}

impl TransportError {
    /// Network-level failures worth another attempt
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Connect(_) | Self::Network(_) | Self::Body(_)
        )
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else if e.is_builder() || e.is_redirect() || e.is_status() {
            Self::Request(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// How a response body is processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Pdf,
    Other,
}

/// Classifies content from its Content-Type header and URL
///
/// HTML only when the header says `text/html`; PDF when either the header or
/// the URL path says so; everything else is recorded without extraction.
pub fn classify_content(content_type: &str, url: &Url) -> ContentKind {
    let content_type = content_type.to_ascii_lowercase();

    if content_type.contains("text/html") {
        ContentKind::Html
    } else if content_type.contains("application/pdf")
        || url.path().to_ascii_lowercase().ends_with(".pdf")
    {
        ContentKind::Pdf
    } else {
        ContentKind::Other
    }
}

/// A completed HTTP exchange, whatever its status
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    /// URL after following redirects
    pub final_url: Url,
    pub body: Vec<u8>,
    /// Lowercased header names; repeated headers joined with ", "
    pub headers: BTreeMap<String, String>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }

    pub fn kind(&self) -> ContentKind {
        classify_content(self.content_type().unwrap_or_default(), &self.final_url)
    }
}

/// Strategy that turns a URL into a response
///
/// User agent and timeout are fixed when the strategy is built.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, TransportError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Builds an HTTP client with the crawl's user agent and timeout
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use sumi_harvest::crawler::build_http_client;
///
/// let client = build_http_client(
///     "SumiHarvest/1.0 (+https://example.com/bot; bot@example.com)",
///     Duration::from_secs(20),
/// )
/// .unwrap();
/// ```
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Plain HTTP(S) fetch through reqwest
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FetchStrategy for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchResponse, TransportError> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();

        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in response.headers() {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            headers
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(&value);
                })
                .or_insert(value);
        }

        let body = response.bytes().await?.to_vec();

        Ok(FetchResponse {
            status,
            final_url,
            body,
            headers,
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Retry schedule for transient transport failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): exponential with ±20% jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64() * 2f64.powi(attempt.saturating_sub(1) as i32);
        let jitter: f64 = rand::rng().random_range(-0.2..=0.2);
        Duration::from_secs_f64((base * (1.0 + jitter)).max(0.0))
    }
}

/// Fetches with retries on transient transport errors
///
/// HTTP statuses are final results and never retried.
pub async fn fetch_with_retry(
    strategy: &dyn FetchStrategy,
    url: &Url,
    policy: &RetryPolicy,
) -> Result<FetchResponse, TransportError> {
    let mut attempt = 1;

    loop {
        match strategy.fetch(url).await {
            Ok(response) => return Ok(response),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                debug!(
                    "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                    attempt, policy.max_attempts, url, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!("Fetch of {} via {} failed: {}", url, strategy.name(), e);
                return Err(e);
            }
        }
    }
}
