//! HTTP fetcher implementation
//!
//! This module handles all page requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests bounded by a per-request timeout
//! - Redirect handling (at most 10 hops)
//! - Error classification into [`FetchError`]

use crate::crawler::parser::{parse_page, PageData, PageMetrics};
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client};
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

/// Maximum number of redirects followed for one request
pub const MAX_REDIRECTS: usize = 10;

/// Why a single page could not be fetched
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("network error: {0}")]
    Network(String),

    #[error("not an HTML page (content-type: {content_type})")]
    ContentMismatch { content_type: String },
}

impl FetchError {
    /// Timeouts are the only fetch failures worth retrying
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_connect() {
            FetchError::Network(format!("connection failed: {}", e))
        } else if e.is_redirect() {
            FetchError::Network(format!("redirect error: {}", e))
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// Retrieves and parses a single page
///
/// The scheduler and the seed-page step of discovery only depend on this
/// trait, so tests can substitute a scripted implementation.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<PageData, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The full User-Agent header value
///
/// # Example
///
/// ```no_run
/// use site_survey::crawler::build_http_client;
///
/// let client = build_http_client("SiteSurveyBot/1.0 (+https://example.com/about; admin@example.com)").unwrap();
/// ```
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`Fetcher`] backed by a plain `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Returns true for content types that can be parsed as a page
fn is_html(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("text/html") || content_type.contains("application/xhtml")
}

#[async_trait]
impl Fetcher for HttpFetcher {
    /// Fetches a URL and parses it into [`PageData`]
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | Timeout (whole request, body included) | `FetchError::Timeout` |
    /// | HTTP >= 400 | `FetchError::Http` |
    /// | Content-Type present and not HTML | `FetchError::ContentMismatch` |
    /// | Connection / TLS / redirect failure | `FetchError::Network` |
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<PageData, FetchError> {
        let started = Instant::now();

        let response = self.client.get(url.clone()).timeout(timeout).send().await?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !content_type.is_empty() && !is_html(&content_type) {
            return Err(FetchError::ContentMismatch { content_type });
        }

        let final_url = response.url().clone();
        let body = response.text().await?;

        let metrics = PageMetrics {
            load_time_ms: started.elapsed().as_millis() as u64,
            html_bytes: body.len(),
            status: status.as_u16(),
        };

        tracing::debug!(
            "Fetched {} ({} bytes, {} ms)",
            final_url,
            metrics.html_bytes,
            metrics.load_time_ms
        );

        Ok(parse_page(&body, &final_url, metrics))
    }
}
