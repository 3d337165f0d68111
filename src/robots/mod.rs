//! Robots.txt handling module
//!
//! This module fetches and parses a site's robots.txt into a [`RobotsPolicy`].
//! An unavailable or unreadable robots.txt never blocks a crawl: it degrades
//! to the permissive default policy.

mod parser;

pub use parser::{RobotsPolicy, RobotsSummary, DEFAULT_CRAWL_DELAY};

use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Timeout for the robots.txt request
pub const ROBOTS_TIMEOUT: Duration = Duration::from_secs(10);

/// Why robots.txt could not be used
#[derive(Debug, Error)]
pub enum RobotsError {
    #[error("robots.txt not found (HTTP {0})")]
    Status(u16),

    #[error("robots.txt request timed out")]
    Timeout,

    #[error("robots.txt request failed: {0}")]
    Network(String),
}

/// Fetches the raw robots.txt for the origin of `base_url`
///
/// # Returns
///
/// * `Ok(String)` - The file content (HTTP 200 only)
/// * `Err(RobotsError)` - Any other status or a network failure
pub async fn fetch_robots(client: &Client, base_url: &Url) -> Result<String, RobotsError> {
    let robots_url = base_url
        .join("/robots.txt")
        .map_err(|e| RobotsError::Network(e.to_string()))?;

    let response = client
        .get(robots_url)
        .timeout(ROBOTS_TIMEOUT)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                RobotsError::Timeout
            } else {
                RobotsError::Network(e.to_string())
            }
        })?;

    if response.status() != StatusCode::OK {
        return Err(RobotsError::Status(response.status().as_u16()));
    }

    response
        .text()
        .await
        .map_err(|e| RobotsError::Network(e.to_string()))
}

/// Resolves the crawl policy for a site
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `base_url` - Any URL on the site; only its origin is used
/// * `user_agent` - The crawler's robots.txt product token
///
/// # Returns
///
/// The parsed policy, or [`RobotsPolicy::allow_all`] when robots.txt is
/// missing or unreachable.
pub async fn resolve_policy(client: &Client, base_url: &Url, user_agent: &str) -> RobotsPolicy {
    match fetch_robots(client, base_url).await {
        Ok(content) => {
            let policy = RobotsPolicy::from_content(&content, user_agent);
            tracing::info!(
                "robots.txt found for {}: crawl-delay {:?}, {} sitemap(s)",
                base_url,
                policy.crawl_delay(),
                policy.sitemap_urls().len()
            );
            policy
        }
        Err(e) => {
            tracing::warn!("Using permissive robots policy for {}: {}", base_url, e);
            RobotsPolicy::allow_all(user_agent)
        }
    }
}
