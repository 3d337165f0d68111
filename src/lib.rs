//! Site-Survey: a polite multi-page site auditor
//!
//! This crate crawls a website's pages, runs per-page content analyses, and
//! rolls the results into a site-level report with prioritized
//! recommendations. It respects robots.txt, paces requests by crawl-delay,
//! and tolerates partial failure.

pub mod analysis;
pub mod config;
pub mod crawler;
pub mod discovery;
pub mod output;
pub mod robots;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for job-level Site-Survey failures
///
/// Per-page problems never surface here; they are recorded on the
/// individual [`crawler::PageCrawlResult`] instead.
#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("No crawlable URLs were discovered for {url}")]
    NoCandidates { url: String },

    #[error(
        "None of the {attempted} crawled pages could be analyzed; check whether {url} restricts access"
    )]
    NoSuccessfulPages { url: String, attempted: usize },

    #[error("Job was cancelled before any page was analyzed")]
    Cancelled,

    #[error("Invalid job stage transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::JobStage,
        to: state::JobStage,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Site-Survey operations
pub type Result<T> = std::result::Result<T, SurveyError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use analysis::{Analyzer, BasicAnalyzer, Category, CategoryResult, PageAnalysis};
pub use config::{Config, CrawlJobConfig};
pub use crawler::{Coordinator, Fetcher, HttpFetcher, JobOutput, PageCrawlResult};
pub use output::{aggregate, AggregateReport};
pub use robots::RobotsPolicy;
pub use state::{JobProgress, JobStage};
pub use self::url::{is_same_site, normalize_url};
