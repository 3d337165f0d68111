//! Crawler module for page fetching and job execution
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind the [`Fetcher`] trait
//! - HTML parsing into [`PageData`]
//! - The bounded worker pool with pacing and retry
//! - Overall job coordination

mod coordinator;
mod fetcher;
mod parser;
mod scheduler;

pub use coordinator::{run_job, Coordinator, DiscoverySummary, JobOutput};
pub use fetcher::{build_http_client, FetchError, Fetcher, HttpFetcher, MAX_REDIRECTS};
pub use parser::{parse_page, resolve_link, Heading, PageData, PageImage, PageLink, PageMetrics};
pub use scheduler::{CrawlOutcome, PageCrawlResult, PageError, PageErrorKind, Scheduler};
