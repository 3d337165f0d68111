use crate::config::job::PacingMode;
use serde::Deserialize;

/// Main configuration structure for Site-Survey
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub job: JobSection,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum link depth explored from the seed page
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum number of pages crawled in one job
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Number of concurrent crawl workers
    pub concurrency: u32,

    /// Timeout for a single page fetch (milliseconds)
    #[serde(rename = "per-page-timeout-ms")]
    pub per_page_timeout_ms: u64,

    /// Timeout for the seed-page fetch during discovery (milliseconds)
    #[serde(rename = "discovery-timeout-ms")]
    pub discovery_timeout_ms: u64,

    /// Whether sitemaps are used for URL discovery
    #[serde(rename = "use-sitemap")]
    pub use_sitemap: bool,

    /// Whether robots.txt rules are enforced
    #[serde(rename = "respect-robots")]
    pub respect_robots: bool,

    /// How the crawl-delay is applied across workers
    pub pacing: PacingMode,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_pages: 50,
            concurrency: 3,
            per_page_timeout_ms: 90_000,
            discovery_timeout_ms: 15_000,
            use_sitemap: true,
            respect_robots: true,
            pacing: PacingMode::PerWorker,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also used as the robots.txt product token
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the full User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path to the JSON job output file
    #[serde(rename = "report-path")]
    pub report_path: String,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            report_path: "./survey-report.json".to_string(),
            summary_path: "./survey-summary.md".to_string(),
        }
    }
}

/// The site being surveyed
#[derive(Debug, Clone, Deserialize)]
pub struct JobSection {
    /// Seed URL the survey starts from
    #[serde(rename = "seed-url")]
    pub seed_url: String,

    /// Optional manual URL list; when present discovery is skipped
    #[serde(default)]
    pub urls: Vec<String>,
}
