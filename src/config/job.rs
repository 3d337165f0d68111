//! The immutable per-job crawl configuration

use crate::config::types::Config;
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// How the robots.txt crawl-delay is applied across the worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PacingMode {
    /// Each worker sleeps for the crawl-delay before each task it runs.
    /// With N workers the aggregate rate is up to N requests per delay window.
    #[default]
    PerWorker,

    /// All workers pass through one shared gate, so consecutive fetch starts
    /// against the host are at least one crawl-delay apart.
    Shared,
}

/// Everything a single survey job needs to run
///
/// Built once by the caller (usually via [`Config::job_config`]) and only
/// read afterwards.
#[derive(Debug, Clone)]
pub struct CrawlJobConfig {
    pub seed_url: Url,
    pub max_depth: u32,
    pub max_pages: usize,
    pub concurrency: usize,
    pub per_page_timeout: Duration,
    pub discovery_timeout: Duration,
    pub use_sitemap: bool,
    pub respect_robots: bool,
    pub pacing: PacingMode,
    /// Caller-supplied URL list; `None` means discover candidates
    pub manual_urls: Option<Vec<String>>,
    /// robots.txt product token (e.g. `SiteSurveyBot`)
    pub user_agent_token: String,
    /// Full User-Agent header value
    pub user_agent: String,
}

impl CrawlJobConfig {
    /// Creates a job configuration with default limits for the given seed
    pub fn for_seed(seed_url: Url) -> Self {
        Self {
            seed_url,
            max_depth: 2,
            max_pages: 50,
            concurrency: 3,
            per_page_timeout: Duration::from_secs(90),
            discovery_timeout: Duration::from_secs(15),
            use_sitemap: true,
            respect_robots: true,
            pacing: PacingMode::PerWorker,
            manual_urls: None,
            user_agent_token: "SiteSurveyBot".to_string(),
            user_agent: "SiteSurveyBot/1.0".to_string(),
        }
    }

    /// Returns true if the caller supplied an explicit URL list
    pub fn has_manual_urls(&self) -> bool {
        self.manual_urls
            .as_ref()
            .map(|urls| !urls.is_empty())
            .unwrap_or(false)
    }
}

impl Config {
    /// Builds the immutable job configuration from a validated config file
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlJobConfig)` - The job configuration
    /// * `Err(ConfigError)` - The seed URL could not be parsed
    pub fn job_config(&self) -> Result<CrawlJobConfig, ConfigError> {
        let seed_url = Url::parse(&self.job.seed_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed-url: {}", e)))?;

        let manual_urls = if self.job.urls.is_empty() {
            None
        } else {
            Some(self.job.urls.clone())
        };

        Ok(CrawlJobConfig {
            seed_url,
            max_depth: self.crawler.max_depth,
            max_pages: self.crawler.max_pages as usize,
            concurrency: self.crawler.concurrency as usize,
            per_page_timeout: Duration::from_millis(self.crawler.per_page_timeout_ms),
            discovery_timeout: Duration::from_millis(self.crawler.discovery_timeout_ms),
            use_sitemap: self.crawler.use_sitemap,
            respect_robots: self.crawler.respect_robots,
            pacing: self.crawler.pacing,
            manual_urls,
            user_agent_token: self.user_agent.crawler_name.clone(),
            user_agent: self.user_agent.header_value(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::{CrawlerConfig, JobSection, OutputConfig, UserAgentConfig};

    fn create_test_config(urls: Vec<String>) -> Config {
        Config {
            crawler: CrawlerConfig {
                concurrency: 4,
                pacing: PacingMode::Shared,
                ..CrawlerConfig::default()
            },
            user_agent: UserAgentConfig {
                crawler_name: "TestBot".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "admin@example.com".to_string(),
            },
            output: OutputConfig::default(),
            job: JobSection {
                seed_url: "https://example.com/".to_string(),
                urls,
            },
        }
    }

    #[test]
    fn test_job_config_from_config() {
        let job = create_test_config(vec![]).job_config().unwrap();

        assert_eq!(job.seed_url.as_str(), "https://example.com/");
        assert_eq!(job.concurrency, 4);
        assert_eq!(job.pacing, PacingMode::Shared);
        assert_eq!(job.per_page_timeout, Duration::from_secs(90));
        assert_eq!(job.user_agent_token, "TestBot");
        assert_eq!(
            job.user_agent,
            "TestBot/1.0 (+https://example.com/about; admin@example.com)"
        );
        assert!(job.manual_urls.is_none());
        assert!(!job.has_manual_urls());
    }

    #[test]
    fn test_job_config_with_manual_urls() {
        let job = create_test_config(vec!["https://example.com/a".to_string()])
            .job_config()
            .unwrap();

        assert!(job.has_manual_urls());
        assert_eq!(job.manual_urls.unwrap().len(), 1);
    }

    #[test]
    fn test_pacing_mode_deserializes_kebab_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            pacing: PacingMode,
        }

        let parsed: Wrapper = toml::from_str("pacing = \"per-worker\"").unwrap();
        assert_eq!(parsed.pacing, PacingMode::PerWorker);

        let parsed: Wrapper = toml::from_str("pacing = \"shared\"").unwrap();
        assert_eq!(parsed.pacing, PacingMode::Shared);
    }
}
