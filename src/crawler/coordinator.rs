//! Crawler coordinator - survey job orchestration
//!
//! This module drives one survey job through its stages:
//! - Resolving the robots.txt policy
//! - Discovering (or accepting) the candidate URLs
//! - Running the crawl over the worker pool
//! - Aggregating the successful results into a report

use crate::analysis::{Analyzer, BasicAnalyzer};
use crate::config::CrawlJobConfig;
use crate::crawler::fetcher::{build_http_client, Fetcher, HttpFetcher};
use crate::crawler::scheduler::{PageCrawlResult, Scheduler};
use crate::discovery::{manual_candidates, DiscoveryReport, DiscoverySources, PageCategory, UrlDiscoverer};
use crate::output::{aggregate, AggregateReport};
use crate::robots::{resolve_policy, RobotsPolicy, RobotsSummary};
use crate::state::{JobProgress, JobStage, JobState};
use crate::SurveyError;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

/// Discovery figures carried in the job output
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverySummary {
    pub candidates: usize,
    pub sources: DiscoverySources,
    pub categories: BTreeMap<PageCategory, usize>,
    pub disallowed: usize,
}

impl From<&DiscoveryReport> for DiscoverySummary {
    fn from(report: &DiscoveryReport) -> Self {
        Self {
            candidates: report.candidates.len(),
            sources: report.sources,
            categories: report.categories.clone(),
            disallowed: report.disallowed,
        }
    }
}

/// Everything a finished job hands to rendering and persistence
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutput {
    pub seed_url: String,
    pub config_hash: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub robots: RobotsSummary,
    pub discovery: DiscoverySummary,
    /// Every crawled page, in completion order
    pub results: Vec<PageCrawlResult>,
    pub skipped_count: usize,
    /// True when the job was cancelled and the report covers a partial crawl
    pub cancelled: bool,
    pub report: AggregateReport,
}

/// Main survey job coordinator
pub struct Coordinator {
    config: CrawlJobConfig,
    client: Client,
    fetcher: Arc<dyn Fetcher>,
    analyzer: Arc<dyn Analyzer>,
    state: JobState,
    cancel: CancellationToken,
    config_hash: Option<String>,
}

impl Coordinator {
    /// Creates a coordinator using the HTTP fetcher and the built-in analyzer
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(SurveyError)` - The HTTP client could not be built
    pub fn new(config: CrawlJobConfig) -> Result<Self, SurveyError> {
        let client = build_http_client(&config.user_agent)?;
        let fetcher = Arc::new(HttpFetcher::new(client.clone()));
        Ok(Self::with_parts(config, client, fetcher, Arc::new(BasicAnalyzer)))
    }

    /// Creates a coordinator from explicit collaborators
    ///
    /// `client` is used for robots.txt and sitemaps; pages go through `fetcher`.
    pub fn with_parts(
        config: CrawlJobConfig,
        client: Client,
        fetcher: Arc<dyn Fetcher>,
        analyzer: Arc<dyn Analyzer>,
    ) -> Self {
        Self {
            config,
            client,
            fetcher,
            analyzer,
            state: JobState::new(),
            cancel: CancellationToken::new(),
            config_hash: None,
        }
    }

    /// Records the configuration file hash in the job output
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn config(&self) -> &CrawlJobConfig {
        &self.config
    }

    /// Subscribes to progress snapshots of this job
    pub fn subscribe(&self) -> watch::Receiver<JobProgress> {
        self.state.subscribe()
    }

    /// Subscribes to one progress snapshot per finished or skipped page
    pub fn subscribe_tasks(&self) -> broadcast::Receiver<JobProgress> {
        self.state.subscribe_tasks()
    }

    pub fn progress(&self) -> JobProgress {
        self.state.snapshot()
    }

    /// A token that cancels this job when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolves the robots policy, or a permissive one when robots are ignored
    pub async fn resolve_robots(&self) -> RobotsPolicy {
        if self.config.respect_robots {
            resolve_policy(&self.client, &self.config.seed_url, &self.config.user_agent_token).await
        } else {
            tracing::info!("Ignoring robots.txt for {}", self.config.seed_url);
            RobotsPolicy::allow_all(&self.config.user_agent_token)
        }
    }

    /// Produces the ordered candidate list without crawling
    pub async fn discover(&self, policy: &RobotsPolicy) -> Result<DiscoveryReport, SurveyError> {
        match &self.config.manual_urls {
            Some(urls) if self.config.has_manual_urls() => {
                tracing::info!("Using {} manually supplied URLs", urls.len());
                manual_candidates(urls, &self.config)
            }
            _ => {
                UrlDiscoverer::new(&self.client, self.fetcher.as_ref())
                    .discover(&self.config.seed_url, policy, &self.config)
                    .await
            }
        }
    }

    /// Runs the whole job
    ///
    /// # Returns
    ///
    /// * `Ok(JobOutput)` - At least one page was analyzed
    /// * `Err(SurveyError)` - No candidates, no successful page, or cancelled
    ///   before anything was analyzed
    pub async fn run(&self) -> Result<JobOutput, SurveyError> {
        match self.run_stages().await {
            Ok(output) => Ok(output),
            Err(e) => {
                let terminal = if matches!(e, SurveyError::Cancelled) {
                    JobStage::Cancelled
                } else {
                    JobStage::Failed
                };
                if !self.state.stage().is_terminal() {
                    let _ = self.state.transition(terminal, e.to_string());
                }
                tracing::error!("Survey of {} ended: {}", self.config.seed_url, e);
                Err(e)
            }
        }
    }

    async fn run_stages(&self) -> Result<JobOutput, SurveyError> {
        let started_at = Utc::now();
        let seed = &self.config.seed_url;
        tracing::info!("Starting survey of {}", seed);

        self.state.transition(JobStage::Robots, "resolving robots.txt")?;
        let policy = Arc::new(self.resolve_robots().await);
        self.check_cancelled()?;

        self.state.transition(JobStage::Discovering, "discovering pages")?;
        let discovery = self.discover(&policy).await?;
        self.check_cancelled()?;
        tracing::info!(
            "Discovered {} candidates (sitemap {}, internal links {}, manual {})",
            discovery.candidates.len(),
            discovery.sources.sitemap,
            discovery.sources.internal_links,
            discovery.sources.manual
        );
        let discovery_summary = DiscoverySummary::from(&discovery);

        self.state.transition(
            JobStage::Crawling,
            format!("crawling {} pages", discovery.candidates.len()),
        )?;
        let scheduler = Scheduler::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.analyzer),
            Arc::clone(&policy),
            &self.config,
        );
        let outcome = scheduler
            .run(discovery.candidates, &self.state, &self.cancel)
            .await;

        if outcome.crawled_count == 0 {
            if outcome.cancelled {
                return Err(SurveyError::Cancelled);
            }
            return Err(SurveyError::NoSuccessfulPages {
                url: seed.to_string(),
                attempted: outcome.results.len(),
            });
        }

        self.state.transition(JobStage::Aggregating, "aggregating results")?;
        let report = aggregate(&outcome.results);

        if outcome.cancelled {
            self.state.transition(
                JobStage::Cancelled,
                format!("cancelled after {} pages; partial report", outcome.crawled_count),
            )?;
        } else {
            self.state.transition(
                JobStage::Completed,
                format!(
                    "{} pages analyzed, {} failed",
                    outcome.crawled_count, outcome.failed_count
                ),
            )?;
        }

        Ok(JobOutput {
            seed_url: seed.to_string(),
            config_hash: self.config_hash.clone(),
            started_at,
            completed_at: Utc::now(),
            robots: policy.summary(),
            discovery: discovery_summary,
            results: outcome.results,
            skipped_count: outcome.skipped_count,
            cancelled: outcome.cancelled,
            report,
        })
    }

    fn check_cancelled(&self) -> Result<(), SurveyError> {
        if self.cancel.is_cancelled() {
            Err(SurveyError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Runs a survey job with the default collaborators
///
/// # Returns
///
/// * `Ok(JobOutput)` - The finished job
/// * `Err(SurveyError)` - The job failed
pub async fn run_job(config: CrawlJobConfig) -> Result<JobOutput, SurveyError> {
    Coordinator::new(config)?.run().await
}
