//! Scheduler for running the crawl over a bounded worker pool
//!
//! This module handles:
//! - A FIFO task queue seeded in discovery order
//! - A fixed number of concurrent workers
//! - Crawl-delay pacing, per worker or through one shared gate
//! - Robots.txt checks at dispatch time
//! - Per-page timeouts with a single retry on timeout
//! - Isolating each page so a panic fails only that page
//! - Collecting results and publishing progress

use crate::analysis::{run_analyzer, Analyzer, PageAnalysis};
use crate::config::{CrawlJobConfig, PacingMode};
use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::crawler::parser::PageData;
use crate::discovery::{PageCategory, UrlCandidate};
use crate::robots::RobotsPolicy;
use crate::state::JobState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// What kind of failure ended a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageErrorKind {
    Timeout,
    Fetch,
    Analysis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageError {
    pub kind: PageErrorKind,
    pub reason: String,
}

/// The outcome of crawling one candidate
///
/// Created once by the worker that ran the task and never modified.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCrawlResult {
    pub url: String,
    pub succeeded: bool,
    pub error: Option<PageError>,
    /// Present only when `succeeded` is true
    pub analysis: Option<PageAnalysis>,
    pub crawled_at: DateTime<Utc>,
    pub category: PageCategory,
    pub depth: u32,
    pub priority: f64,
    /// Fetch attempts made (2 when a timeout was retried)
    pub attempts: u32,
}

impl PageCrawlResult {
    pub fn success(candidate: &UrlCandidate, analysis: PageAnalysis, attempts: u32) -> Self {
        Self {
            url: candidate.url.to_string(),
            succeeded: true,
            error: None,
            analysis: Some(analysis),
            crawled_at: Utc::now(),
            category: candidate.category,
            depth: candidate.depth,
            priority: candidate.priority,
            attempts,
        }
    }

    pub fn failure(
        candidate: &UrlCandidate,
        kind: PageErrorKind,
        reason: impl Into<String>,
        attempts: u32,
    ) -> Self {
        Self {
            url: candidate.url.to_string(),
            succeeded: false,
            error: Some(PageError {
                kind,
                reason: reason.into(),
            }),
            analysis: None,
            crawled_at: Utc::now(),
            category: candidate.category,
            depth: candidate.depth,
            priority: candidate.priority,
            attempts,
        }
    }
}

/// Everything the scheduler produced for a job
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    /// Results in completion order
    pub results: Vec<PageCrawlResult>,
    pub crawled_count: usize,
    pub failed_count: usize,
    /// Tasks dropped at dispatch because robots.txt disallows them
    pub skipped_count: usize,
    /// Whether dispatch stopped because the job was cancelled
    pub cancelled: bool,
}

/// Shared gate keeping consecutive fetch starts one delay apart
struct PacingGate {
    delay: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl PacingGate {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_start: Mutex::new(None),
        }
    }

    async fn wait(&self) {
        let mut last = self.last_start.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                tokio::time::sleep(self.delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

enum WorkerEvent {
    Started(String),
    Skipped(String),
    Finished(PageCrawlResult),
}

/// State shared by all workers of one run
struct WorkerContext {
    fetcher: Arc<dyn Fetcher>,
    analyzer: Arc<dyn Analyzer>,
    policy: Arc<RobotsPolicy>,
    queue: Mutex<VecDeque<(usize, UrlCandidate)>>,
    per_page_timeout: Duration,
    respect_robots: bool,
    pacing: PacingMode,
    gate: PacingGate,
    cancel: CancellationToken,
}

impl WorkerContext {
    /// Waits out the crawl-delay before the task at `index`
    async fn pace(&self, index: usize) {
        match self.pacing {
            PacingMode::PerWorker => {
                if index > 0 {
                    tokio::time::sleep(self.gate.delay).await;
                }
            }
            PacingMode::Shared => self.gate.wait().await,
        }
    }

    /// One fetch bounded by the per-page timeout
    async fn fetch_once(&self, url: &Url) -> Result<PageData, FetchError> {
        match tokio::time::timeout(
            self.per_page_timeout,
            self.fetcher.fetch(url, self.per_page_timeout),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }

    /// Fetches and analyzes one candidate; never fails
    async fn crawl(&self, candidate: &UrlCandidate) -> PageCrawlResult {
        let mut attempts = 1;
        let mut fetched = self.fetch_once(&candidate.url).await;

        if matches!(fetched, Err(FetchError::Timeout)) {
            tracing::warn!("Timeout fetching {}, retrying once", candidate.url);
            attempts += 1;
            fetched = self.fetch_once(&candidate.url).await;
        }

        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                let kind = if e.is_timeout() {
                    PageErrorKind::Timeout
                } else {
                    PageErrorKind::Fetch
                };
                tracing::warn!("Failed to crawl {}: {}", candidate.url, e);
                return PageCrawlResult::failure(candidate, kind, e.to_string(), attempts);
            }
        };

        match run_analyzer(self.analyzer.as_ref(), &page) {
            Ok(analysis) => PageCrawlResult::success(candidate, analysis, attempts),
            Err(e) => {
                tracing::warn!("Failed to analyze {}: {}", candidate.url, e);
                PageCrawlResult::failure(candidate, PageErrorKind::Analysis, e.to_string(), attempts)
            }
        }
    }
}

/// Runs crawl tasks over a bounded worker pool
pub struct Scheduler {
    fetcher: Arc<dyn Fetcher>,
    analyzer: Arc<dyn Analyzer>,
    policy: Arc<RobotsPolicy>,
    concurrency: usize,
    per_page_timeout: Duration,
    respect_robots: bool,
    pacing: PacingMode,
}

impl Scheduler {
    /// Creates a scheduler
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Retrieves pages
    /// * `analyzer` - Scores fetched pages
    /// * `policy` - The resolved robots policy (crawl-delay and rules)
    /// * `config` - The job configuration
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        analyzer: Arc<dyn Analyzer>,
        policy: Arc<RobotsPolicy>,
        config: &CrawlJobConfig,
    ) -> Self {
        Self {
            fetcher,
            analyzer,
            policy,
            concurrency: config.concurrency.max(1),
            per_page_timeout: config.per_page_timeout,
            respect_robots: config.respect_robots,
            pacing: config.pacing,
        }
    }

    /// Crawls every candidate and returns the collected results
    ///
    /// Candidates are dispatched in the given order; results arrive in
    /// completion order. Cancelling `cancel` stops dispatch, including a
    /// worker waiting out its crawl-delay, while fetches already running
    /// finish or time out on their own.
    pub async fn run(
        &self,
        candidates: Vec<UrlCandidate>,
        state: &JobState,
        cancel: &CancellationToken,
    ) -> CrawlOutcome {
        let total = candidates.len();
        state.set_total(total);

        let ctx = Arc::new(WorkerContext {
            fetcher: Arc::clone(&self.fetcher),
            analyzer: Arc::clone(&self.analyzer),
            policy: Arc::clone(&self.policy),
            queue: Mutex::new(candidates.into_iter().enumerate().collect()),
            per_page_timeout: self.per_page_timeout,
            respect_robots: self.respect_robots,
            pacing: self.pacing,
            gate: PacingGate::new(self.policy.crawl_delay()),
            cancel: cancel.clone(),
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();
        let worker_count = self.concurrency.min(total);
        tracing::info!(
            "Crawling {} pages with {} workers ({:?} pacing, delay {:?})",
            total,
            worker_count,
            self.pacing,
            self.policy.crawl_delay()
        );

        for id in 0..worker_count {
            workers.spawn(worker(id, Arc::clone(&ctx), tx.clone()));
        }
        drop(tx);

        let mut outcome = CrawlOutcome::default();
        while let Some(event) = rx.recv().await {
            match event {
                WorkerEvent::Started(url) => state.task_started(&url),
                WorkerEvent::Skipped(url) => {
                    outcome.skipped_count += 1;
                    state.task_skipped(&url);
                }
                WorkerEvent::Finished(result) => {
                    if result.succeeded {
                        outcome.crawled_count += 1;
                    } else {
                        outcome.failed_count += 1;
                    }
                    state.task_finished(&result.url, result.succeeded);
                    outcome.results.push(result);
                }
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Crawl worker ended abnormally: {}", e);
            }
        }

        outcome.cancelled = cancel.is_cancelled();
        tracing::info!(
            "Crawl finished: {} crawled, {} failed, {} skipped{}",
            outcome.crawled_count,
            outcome.failed_count,
            outcome.skipped_count,
            if outcome.cancelled { " (cancelled)" } else { "" }
        );
        outcome
    }
}

async fn worker(id: usize, ctx: Arc<WorkerContext>, tx: mpsc::UnboundedSender<WorkerEvent>) {
    loop {
        if ctx.cancel.is_cancelled() {
            break;
        }

        let next = ctx.queue.lock().await.pop_front();
        let Some((index, candidate)) = next else {
            break;
        };

        let paced = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => false,
            _ = ctx.pace(index) => true,
        };
        if !paced {
            tracing::debug!("Worker {} stopping: job cancelled", id);
            break;
        }

        if ctx.respect_robots && !ctx.policy.is_allowed(&candidate.url) {
            tracing::debug!("Skipping {} (disallowed by robots.txt)", candidate.url);
            if tx.send(WorkerEvent::Skipped(candidate.url.to_string())).is_err() {
                break;
            }
            continue;
        }

        tracing::debug!("Worker {} crawling [{}] {}", id, index + 1, candidate.url);
        let _ = tx.send(WorkerEvent::Started(candidate.url.to_string()));

        let result = crawl_isolated(&ctx, &candidate).await;
        if tx.send(WorkerEvent::Finished(result)).is_err() {
            break;
        }
    }

    tracing::trace!("Worker {} done", id);
}

/// Crawls one candidate on its own task so a panicking fetcher only fails that page
async fn crawl_isolated(ctx: &Arc<WorkerContext>, candidate: &UrlCandidate) -> PageCrawlResult {
    let task_ctx = Arc::clone(ctx);
    let task_candidate = candidate.clone();
    match tokio::spawn(async move { task_ctx.crawl(&task_candidate).await }).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Crawl task for {} ended abnormally: {}", candidate.url, e);
            PageCrawlResult::failure(
                candidate,
                PageErrorKind::Fetch,
                format!("crawl task aborted: {}", e),
                1,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisError, Category, CategoryResult};
    use crate::crawler::parser::{parse_page, PageMetrics};
    use crate::discovery::CandidateSource;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    /// Fetcher double: per-path scripted failures, optional slowness
    #[derive(Default)]
    struct ScriptedFetcher {
        failures: StdMutex<HashMap<String, VecDeque<FetchError>>>,
        delay: Duration,
        starts: StdMutex<Vec<Instant>>,
    }

    impl ScriptedFetcher {
        fn fail(self, path: &str, errors: Vec<FetchError>) -> Self {
            self.failures
                .lock()
                .unwrap()
                .insert(path.to_string(), errors.into());
            self
        }
    }

    #[async_trait]
    impl Fetcher for ScriptedFetcher {
        async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<PageData, FetchError> {
            self.starts.lock().unwrap().push(Instant::now());
            let scripted = self
                .failures
                .lock()
                .unwrap()
                .get_mut(url.path())
                .and_then(|q| q.pop_front());
            if let Some(error) = scripted {
                return Err(error);
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(parse_page("<html><h1>x</h1></html>", url, PageMetrics::default()))
        }
    }

    struct FixedAnalyzer;

    impl Analyzer for FixedAnalyzer {
        fn analyze(&self, page: &PageData) -> Result<PageAnalysis, AnalysisError> {
            if page.url.path() == "/broken" {
                return Err(AnalysisError::Failed("bad page".to_string()));
            }
            let mut analysis = PageAnalysis::default();
            analysis.insert(Category::Seo, CategoryResult::with_score(70));
            Ok(analysis)
        }
    }

    fn candidate(path: &str) -> UrlCandidate {
        let url = Url::parse("https://example.com").unwrap().join(path).unwrap();
        UrlCandidate::new(url, CandidateSource::Manual, 0, 0.5)
    }

    fn config(concurrency: usize, pacing: PacingMode) -> CrawlJobConfig {
        let mut config = CrawlJobConfig::for_seed(Url::parse("https://example.com/").unwrap());
        config.concurrency = concurrency;
        config.pacing = pacing;
        config.per_page_timeout = Duration::from_millis(200);
        config
    }

    fn scheduler(
        fetcher: Arc<ScriptedFetcher>,
        policy: RobotsPolicy,
        config: &CrawlJobConfig,
    ) -> Scheduler {
        Scheduler::new(fetcher, Arc::new(FixedAnalyzer), Arc::new(policy), config)
    }

    fn no_delay() -> RobotsPolicy {
        RobotsPolicy::allow_all("TestBot").with_crawl_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_all_pages_succeed() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let config = config(3, PacingMode::PerWorker);
        let candidates: Vec<_> = (0..6).map(|i| candidate(&format!("/p{}", i))).collect();

        let state = JobState::new();
        let outcome = scheduler(fetcher, no_delay(), &config)
            .run(candidates, &state, &CancellationToken::new())
            .await;

        assert_eq!(outcome.results.len(), 6);
        assert_eq!(outcome.crawled_count, 6);
        assert_eq!(outcome.failed_count, 0);
        assert!(!outcome.cancelled);
        assert_eq!(state.snapshot().completed, 6);
    }

    #[tokio::test]
    async fn test_timeout_is_retried_once() {
        let fetcher = Arc::new(
            ScriptedFetcher::default()
                .fail("/flaky", vec![FetchError::Timeout])
                .fail("/dead", vec![FetchError::Timeout, FetchError::Timeout]),
        );
        let config = config(2, PacingMode::PerWorker);
        let candidates = vec![candidate("/flaky"), candidate("/dead"), candidate("/ok")];

        let outcome = scheduler(fetcher, no_delay(), &config)
            .run(candidates, &JobState::new(), &CancellationToken::new())
            .await;

        let by_path = |p: &str| {
            outcome
                .results
                .iter()
                .find(|r| r.url.ends_with(p))
                .unwrap()
                .clone()
        };
        let flaky = by_path("/flaky");
        assert!(flaky.succeeded);
        assert_eq!(flaky.attempts, 2);

        let dead = by_path("/dead");
        assert!(!dead.succeeded);
        assert_eq!(dead.attempts, 2);
        assert_eq!(dead.error.unwrap().kind, PageErrorKind::Timeout);
        assert_eq!(outcome.failed_count, 1);
    }

    #[tokio::test]
    async fn test_other_errors_not_retried() {
        let fetcher = Arc::new(
            ScriptedFetcher::default().fail("/gone", vec![FetchError::Http { status: 404 }]),
        );
        let config = config(1, PacingMode::PerWorker);

        let outcome = scheduler(fetcher, no_delay(), &config)
            .run(vec![candidate("/gone")], &JobState::new(), &CancellationToken::new())
            .await;

        let result = &outcome.results[0];
        assert!(!result.succeeded);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.error.as_ref().unwrap().kind, PageErrorKind::Fetch);
        assert!(result.analysis.is_none());
    }

    #[tokio::test]
    async fn test_hanging_fetch_is_cut_by_timeout() {
        let fetcher = Arc::new(ScriptedFetcher {
            delay: Duration::from_secs(5),
            ..ScriptedFetcher::default()
        });
        let config = config(1, PacingMode::PerWorker);

        let started = std::time::Instant::now();
        let outcome = scheduler(fetcher, no_delay(), &config)
            .run(vec![candidate("/slow")], &JobState::new(), &CancellationToken::new())
            .await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(outcome.results[0].error.as_ref().unwrap().kind, PageErrorKind::Timeout);
        assert_eq!(outcome.results[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_analysis_failure_is_isolated() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let config = config(2, PacingMode::PerWorker);

        let outcome = scheduler(fetcher, no_delay(), &config)
            .run(
                vec![candidate("/broken"), candidate("/fine")],
                &JobState::new(),
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.crawled_count, 1);
        assert_eq!(outcome.failed_count, 1);
        let broken = outcome.results.iter().find(|r| !r.succeeded).unwrap();
        assert_eq!(broken.error.as_ref().unwrap().kind, PageErrorKind::Analysis);
    }

    /// Fetcher that panics on `/boom`
    struct PanickingFetcher;

    #[async_trait]
    impl Fetcher for PanickingFetcher {
        async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<PageData, FetchError> {
            if url.path() == "/boom" {
                panic!("fetcher blew up on {}", url);
            }
            Ok(parse_page("<html><h1>x</h1></html>", url, PageMetrics::default()))
        }
    }

    #[tokio::test]
    async fn test_fetcher_panic_fails_only_that_page() {
        let config = config(1, PacingMode::PerWorker);
        let scheduler = Scheduler::new(
            Arc::new(PanickingFetcher),
            Arc::new(FixedAnalyzer),
            Arc::new(no_delay()),
            &config,
        );

        let state = JobState::new();
        let outcome = scheduler
            .run(
                vec![candidate("/boom"), candidate("/a"), candidate("/b")],
                &state,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.crawled_count, 2);
        assert_eq!(outcome.failed_count, 1);
        let boom = outcome.results.iter().find(|r| r.url.ends_with("/boom")).unwrap();
        assert!(!boom.succeeded);
        assert_eq!(boom.error.as_ref().unwrap().kind, PageErrorKind::Fetch);
        assert_eq!(state.snapshot().completed, 3);
    }

    #[tokio::test]
    async fn test_disallowed_urls_are_skipped_without_result() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let policy = RobotsPolicy::from_content("User-agent: *\nDisallow: /private", "TestBot")
            .with_crawl_delay(Duration::ZERO);
        let config = config(2, PacingMode::PerWorker);

        let state = JobState::new();
        let outcome = scheduler(Arc::clone(&fetcher), policy, &config)
            .run(
                vec![candidate("/public"), candidate("/private/a")],
                &state,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.skipped_count, 1);
        assert!(outcome.results.iter().all(|r| !r.url.contains("/private")));
        assert_eq!(fetcher.starts.lock().unwrap().len(), 1);
        assert_eq!(state.snapshot().skipped, 1);
    }

    #[tokio::test]
    async fn test_shared_pacing_spaces_fetch_starts() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let policy = RobotsPolicy::allow_all("TestBot").with_crawl_delay(Duration::from_millis(100));
        let config = config(3, PacingMode::Shared);
        let candidates: Vec<_> = (0..4).map(|i| candidate(&format!("/p{}", i))).collect();

        scheduler(Arc::clone(&fetcher), policy, &config)
            .run(candidates, &JobState::new(), &CancellationToken::new())
            .await;

        let mut starts = fetcher.starts.lock().unwrap().clone();
        starts.sort();
        assert_eq!(starts.len(), 4);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(90));
        }
    }

    #[tokio::test]
    async fn test_cancel_stops_dispatch() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let policy = RobotsPolicy::allow_all("TestBot").with_crawl_delay(Duration::from_secs(30));
        let config = config(1, PacingMode::PerWorker);
        let candidates: Vec<_> = (0..5).map(|i| candidate(&format!("/p{}", i))).collect();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let outcome = scheduler(fetcher, policy, &config)
            .run(candidates, &JobState::new(), &cancel)
            .await;

        // The first task runs without delay; the second is stuck in pacing
        assert!(outcome.cancelled);
        assert_eq!(outcome.results.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_candidate_list() {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let config = config(3, PacingMode::PerWorker);
        let outcome = scheduler(fetcher, no_delay(), &config)
            .run(Vec::new(), &JobState::new(), &CancellationToken::new())
            .await;
        assert!(outcome.results.is_empty());
    }
}
