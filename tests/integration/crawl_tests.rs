//! Integration tests for survey jobs
//!
//! These tests use wiremock to create mock HTTP servers and run robots
//! resolution, discovery and whole jobs end-to-end. A scripted fetcher
//! stands in for the network where exact failure sequences are needed.

use async_trait::async_trait;
use site_survey::analysis::{AnalysisError, Analyzer, BasicAnalyzer, Category, CategoryResult, PageAnalysis};
use site_survey::config::{load_config_with_hash, CrawlJobConfig, PacingMode};
use site_survey::crawler::{
    build_http_client, parse_page, Coordinator, FetchError, Fetcher, HttpFetcher, PageCrawlResult,
    PageData, PageMetrics,
};
use site_survey::discovery::{CandidateSource, UrlCandidate, UrlDiscoverer};
use site_survey::output::{aggregate, Priority};
use site_survey::robots::resolve_policy;
use site_survey::state::JobStage;
use site_survey::{RobotsPolicy, SurveyError};
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount(server: &MockServer, route: &str, body: String, mime: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, mime))
        .mount(server)
        .await;
}

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn urlset(base: &str, paths: &[&str]) -> String {
    let urls: String = paths
        .iter()
        .map(|p| format!("<url><loc>{}{}</loc></url>", base, p))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
        urls
    )
}

fn page_with_links(links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">link</a>"#, href))
        .collect();
    format!(
        "<html><head><title>Home</title></head><body><h1>Home</h1>{}</body></html>",
        anchors
    )
}

fn job_config(server: &MockServer) -> CrawlJobConfig {
    let mut config = CrawlJobConfig::for_seed(Url::parse(&server.uri()).unwrap());
    config.user_agent_token = "TestBot".to_string();
    config.user_agent = "TestBot/1.0 (+https://example.com/bot; bot@example.com)".to_string();
    config.per_page_timeout = Duration::from_secs(5);
    config.discovery_timeout = Duration::from_secs(5);
    config
}

fn http_coordinator(config: CrawlJobConfig) -> Coordinator {
    let client = build_http_client(&config.user_agent).unwrap();
    let fetcher = Arc::new(HttpFetcher::new(client.clone()));
    Coordinator::with_parts(config, client, fetcher, Arc::new(BasicAnalyzer))
}

#[tokio::test]
async fn test_missing_robots_allows_everything() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = build_http_client("TestBot/1.0").unwrap();
    let base = Url::parse(&server.uri()).unwrap();
    let policy = resolve_policy(&client, &base, "TestBot").await;

    assert!(!policy.exists());
    assert!(policy.is_allowed(&base.join("/admin/secret").unwrap()));
    assert!(policy.is_allowed(&base.join("/").unwrap()));
    assert_eq!(policy.crawl_delay(), Duration::from_secs(1));
}

#[tokio::test]
async fn test_sitemap_and_seed_links_are_deduplicated() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount(
        &server,
        "/sitemap.xml",
        urlset(&base, &["/about", "/pricing", "/contact"]),
        "application/xml",
    )
    .await;
    // Two new links plus one that the sitemap already lists
    mount(
        &server,
        "/",
        page_with_links(&["/blog/first-post", "/team", "/about#history"]),
        "text/html",
    )
    .await;

    let config = job_config(&server);
    let client = build_http_client(&config.user_agent).unwrap();
    let fetcher = HttpFetcher::new(client.clone());
    let seed = Url::parse(&base).unwrap();

    let report = UrlDiscoverer::new(&client, &fetcher)
        .discover(&seed, &RobotsPolicy::allow_all("TestBot"), &config)
        .await
        .unwrap();

    assert_eq!(report.candidates.len(), 5);
    assert_eq!(report.sources.sitemap, 3);
    assert_eq!(report.sources.internal_links, 2);

    let mut urls: Vec<&str> = report.candidates.iter().map(|c| c.url.as_str()).collect();
    urls.sort();
    urls.dedup();
    assert_eq!(urls.len(), 5);

    let team = report
        .candidates
        .iter()
        .find(|c| c.url.path() == "/team")
        .unwrap();
    assert_eq!(team.source, CandidateSource::InternalLink);
    assert_eq!(team.depth, 1);
}

#[tokio::test]
async fn test_disallowed_pages_are_never_crawled() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(
        &server,
        &format!(
            "User-agent: *\nDisallow: /private\nCrawl-delay: 0\n\nSitemap: {}/pages.xml\n",
            base
        ),
    )
    .await;
    mount(
        &server,
        "/pages.xml",
        urlset(&base, &["/about", "/private/report", "/services"]),
        "application/xml",
    )
    .await;
    mount(&server, "/", page_with_links(&["/private/other"]), "text/html").await;
    for route in ["/about", "/services"] {
        mount(&server, route, page_with_links(&[]), "text/html").await;
    }
    Mock::given(method("GET"))
        .and(path("/private/report"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let output = http_coordinator(job_config(&server)).run().await.unwrap();

    assert!(output.robots.exists);
    assert_eq!(output.robots.crawl_delay_ms, 0);
    assert_eq!(output.discovery.disallowed, 2);
    assert_eq!(output.results.len(), 2);
    assert!(output.results.iter().all(|r| !r.url.contains("/private")));
    assert!(output.results.iter().all(|r| r.succeeded));
}

#[tokio::test]
async fn test_manual_urls_disallowed_are_skipped_at_dispatch() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: TestBot\nDisallow: /admin\nCrawl-delay: 0\n").await;
    mount(&server, "/home", page_with_links(&[]), "text/html").await;

    let mut config = job_config(&server);
    config.manual_urls = Some(vec![
        format!("{}/home", server.uri()),
        format!("{}/admin/panel", server.uri()),
    ]);

    let coordinator = http_coordinator(config);
    let output = coordinator.run().await.unwrap();

    assert_eq!(output.results.len(), 1);
    assert_eq!(output.skipped_count, 1);
    assert_eq!(output.discovery.sources.manual, 2);
    assert_eq!(coordinator.progress().skipped, 1);
    assert_eq!(coordinator.progress().stage, JobStage::Completed);
}

/// Fetcher double with scripted failures per path
struct ScriptedFetcher {
    failures: Mutex<HashMap<String, VecDeque<FetchError>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedFetcher {
    fn new(script: &[(&str, Vec<FetchError>)]) -> Self {
        let failures = script
            .iter()
            .map(|(p, errors)| (p.to_string(), errors.iter().cloned().collect()))
            .collect();
        Self {
            failures: Mutex::new(failures),
            calls: Mutex::new(HashMap::new()),
        }
    }

    fn calls(&self, path: &str) -> usize {
        self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<PageData, FetchError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(url.path().to_string())
            .or_insert(0) += 1;

        let scripted = self
            .failures
            .lock()
            .unwrap()
            .get_mut(url.path())
            .and_then(|q| q.pop_front());
        match scripted {
            Some(error) => Err(error),
            None => Ok(parse_page(
                "<html><head><title>Page</title></head><body><h1>Page</h1></body></html>",
                url,
                PageMetrics::default(),
            )),
        }
    }
}

#[tokio::test]
async fn test_timeouts_retried_and_failures_isolated() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nCrawl-delay: 0\n").await;

    let fetcher = Arc::new(ScriptedFetcher::new(&[
        ("/page-2", vec![FetchError::Timeout]),
        ("/page-5", vec![FetchError::Timeout]),
        ("/page-7", vec![FetchError::Http { status: 500 }]),
    ]));

    let mut config = job_config(&server);
    config.concurrency = 3;
    config.manual_urls = Some(
        (0..10)
            .map(|i| format!("{}/page-{}", server.uri(), i))
            .collect(),
    );

    let client = build_http_client(&config.user_agent).unwrap();
    let coordinator = Coordinator::with_parts(
        config,
        client,
        Arc::clone(&fetcher) as Arc<dyn Fetcher>,
        Arc::new(BasicAnalyzer),
    );
    let output = coordinator.run().await.unwrap();

    let succeeded = output.results.iter().filter(|r| r.succeeded).count();
    assert_eq!(output.results.len(), 10);
    assert_eq!(succeeded, 9);
    assert_eq!(output.report.overall.failed_pages, 1);
    assert_eq!(output.report.overall.crawled_pages, 9);

    assert_eq!(fetcher.calls("/page-2"), 2);
    assert_eq!(fetcher.calls("/page-5"), 2);
    assert_eq!(fetcher.calls("/page-7"), 1);

    let failed: Vec<&PageCrawlResult> = output.results.iter().filter(|r| !r.succeeded).collect();
    assert!(failed[0].url.ends_with("/page-7"));

    let progress = coordinator.progress();
    assert_eq!((progress.completed, progress.crawled, progress.failed), (10, 9, 1));
}

#[tokio::test]
async fn test_shared_pacing_job_completes() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nCrawl-delay: 0.05\n").await;

    let mut config = job_config(&server);
    config.concurrency = 4;
    config.pacing = PacingMode::Shared;
    config.manual_urls = Some((0..4).map(|i| format!("{}/p{}", server.uri(), i)).collect());

    let started = std::time::Instant::now();
    let client = build_http_client(&config.user_agent).unwrap();
    let output = Coordinator::with_parts(
        config,
        client,
        Arc::new(ScriptedFetcher::new(&[])),
        Arc::new(BasicAnalyzer),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(output.results.len(), 4);
    // Three gaps of one crawl-delay between four fetch starts
    assert!(started.elapsed() >= Duration::from_millis(140));
}

/// Scores structured data from a per-path table
struct TableAnalyzer(HashMap<String, u32>);

impl Analyzer for TableAnalyzer {
    fn analyze(&self, page: &PageData) -> Result<PageAnalysis, AnalysisError> {
        let mut analysis = PageAnalysis::default();
        let score = self.0.get(page.url.path()).copied().unwrap_or(100);
        analysis.insert(Category::StructuredData, CategoryResult::with_score(score));
        analysis.insert(Category::Seo, CategoryResult::with_score(80));
        Ok(analysis)
    }
}

#[tokio::test]
async fn test_missing_structured_data_yields_high_priority_recommendation() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nCrawl-delay: 0\n").await;

    let scores: HashMap<String, u32> = [("/a", 0), ("/b", 0), ("/c", 0), ("/d", 0), ("/e", 100)]
        .iter()
        .map(|(p, s)| (p.to_string(), *s))
        .collect();

    let mut config = job_config(&server);
    config.manual_urls = Some(
        ["/a", "/b", "/c", "/d", "/e"]
            .iter()
            .map(|p| format!("{}{}", server.uri(), p))
            .collect(),
    );
    let client = build_http_client(&config.user_agent).unwrap();
    let output = Coordinator::with_parts(
        config,
        client,
        Arc::new(ScriptedFetcher::new(&[])),
        Arc::new(TableAnalyzer(scores)),
    )
    .run()
    .await
    .unwrap();

    let report = &output.report;
    assert_eq!(report.by_category[&Category::StructuredData].avg, 20);

    let rec = report
        .recommendations
        .iter()
        .find(|r| r.category == Category::StructuredData)
        .unwrap();
    assert_eq!(rec.priority, Priority::High);
    assert!(!rec.affected_pages.is_empty());
    assert!(rec.affected_pages.len() <= 5);
    assert!(rec.affected_pages.iter().all(|u| !u.ends_with("/e")));
    assert_eq!(report.recommendations[0].priority, Priority::High);
}

#[tokio::test]
async fn test_no_candidates_fails_job() {
    let server = MockServer::start().await;
    // No robots.txt, no sitemap, and a seed page without internal links
    mount(
        &server,
        "/",
        page_with_links(&["https://elsewhere.example.org/"]),
        "text/html",
    )
    .await;

    let coordinator = http_coordinator(job_config(&server));
    let err = coordinator.run().await.unwrap_err();

    assert!(matches!(err, SurveyError::NoCandidates { .. }));
    assert_eq!(coordinator.progress().stage, JobStage::Failed);
}

#[tokio::test]
async fn test_aggregate_ignores_result_order() {
    let candidate = |p: &str| {
        let url = Url::parse("https://example.com").unwrap().join(p).unwrap();
        UrlCandidate::new(url, CandidateSource::Sitemap, 0, 0.5)
    };
    let result = |p: &str, seo: u32, perf: u32| {
        let mut analysis = PageAnalysis::default();
        analysis.insert(Category::Seo, CategoryResult::with_score(seo));
        analysis.insert(Category::Performance, CategoryResult::with_score(perf));
        PageCrawlResult::success(&candidate(p), analysis, 1)
    };

    let mut results = vec![
        result("/one", 40, 30),
        result("/two", 40, 30),
        result("/three", 90, 20),
        result("/four", 10, 45),
        result("/five", 55, 55),
        result("/six", 40, 30),
    ];

    let expected = aggregate(&results);
    for _ in 0..results.len() {
        results.rotate_left(1);
        assert_eq!(aggregate(&results), expected);
    }
    results.reverse();
    assert_eq!(aggregate(&results), expected);
}

#[test]
fn test_config_file_to_job_config() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(
        br#"
[crawler]
max-pages = 10
concurrency = 2
pacing = "shared"

[user-agent]
crawler-name = "SurveyBot"
crawler-version = "2.0"
contact-url = "https://example.com/bot"
contact-email = "bot@example.com"

[job]
seed-url = "https://example.com/"
urls = ["https://example.com/a", "https://example.com/b"]
"#,
    )
    .unwrap();
    file.flush().unwrap();

    let (config, hash) = load_config_with_hash(file.path()).unwrap();
    let job = config.job_config().unwrap();

    assert_eq!(hash.len(), 64);
    assert_eq!(job.max_pages, 10);
    assert_eq!(job.pacing, PacingMode::Shared);
    assert_eq!(job.user_agent_token, "SurveyBot");
    assert_eq!(job.manual_urls.as_ref().map(Vec::len), Some(2));
}
