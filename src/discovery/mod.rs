//! URL discovery
//!
//! Builds the deduplicated, robots-filtered and ordered candidate list a job
//! crawls. Candidates come from sitemaps first, then from same-site links on
//! the seed page. A source that fails contributes nothing; discovery only
//! fails when no source yields a single candidate.

mod classify;
mod sitemap;

pub use classify::{classify, estimate_importance, Importance, PageCategory};
pub use sitemap::{parse_sitemap, Sitemap, SitemapEntry, DEFAULT_PRIORITY};

use crate::config::CrawlJobConfig;
use crate::crawler::{FetchError, Fetcher};
use crate::robots::RobotsPolicy;
use crate::url::{is_same_site, normalize_url};
use crate::SurveyError;
use reqwest::Client;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Well-known sitemap locations probed when robots.txt names none
pub const FALLBACK_SITEMAP_PATHS: &[&str] = &[
    "/sitemap.xml",
    "/sitemap_index.xml",
    "/sitemap1.xml",
    "/post-sitemap.xml",
    "/page-sitemap.xml",
];

/// Maximum child sitemaps followed from one sitemap index
pub const MAX_INDEX_FANOUT: usize = 10;

/// Maximum depth of nested sitemap indexes
pub const MAX_SITEMAP_NESTING: usize = 2;

/// A failure in one discovery source
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("request for {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} is not a usable sitemap: {reason}")]
    Sitemap { url: String, reason: String },

    #[error("seed page could not be fetched: {0}")]
    SeedPage(#[from] FetchError),
}

/// Where a candidate URL came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CandidateSource {
    Sitemap,
    InternalLink,
    Manual,
}

/// A URL eligible for crawling
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlCandidate {
    /// Normalized absolute URL; unique within a candidate set
    pub url: Url,
    pub source: CandidateSource,
    pub depth: u32,
    /// Sitemap priority, 0.0 to 1.0
    pub priority: f64,
    pub category: PageCategory,
    #[serde(rename = "estimatedImportance")]
    pub importance: Importance,
}

impl UrlCandidate {
    /// Creates a candidate, classifying the URL
    pub fn new(url: Url, source: CandidateSource, depth: u32, priority: f64) -> Self {
        let category = classify(&url);
        let importance = estimate_importance(&url, priority, source == CandidateSource::Sitemap);
        Self {
            url,
            source,
            depth,
            priority,
            category,
            importance,
        }
    }
}

/// How many candidates each source contributed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverySources {
    pub sitemap: usize,
    pub internal_links: usize,
    pub manual: usize,
}

/// The outcome of discovery
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    /// Candidates in dispatch order
    pub candidates: Vec<UrlCandidate>,
    pub sources: DiscoverySources,
    pub categories: BTreeMap<PageCategory, usize>,
    /// URLs dropped because robots.txt disallows them
    pub disallowed: usize,
}

impl DiscoveryReport {
    fn from_candidates(
        candidates: Vec<UrlCandidate>,
        sources: DiscoverySources,
        disallowed: usize,
    ) -> Self {
        let mut categories = BTreeMap::new();
        for candidate in &candidates {
            *categories.entry(candidate.category).or_insert(0) += 1;
        }
        Self {
            candidates,
            sources,
            categories,
            disallowed,
        }
    }
}

/// Finds the candidate URLs of a site
pub struct UrlDiscoverer<'a> {
    client: &'a Client,
    fetcher: &'a dyn Fetcher,
}

impl<'a> UrlDiscoverer<'a> {
    /// Creates a discoverer
    ///
    /// Sitemaps are fetched with `client`; the seed page goes through
    /// `fetcher` so it is parsed the same way crawled pages are.
    pub fn new(client: &'a Client, fetcher: &'a dyn Fetcher) -> Self {
        Self { client, fetcher }
    }

    /// Discovers, filters and orders the candidates for `base`
    ///
    /// # Returns
    ///
    /// * `Ok(DiscoveryReport)` - At least one candidate was found
    /// * `Err(SurveyError::NoCandidates)` - No source produced a crawlable URL
    pub async fn discover(
        &self,
        base: &Url,
        policy: &RobotsPolicy,
        config: &CrawlJobConfig,
    ) -> Result<DiscoveryReport, SurveyError> {
        let max = config.max_pages;
        let mut seen: HashSet<Url> = HashSet::new();
        let mut found: Vec<UrlCandidate> = Vec::new();
        let mut sources = DiscoverySources::default();

        if config.use_sitemap {
            let entries = self.sitemap_entries(base, policy, config).await;
            for entry in entries {
                if found.len() >= max {
                    break;
                }
                let url = match normalize_url(&entry.loc) {
                    Ok(url) if is_same_site(base, &url) => url,
                    Ok(url) => {
                        tracing::debug!("Ignoring off-site sitemap entry {}", url);
                        continue;
                    }
                    Err(e) => {
                        tracing::debug!("Skipping sitemap entry {}: {}", entry.loc, e);
                        continue;
                    }
                };
                if seen.insert(url.clone()) {
                    found.push(UrlCandidate::new(
                        url,
                        CandidateSource::Sitemap,
                        0,
                        entry.priority,
                    ));
                    sources.sitemap += 1;
                }
            }
        }

        if found.len() < max && config.max_depth >= 1 {
            match self.seed_links(base, config.discovery_timeout).await {
                Ok(links) => {
                    for url in links {
                        if found.len() >= max {
                            break;
                        }
                        if seen.insert(url.clone()) {
                            found.push(UrlCandidate::new(
                                url,
                                CandidateSource::InternalLink,
                                1,
                                DEFAULT_PRIORITY,
                            ));
                            sources.internal_links += 1;
                        }
                    }
                }
                Err(e) => tracing::warn!("Internal link discovery for {} failed: {}", base, e),
            }
        }

        let before = found.len();
        if config.respect_robots {
            found.retain(|candidate| {
                let allowed = policy.is_allowed(&candidate.url);
                if !allowed {
                    tracing::debug!("Disallowed by robots.txt: {}", candidate.url);
                }
                allowed
            });
        }
        let disallowed = before - found.len();

        found.sort_by(|a, b| {
            b.importance
                .cmp(&a.importance)
                .then(b.priority.total_cmp(&a.priority))
        });

        tracing::info!(
            "Discovered {} candidates for {} ({} from sitemaps, {} from links, {} disallowed)",
            found.len(),
            base,
            sources.sitemap,
            sources.internal_links,
            disallowed
        );

        if found.is_empty() {
            return Err(SurveyError::NoCandidates {
                url: base.to_string(),
            });
        }

        Ok(DiscoveryReport::from_candidates(found, sources, disallowed))
    }

    /// Collects sitemap entries, up to `max_pages`
    ///
    /// Sitemaps named in robots.txt are tried first. Only when they yield
    /// nothing are the well-known locations probed, stopping at the first
    /// that produces entries.
    async fn sitemap_entries(
        &self,
        base: &Url,
        policy: &RobotsPolicy,
        config: &CrawlJobConfig,
    ) -> Vec<SitemapEntry> {
        let mut visited = HashSet::new();
        let mut entries = Vec::new();

        for location in policy.sitemap_urls() {
            if entries.len() >= config.max_pages {
                break;
            }
            self.expand_sitemap(location, config, &mut visited, &mut entries)
                .await;
        }

        if entries.is_empty() {
            for path in FALLBACK_SITEMAP_PATHS {
                let Ok(location) = base.join(path) else {
                    continue;
                };
                self.expand_sitemap(location.as_str(), config, &mut visited, &mut entries)
                    .await;
                if !entries.is_empty() {
                    break;
                }
            }
        }

        entries
    }

    /// Fetches one sitemap and follows index files breadth-first
    async fn expand_sitemap(
        &self,
        location: &str,
        config: &CrawlJobConfig,
        visited: &mut HashSet<String>,
        entries: &mut Vec<SitemapEntry>,
    ) {
        let mut queue = VecDeque::from([(location.to_string(), 0usize)]);

        while let Some((location, nesting)) = queue.pop_front() {
            if entries.len() >= config.max_pages {
                break;
            }
            if !visited.insert(location.clone()) {
                continue;
            }

            let sitemap = match self.fetch_sitemap(&location, config.discovery_timeout).await {
                Ok(sitemap) => sitemap,
                Err(e) => {
                    tracing::debug!("{}", e);
                    continue;
                }
            };

            match sitemap {
                Sitemap::UrlSet(items) => {
                    tracing::debug!("Sitemap {} lists {} URLs", location, items.len());
                    let room = config.max_pages - entries.len();
                    entries.extend(items.into_iter().take(room));
                }
                Sitemap::Index(children) => {
                    if nesting >= MAX_SITEMAP_NESTING {
                        tracing::warn!("Not following sitemap index {}: nested too deep", location);
                        continue;
                    }
                    if children.len() > MAX_INDEX_FANOUT {
                        tracing::debug!(
                            "Sitemap index {} lists {} sitemaps; following the first {}",
                            location,
                            children.len(),
                            MAX_INDEX_FANOUT
                        );
                    }
                    for child in children.into_iter().take(MAX_INDEX_FANOUT) {
                        queue.push_back((child, nesting + 1));
                    }
                }
            }
        }
    }

    async fn fetch_sitemap(&self, location: &str, timeout: Duration) -> Result<Sitemap, DiscoveryError> {
        let response = self
            .client
            .get(location)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| DiscoveryError::Request {
                url: location.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(DiscoveryError::Status {
                url: location.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| DiscoveryError::Request {
            url: location.to_string(),
            reason: e.to_string(),
        })?;

        parse_sitemap(&body).map_err(|reason| DiscoveryError::Sitemap {
            url: location.to_string(),
            reason,
        })
    }

    /// Fetches the seed page and returns its same-site links, normalized
    async fn seed_links(&self, base: &Url, timeout: Duration) -> Result<Vec<Url>, DiscoveryError> {
        let page = self.fetcher.fetch(base, timeout).await?;

        Ok(page
            .links
            .iter()
            .filter(|link| link.is_internal)
            .filter_map(|link| normalize_url(&link.href).ok())
            .filter(|url| is_same_site(base, url))
            .collect())
    }
}

/// Builds candidates from a caller-supplied URL list
///
/// Discovery is skipped entirely: the URLs keep their given order, are
/// deduplicated and capped at `max_pages`. Robots rules are applied later,
/// at dispatch time.
pub fn manual_candidates(
    urls: &[String],
    config: &CrawlJobConfig,
) -> Result<DiscoveryReport, SurveyError> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for raw in urls {
        match normalize_url(raw) {
            Ok(url) => {
                if seen.insert(url.clone()) {
                    candidates.push(UrlCandidate::new(
                        url,
                        CandidateSource::Manual,
                        0,
                        DEFAULT_PRIORITY,
                    ));
                }
            }
            Err(e) => tracing::warn!("Ignoring manual URL {}: {}", raw, e),
        }
    }
    candidates.truncate(config.max_pages);

    if candidates.is_empty() {
        return Err(SurveyError::NoCandidates {
            url: config.seed_url.to_string(),
        });
    }

    let sources = DiscoverySources {
        manual: candidates.len(),
        ..DiscoverySources::default()
    };
    Ok(DiscoveryReport::from_candidates(candidates, sources, 0))
}
