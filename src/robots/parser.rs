//! Robots.txt policy parsing
//!
//! Allow/disallow matching is delegated to the robotstxt crate. Crawl-delay
//! and sitemap lines are not exposed by that crate, so they are read here.

use robotstxt::DefaultMatcher;
use serde::Serialize;
use std::time::Duration;
use url::Url;

/// Crawl-delay used when robots.txt is missing or does not set one
pub const DEFAULT_CRAWL_DELAY: Duration = Duration::from_secs(1);

/// The crawl policy for one site, resolved once per job
///
/// Read-only after construction; workers share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    /// Raw robots.txt content (empty when none was found)
    content: String,
    /// Whether a robots.txt was actually found
    exists: bool,
    /// Product token rules are matched against
    user_agent: String,
    crawl_delay: Duration,
    sitemap_urls: Vec<String>,
}

impl RobotsPolicy {
    /// Parses robots.txt content for the given product token
    ///
    /// # Arguments
    ///
    /// * `content` - The raw robots.txt file content
    /// * `user_agent` - The crawler's product token (e.g. `SiteSurveyBot`)
    pub fn from_content(content: &str, user_agent: &str) -> Self {
        let crawl_delay = parse_crawl_delay(content, user_agent)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .unwrap_or(DEFAULT_CRAWL_DELAY);

        Self {
            content: content.to_string(),
            exists: true,
            user_agent: user_agent.to_string(),
            crawl_delay,
            sitemap_urls: parse_sitemaps(content),
        }
    }

    /// Creates the permissive policy used when robots.txt is unavailable
    ///
    /// `exists` is false, every URL is allowed, the crawl-delay is one second
    /// and no sitemaps are known.
    pub fn allow_all(user_agent: &str) -> Self {
        Self {
            content: String::new(),
            exists: false,
            user_agent: user_agent.to_string(),
            crawl_delay: DEFAULT_CRAWL_DELAY,
            sitemap_urls: Vec::new(),
        }
    }

    /// Returns a copy of this policy with a different crawl-delay
    pub fn with_crawl_delay(mut self, delay: Duration) -> Self {
        self.crawl_delay = delay;
        self
    }

    pub fn exists(&self) -> bool {
        self.exists
    }

    pub fn crawl_delay(&self) -> Duration {
        self.crawl_delay
    }

    /// Sitemap locations in the order they appear in the file
    pub fn sitemap_urls(&self) -> &[String] {
        &self.sitemap_urls
    }

    /// Checks if a URL may be crawled
    ///
    /// Never fails; content the matcher cannot make sense of allows the URL.
    pub fn is_allowed(&self, url: &Url) -> bool {
        if !self.exists || self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, &self.user_agent, url.as_str())
    }

    /// Summary of the policy for the job output
    pub fn summary(&self) -> RobotsSummary {
        RobotsSummary {
            exists: self.exists,
            crawl_delay_ms: self.crawl_delay.as_millis() as u64,
            sitemap_urls: self.sitemap_urls.clone(),
        }
    }
}

/// Serializable view of a [`RobotsPolicy`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotsSummary {
    pub exists: bool,
    pub crawl_delay_ms: u64,
    pub sitemap_urls: Vec<String>,
}

/// Splits a robots.txt line into a lowercased key and its value
fn directive(line: &str) -> Option<(String, &str)> {
    let line = match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    };
    let (key, value) = line.split_once(':')?;
    Some((key.trim().to_lowercase(), value.trim()))
}

/// Finds the crawl-delay for `user_agent`, in seconds
///
/// Consecutive `User-agent` lines form one group; any other directive closes
/// the list of agents for that group. A group naming the crawler's own token
/// wins over the `*` group.
fn parse_crawl_delay(content: &str, user_agent: &str) -> Option<f64> {
    let token = user_agent.to_lowercase();
    let mut group_agents: Vec<String> = Vec::new();
    let mut in_agent_lines = false;
    let mut delay_for_agent: Option<f64> = None;
    let mut delay_for_wildcard: Option<f64> = None;

    for line in content.lines() {
        let Some((key, value)) = directive(line) else {
            continue;
        };

        match key.as_str() {
            "user-agent" => {
                if !in_agent_lines {
                    group_agents.clear();
                    in_agent_lines = true;
                }
                group_agents.push(value.to_lowercase());
            }
            "crawl-delay" => {
                in_agent_lines = false;
                let Ok(delay) = value.parse::<f64>() else {
                    continue;
                };
                if !delay.is_finite() || delay < 0.0 {
                    continue;
                }
                if group_agents.iter().any(|agent| *agent == token) {
                    delay_for_agent.get_or_insert(delay);
                } else if group_agents.iter().any(|agent| agent == "*") {
                    delay_for_wildcard.get_or_insert(delay);
                }
            }
            _ => in_agent_lines = false,
        }
    }

    delay_for_agent.or(delay_for_wildcard)
}

/// Collects every `Sitemap:` line regardless of user-agent group
fn parse_sitemaps(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| {
            // Sitemap values are URLs, so only the first colon splits the line
            let (key, value) = line.trim().split_once(':')?;
            if !key.trim().eq_ignore_ascii_case("sitemap") {
                return None;
            }
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        })
        .collect()
}
