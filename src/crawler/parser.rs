//! HTML parser for extracting page data
//!
//! This module turns a fetched HTML document into [`PageData`]:
//! - Title, language, canonical link and meta tags
//! - Headings h1-h6
//! - Visible body text
//! - Links (with anchor text and whether they stay on the site)
//! - Images with their alt text
//! - JSON-LD structured data blocks

use crate::url::is_same_site;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;

/// Everything the analyzers get to see about one page
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageData {
    /// Final URL after redirects
    pub url: Url,
    #[serde(skip)]
    pub html: String,
    pub title: Option<String>,
    pub lang: Option<String>,
    pub canonical: Option<String>,
    /// `<meta name|property=... content=...>` pairs, keys lowercased
    pub meta: BTreeMap<String, String>,
    pub headings: Vec<Heading>,
    /// Whitespace-collapsed body text, without script and style content
    pub text: String,
    pub links: Vec<PageLink>,
    pub images: Vec<PageImage>,
    /// Parsed JSON-LD objects; arrays are flattened
    pub structured_data: Vec<serde_json::Value>,
    pub metrics: PageMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLink {
    /// Absolute URL
    pub href: String,
    pub anchor_text: String,
    pub is_internal: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageImage {
    pub src: String,
    pub alt: Option<String>,
}

/// Basic timing and size figures for a fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetrics {
    pub load_time_ms: u64,
    pub html_bytes: usize,
    pub status: u16,
}

impl PageData {
    /// Number of words in the page text
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// Returns the content of a meta tag by (lowercased) name or property
    pub fn meta_content(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }

    pub fn headings_at(&self, level: u8) -> impl Iterator<Item = &Heading> {
        self.headings.iter().filter(move |h| h.level == level)
    }
}

/// Parses HTML content into [`PageData`]
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links
///
/// # Example
///
/// ```
/// use site_survey::crawler::{parse_page, PageMetrics};
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let url = Url::parse("https://example.com/").unwrap();
/// let page = parse_page(html, &url, PageMetrics::default());
/// assert_eq!(page.title, Some("Test".to_string()));
/// assert!(page.links[0].is_internal);
/// ```
pub fn parse_page(html: &str, page_url: &Url, metrics: PageMetrics) -> PageData {
    let document = Html::parse_document(html);

    PageData {
        url: page_url.clone(),
        html: html.to_string(),
        title: extract_title(&document),
        lang: document
            .root_element()
            .value()
            .attr("lang")
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty()),
        canonical: first_attr(&document, "link[rel='canonical'][href]", "href")
            .and_then(|href| resolve_link(&href, page_url))
            .map(|u| u.to_string()),
        meta: extract_meta(&document),
        headings: extract_headings(&document),
        text: extract_text(&document),
        links: extract_links(&document, page_url),
        images: extract_images(&document, page_url),
        structured_data: extract_json_ld(&document),
        metrics,
    }
}

/// Collects an element's text with whitespace collapsed
fn element_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .find_map(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(element_text)
        .filter(|s| !s.is_empty())
}

fn extract_meta(document: &Html) -> BTreeMap<String, String> {
    let mut meta = BTreeMap::new();

    if let Ok(selector) = Selector::parse("meta[content]") {
        for element in document.select(&selector) {
            let key = element
                .value()
                .attr("name")
                .or_else(|| element.value().attr("property"));
            if let (Some(key), Some(content)) = (key, element.value().attr("content")) {
                meta.entry(key.trim().to_lowercase())
                    .or_insert_with(|| content.trim().to_string());
            }
        }
    }

    meta
}

fn extract_headings(document: &Html) -> Vec<Heading> {
    let Ok(selector) = Selector::parse("h1, h2, h3, h4, h5, h6") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let level = element.value().name().strip_prefix('h')?.parse().ok()?;
            Some(Heading {
                level,
                text: element_text(element),
            })
        })
        .collect()
}

fn extract_text(document: &Html) -> String {
    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut words: Vec<&str> = Vec::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element())
            .map(|el| matches!(el.name(), "script" | "style" | "noscript" | "template"))
            .unwrap_or(false);
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }

    words.join(" ")
}

/// Extracts all valid links from the HTML document
fn extract_links(document: &Html, page_url: &Url) -> Vec<PageLink> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            // Skip if it has the download attribute
            if element.value().attr("download").is_some() {
                continue;
            }

            let Some(href) = element.value().attr("href") else {
                continue;
            };
            if let Some(absolute_url) = resolve_link(href, page_url) {
                links.push(PageLink {
                    is_internal: is_same_site(page_url, &absolute_url),
                    href: absolute_url.to_string(),
                    anchor_text: element_text(element),
                });
            }
        }
    }

    links
}

fn extract_images(document: &Html, page_url: &Url) -> Vec<PageImage> {
    let Ok(selector) = Selector::parse("img[src]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let src = element.value().attr("src")?.trim();
            let src = page_url
                .join(src)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| src.to_string());
            Some(PageImage {
                src,
                alt: element.value().attr("alt").map(|a| a.trim().to_string()),
            })
        })
        .collect()
}

/// Parses every `application/ld+json` block; invalid JSON is skipped
fn extract_json_ld(document: &Html) -> Vec<serde_json::Value> {
    let Ok(selector) = Selector::parse("script[type='application/ld+json']") else {
        return Vec::new();
    };

    let mut blocks = Vec::new();
    for element in document.select(&selector) {
        let raw: String = element.text().collect();
        match serde_json::from_str::<serde_json::Value>(raw.trim()) {
            Ok(serde_json::Value::Array(items)) => blocks.extend(items),
            Ok(value) => blocks.push(value),
            Err(e) => tracing::debug!("Skipping invalid JSON-LD block: {}", e),
        }
    }
    blocks
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
        || lowered.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    matches!(absolute_url.scheme(), "http" | "https").then_some(absolute_url)
}
