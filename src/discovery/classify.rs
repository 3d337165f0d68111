//! Path heuristics for candidate classification

use serde::Serialize;
use std::fmt;
use url::Url;

/// Rough kind of page, guessed from the URL path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageCategory {
    Static,
    Blog,
    Product,
    Other,
}

impl fmt::Display for PageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageCategory::Static => "static",
            PageCategory::Blog => "blog",
            PageCategory::Product => "product",
            PageCategory::Other => "other",
        };
        f.write_str(name)
    }
}

/// How much a candidate is worth crawling early
///
/// Ordered so that `High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    Medium,
    High,
}

const BLOG_SEGMENTS: &[&str] = &[
    "blog", "blogs", "article", "articles", "post", "posts", "news",
];
const PRODUCT_SEGMENTS: &[&str] = &["product", "products", "item", "items", "shop"];
const STATIC_SLUGS: &[&str] = &[
    "about", "contact", "company", "service", "price", "pricing", "faq",
];
const HIGH_VALUE_SLUGS: &[&str] = &["about", "contact", "service", "company", "price", "pricing"];

fn segments(url: &Url) -> Vec<String> {
    url.path()
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn is_root(url: &Url) -> bool {
    segments(url).is_empty()
}

/// True when the path has a `/YYYY/MM/` archive pattern
fn has_date_segments(segments: &[String]) -> bool {
    segments.windows(2).any(|pair| {
        let (year, month) = (&pair[0], &pair[1]);
        year.len() == 4
            && month.len() == 2
            && year.bytes().all(|b| b.is_ascii_digit())
            && month.bytes().all(|b| b.is_ascii_digit())
    })
}

/// Any segment starts with one of the slugs (`services`, `pricing`, `about-us`)
fn has_slug(segments: &[String], slugs: &[&str]) -> bool {
    segments
        .iter()
        .any(|segment| slugs.iter().any(|slug| segment.starts_with(slug)))
}

/// Classifies a URL by its path
///
/// Blog and product markers only count as directory segments (`/blog/...`),
/// so a single `/blog` landing page stays in `Other`.
pub fn classify(url: &Url) -> PageCategory {
    let segs = segments(url);
    if segs.is_empty() {
        return PageCategory::Static;
    }

    let dirs = &segs[..segs.len() - 1];
    if dirs.iter().any(|s| BLOG_SEGMENTS.contains(&s.as_str())) || has_date_segments(&segs) {
        return PageCategory::Blog;
    }

    if dirs.iter().any(|s| PRODUCT_SEGMENTS.contains(&s.as_str())) {
        return PageCategory::Product;
    }

    if has_slug(&segs, STATIC_SLUGS) {
        return PageCategory::Static;
    }

    PageCategory::Other
}

/// Estimates how important a candidate is
///
/// The root path is always high, as is a sitemap priority of 0.8 or more
/// and any known high-value slug. Other sitemap entries are medium.
pub fn estimate_importance(url: &Url, priority: f64, from_sitemap: bool) -> Importance {
    if is_root(url) || priority >= 0.8 || has_slug(&segments(url), HIGH_VALUE_SLUGS) {
        Importance::High
    } else if from_sitemap {
        Importance::Medium
    } else {
        Importance::Low
    }
}
