//! URL handling module for Site-Survey
//!
//! This module provides URL normalization, host extraction, and the
//! same-site check used to keep discovery on the surveyed site.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{extract_domain, site_host};
pub use normalize::normalize_url;

use url::Url;

/// Checks whether `candidate` belongs to the same site as `base`
///
/// Two URLs are on the same site when their hostnames match after
/// lowercasing and dropping a leading `www.`. Scheme and port are ignored,
/// matching how a browser reports `location.hostname`.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_survey::url::is_same_site;
///
/// let base = Url::parse("https://example.com/").unwrap();
/// assert!(is_same_site(&base, &Url::parse("https://www.example.com/about").unwrap()));
/// assert!(!is_same_site(&base, &Url::parse("https://other.com/").unwrap()));
/// ```
pub fn is_same_site(base: &Url, candidate: &Url) -> bool {
    match (site_host(base), site_host(candidate)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Returns the URL's path, lowercased, for classification heuristics
pub fn lowercase_path(url: &Url) -> String {
    url.path().to_lowercase()
}
