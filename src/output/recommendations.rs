//! Recommendation synthesis from aggregated scores

use crate::analysis::Category;
use crate::output::aggregate::{CategoryStats, ScoredPage};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Category average below which a category is flagged
pub const LOW_SCORE_THRESHOLD: u32 = 60;

/// Category average below which a flagged category is high priority
pub const HIGH_PRIORITY_THRESHOLD: u32 = 40;

/// Pages a problem must affect before it is reported
pub const MIN_AFFECTED_PAGES: usize = 3;

/// Performance score below which a page counts as slow
pub const SLOW_PAGE_THRESHOLD: u32 = 50;

/// Affected pages listed per recommendation
pub const MAX_LISTED_PAGES: usize = 5;

/// Ordered so that `High` is the greatest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub priority: Priority,
    pub category: Category,
    pub issue: String,
    /// The first few affected URLs
    pub affected_pages: Vec<String>,
    pub suggestion: String,
}

impl Recommendation {
    fn new(
        priority: Priority,
        category: Category,
        issue: String,
        affected: &[&ScoredPage<'_>],
        suggestion: &str,
    ) -> Self {
        Self {
            priority,
            category,
            issue,
            affected_pages: affected
                .iter()
                .take(MAX_LISTED_PAGES)
                .map(|p| p.url.to_string())
                .collect(),
            suggestion: suggestion.to_string(),
        }
    }
}

/// Builds the prioritized recommendation list
///
/// `pages` must already be in their canonical order; affected-page lists
/// follow it. The result is sorted high to medium to low, keeping insertion
/// order within a priority.
pub(crate) fn generate_recommendations(
    pages: &[ScoredPage<'_>],
    by_category: &BTreeMap<Category, CategoryStats>,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    for category in Category::ALL {
        let Some(stats) = by_category.get(&category) else {
            continue;
        };
        if stats.pages_analyzed == 0 || stats.avg >= LOW_SCORE_THRESHOLD {
            continue;
        }

        let low: Vec<&ScoredPage<'_>> = pages
            .iter()
            .filter(|p| matches!(p.analysis.score(category), Some(s) if s < LOW_SCORE_THRESHOLD))
            .collect();
        if low.len() < MIN_AFFECTED_PAGES {
            continue;
        }

        let priority = if stats.avg < HIGH_PRIORITY_THRESHOLD {
            Priority::High
        } else {
            Priority::Medium
        };
        recommendations.push(Recommendation::new(
            priority,
            category,
            format!(
                "{} pages score low on {} (average {})",
                low.len(),
                category.display_name(),
                stats.avg
            ),
            &low,
            category.suggestion(),
        ));
    }

    let h1_issues = matching(pages, |p| {
        p.analysis
            .get(Category::Seo)
            .and_then(|seo| seo.details.get("h1"))
            .map(|h1| h1.extra_u64("count") != Some(1))
            .unwrap_or(false)
    });
    if h1_issues.len() >= MIN_AFFECTED_PAGES {
        recommendations.push(Recommendation::new(
            Priority::High,
            Category::Seo,
            format!("{} pages do not have exactly one H1 heading", h1_issues.len()),
            &h1_issues,
            "Give every page a single H1 heading.",
        ));
    }

    let no_structured_data = matching(pages, |p| {
        p.analysis.score(Category::StructuredData) == Some(0)
    });
    if no_structured_data.len() >= MIN_AFFECTED_PAGES {
        recommendations.push(Recommendation::new(
            Priority::High,
            Category::StructuredData,
            format!("{} pages have no structured data", no_structured_data.len()),
            &no_structured_data,
            "Implement Schema.org structured data as JSON-LD.",
        ));
    }

    let slow = matching(pages, |p| {
        matches!(p.analysis.score(Category::Performance), Some(s) if s < SLOW_PAGE_THRESHOLD)
    });
    if slow.len() >= MIN_AFFECTED_PAGES {
        recommendations.push(Recommendation::new(
            Priority::Medium,
            Category::Performance,
            format!("{} pages load slowly", slow.len()),
            &slow,
            "Optimize images, set cache headers and improve server response time.",
        ));
    }

    // Stable: ties keep insertion order
    recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
    recommendations
}

fn matching<'p, 'a>(
    pages: &'p [ScoredPage<'a>],
    predicate: impl Fn(&ScoredPage<'a>) -> bool,
) -> Vec<&'p ScoredPage<'a>> {
    pages.iter().filter(|p| predicate(*p)).collect()
}
