//! Analysis result types shared by analyzers and the aggregator

use crate::crawler::PageData;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// One analysis dimension, each scored 0 to 100
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Content,
    Entity,
    Eeat,
    Statistics,
    StructuredData,
    Llmo,
    Seo,
    Performance,
    Multimedia,
    Social,
    LocalSeo,
}

impl Category {
    /// Every category, in report order
    pub const ALL: [Category; 11] = [
        Category::Content,
        Category::Entity,
        Category::Eeat,
        Category::Statistics,
        Category::StructuredData,
        Category::Llmo,
        Category::Seo,
        Category::Performance,
        Category::Multimedia,
        Category::Social,
        Category::LocalSeo,
    ];

    /// Weight in the per-page total score
    ///
    /// `LocalSeo` has no weight; it only contributes a bonus for local
    /// businesses.
    pub fn weight(self) -> Option<f64> {
        match self {
            Category::Eeat => Some(0.20),
            Category::Llmo => Some(0.15),
            Category::StructuredData => Some(0.15),
            Category::Content => Some(0.15),
            Category::Entity => Some(0.10),
            Category::Seo => Some(0.10),
            Category::Performance => Some(0.05),
            Category::Statistics => Some(0.05),
            Category::Multimedia => Some(0.03),
            Category::Social => Some(0.02),
            Category::LocalSeo => None,
        }
    }

    /// Serialized key, e.g. `structuredData`
    pub fn key(self) -> &'static str {
        match self {
            Category::Content => "content",
            Category::Entity => "entity",
            Category::Eeat => "eeat",
            Category::Statistics => "statistics",
            Category::StructuredData => "structuredData",
            Category::Llmo => "llmo",
            Category::Seo => "seo",
            Category::Performance => "performance",
            Category::Multimedia => "multimedia",
            Category::Social => "social",
            Category::LocalSeo => "localSeo",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Category::Content => "Content structure",
            Category::Entity => "Entity optimization",
            Category::Eeat => "E-E-A-T",
            Category::Statistics => "Statistics and data",
            Category::StructuredData => "Structured data",
            Category::Llmo => "AI citation readiness",
            Category::Seo => "Technical SEO",
            Category::Performance => "Performance",
            Category::Multimedia => "Multimedia",
            Category::Social => "Social signals",
            Category::LocalSeo => "Local SEO",
        }
    }

    /// Fixed improvement advice used in recommendations
    pub fn suggestion(self) -> &'static str {
        match self {
            Category::Content => {
                "Improve the H1/H2 heading structure, add an FAQ section and strengthen internal linking."
            }
            Category::Entity => {
                "Add Organization or Person schema and link official profiles with sameAs."
            }
            Category::Eeat => {
                "Show author information, credentials and the sources you cite."
            }
            Category::Statistics => "Add statistics, concrete figures and charts.",
            Category::StructuredData => "Implement FAQPage and Article schema as JSON-LD.",
            Category::Llmo => {
                "Add clear definition sentences and question-style headings."
            }
            Category::Seo => "Tune titles, meta descriptions and Open Graph tags.",
            Category::Performance => {
                "Optimize images (e.g. WebP) and improve server response time."
            }
            Category::Multimedia => "Set alt text on images and add video content.",
            Category::Social => "Optimize Open Graph images and add share links.",
            Category::LocalSeo => {
                "Add LocalBusiness schema, opening hours and an embedded map."
            }
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One scored check inside a category
///
/// `score` and `recommendation` are always present; anything specific to
/// the check (counts, values found) goes into `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detail {
    pub score: f64,
    pub recommendation: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Detail {
    pub fn new(score: f64, recommendation: impl Into<String>) -> Self {
        Self {
            score,
            recommendation: recommendation.into(),
            extra: Map::new(),
        }
    }

    /// Adds a check-specific field
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn extra_u64(&self, key: &str) -> Option<u64> {
        self.extra.get(key).and_then(Value::as_u64)
    }
}

/// The result of analyzing one category of one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResult {
    pub score: u32,
    pub max_score: u32,
    pub details: BTreeMap<String, Detail>,
}

impl CategoryResult {
    /// A bare score with no details
    pub fn with_score(score: u32) -> Self {
        Self {
            score: score.min(100),
            max_score: 100,
            details: BTreeMap::new(),
        }
    }

    /// Sums the detail scores into a 0-100 category score
    pub fn from_details(details: BTreeMap<String, Detail>) -> Self {
        let sum: f64 = details.values().map(|d| d.score.max(0.0)).sum();
        Self {
            score: sum.round().min(100.0) as u32,
            max_score: 100,
            details,
        }
    }
}

/// All category results for one page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAnalysis {
    pub categories: BTreeMap<Category, CategoryResult>,
    /// Whether the page describes a local business (enables the bonus)
    pub is_local_business: bool,
}

impl PageAnalysis {
    pub fn get(&self, category: Category) -> Option<&CategoryResult> {
        self.categories.get(&category)
    }

    pub fn score(&self, category: Category) -> Option<u32> {
        self.get(category).map(|r| r.score)
    }

    pub fn insert(&mut self, category: Category, result: CategoryResult) {
        self.categories.insert(category, result);
    }
}

/// Analyzer failure; recorded as a page failure, never fatal for the job
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalysisError {
    #[error("analysis failed: {0}")]
    Failed(String),

    #[error("analyzer panicked: {0}")]
    Panicked(String),
}

/// Scores a fetched page
///
/// Implementations must be pure functions of the page (no I/O). Missing
/// page fields lower individual detail scores instead of failing.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, page: &PageData) -> Result<PageAnalysis, AnalysisError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_one() {
        let total: f64 = Category::ALL.iter().filter_map(|c| c.weight()).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(Category::LocalSeo.weight(), None);
    }

    #[test]
    fn test_category_serializes_camel_case() {
        assert_eq!(
            serde_json::to_string(&Category::StructuredData).unwrap(),
            "\"structuredData\""
        );
        assert_eq!(
            serde_json::to_string(&Category::LocalSeo).unwrap(),
            "\"localSeo\""
        );
        for category in Category::ALL {
            assert_eq!(
                serde_json::to_value(category).unwrap(),
                Value::String(category.key().to_string())
            );
        }
    }

    #[test]
    fn test_detail_extra_is_flattened() {
        let detail = Detail::new(10.0, "One H1 found.").with("count", 1);
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["count"], 1);
        assert_eq!(json["score"], 10.0);
        assert_eq!(detail.extra_u64("count"), Some(1));
    }

    #[test]
    fn test_category_result_from_details_caps_at_100() {
        let mut details = BTreeMap::new();
        details.insert("a".to_string(), Detail::new(70.4, ""));
        details.insert("b".to_string(), Detail::new(50.0, ""));
        assert_eq!(CategoryResult::from_details(details).score, 100);

        let mut details = BTreeMap::new();
        details.insert("a".to_string(), Detail::new(12.5, ""));
        details.insert("b".to_string(), Detail::new(20.0, ""));
        assert_eq!(CategoryResult::from_details(details).score, 33);
    }

    #[test]
    fn test_page_analysis_lookup() {
        let mut analysis = PageAnalysis::default();
        analysis.insert(Category::Seo, CategoryResult::with_score(80));
        assert_eq!(analysis.score(Category::Seo), Some(80));
        assert_eq!(analysis.score(Category::Eeat), None);
    }
}
