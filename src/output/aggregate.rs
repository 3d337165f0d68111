//! Site-level aggregation of per-page analyses

use crate::analysis::{Category, PageAnalysis};
use crate::crawler::PageCrawlResult;
use crate::discovery::PageCategory;
use crate::output::recommendations::{generate_recommendations, Recommendation};
use serde::Serialize;
use std::collections::BTreeMap;

/// Number of pages listed in the top and bottom rankings
pub const RANKING_SIZE: usize = 5;

/// Histogram of per-page total scores
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreDistribution {
    #[serde(rename = "80-100")]
    pub excellent: usize,
    #[serde(rename = "60-79")]
    pub good: usize,
    #[serde(rename = "40-59")]
    pub fair: usize,
    #[serde(rename = "0-39")]
    pub poor: usize,
}

impl ScoreDistribution {
    fn add(&mut self, score: u32) {
        match score {
            80.. => self.excellent += 1,
            60..=79 => self.good += 1,
            40..=59 => self.fair += 1,
            _ => self.poor += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    /// Successfully analyzed pages
    pub total_pages: usize,
    pub average_score: u32,
    pub median_score: u32,
    pub score_distribution: ScoreDistribution,
    pub crawled_pages: usize,
    pub failed_pages: usize,
}

/// Statistics of one category across the pages that were analyzed for it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub avg: u32,
    pub median: u32,
    pub min: u32,
    pub max: u32,
    pub pages_analyzed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPage {
    pub url: String,
    pub score: u32,
    pub category: PageCategory,
}

/// Per-page scores as listed in the report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageScore {
    pub url: String,
    pub total_score: u32,
    pub category: PageCategory,
    pub scores: BTreeMap<Category, u32>,
}

/// The statistical rollup of every successfully analyzed page of a job
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateReport {
    pub overall: OverallStats,
    pub by_category: BTreeMap<Category, CategoryStats>,
    pub top_pages: Vec<RankedPage>,
    pub bottom_pages: Vec<RankedPage>,
    pub recommendations: Vec<Recommendation>,
    pub pages: Vec<PageScore>,
}

/// A successful result paired with its total score
pub(crate) struct ScoredPage<'a> {
    pub url: &'a str,
    pub category: PageCategory,
    pub analysis: &'a PageAnalysis,
    pub total: u32,
}

/// Computes the weighted total score of one page
///
/// Only categories present in the analysis count, in the numerator and in
/// the weight sum alike. Local businesses get up to 5 bonus points from
/// their local SEO score. Rounded once, capped at 100.
pub fn page_total_score(analysis: &PageAnalysis) -> u32 {
    let mut weighted = 0.0;
    let mut weight_sum = 0.0;

    for (category, result) in &analysis.categories {
        if let Some(weight) = category.weight() {
            weighted += f64::from(result.score) * weight;
            weight_sum += weight;
        }
    }

    let mut score = if weight_sum > 0.0 {
        weighted / weight_sum
    } else {
        0.0
    };

    if analysis.is_local_business {
        if let Some(local) = analysis.score(Category::LocalSeo) {
            score += f64::from(local) / 100.0 * 5.0;
        }
    }

    score.round().clamp(0.0, 100.0) as u32
}

/// Rolls page results up into a site report
///
/// Failed results only count towards `failedPages`. The successful results
/// are ordered by URL before anything is computed, so the report does not
/// depend on the order results arrived in. With no successful result the
/// report is all zeros.
pub fn aggregate(results: &[PageCrawlResult]) -> AggregateReport {
    let mut pages: Vec<ScoredPage<'_>> = results
        .iter()
        .filter(|r| r.succeeded)
        .filter_map(|r| {
            r.analysis.as_ref().map(|analysis| ScoredPage {
                url: &r.url,
                category: r.category,
                analysis,
                total: page_total_score(analysis),
            })
        })
        .collect();

    if pages.is_empty() {
        return AggregateReport::default();
    }
    pages.sort_by(|a, b| a.url.cmp(b.url));

    let crawled_pages = results.iter().filter(|r| r.succeeded).count();
    let overall = overall_stats(&pages, crawled_pages, results.len() - crawled_pages);

    let by_category: BTreeMap<Category, CategoryStats> = Category::ALL
        .iter()
        .map(|&category| {
            let scores: Vec<u32> = pages
                .iter()
                .filter_map(|p| p.analysis.score(category))
                .collect();
            (category, category_stats(&scores))
        })
        .collect();

    let mut ranked: Vec<&ScoredPage<'_>> = pages.iter().collect();
    ranked.sort_by(|a, b| b.total.cmp(&a.total));
    let top_pages = ranked.iter().take(RANKING_SIZE).map(|p| rank(p)).collect();
    ranked.sort_by(|a, b| a.total.cmp(&b.total));
    let bottom_pages = ranked.iter().take(RANKING_SIZE).map(|p| rank(p)).collect();

    let recommendations = generate_recommendations(&pages, &by_category);

    let page_scores = pages
        .iter()
        .map(|p| PageScore {
            url: p.url.to_string(),
            total_score: p.total,
            category: p.category,
            scores: p
                .analysis
                .categories
                .iter()
                .map(|(category, result)| (*category, result.score))
                .collect(),
        })
        .collect();

    AggregateReport {
        overall,
        by_category,
        top_pages,
        bottom_pages,
        recommendations,
        pages: page_scores,
    }
}

fn rank(page: &ScoredPage<'_>) -> RankedPage {
    RankedPage {
        url: page.url.to_string(),
        score: page.total,
        category: page.category,
    }
}

fn overall_stats(pages: &[ScoredPage<'_>], crawled: usize, failed: usize) -> OverallStats {
    let totals: Vec<u32> = pages.iter().map(|p| p.total).collect();
    let mut distribution = ScoreDistribution::default();
    for &score in &totals {
        distribution.add(score);
    }

    OverallStats {
        total_pages: totals.len(),
        average_score: rounded_mean(&totals),
        median_score: lower_median(&totals),
        score_distribution: distribution,
        crawled_pages: crawled,
        failed_pages: failed,
    }
}

fn category_stats(scores: &[u32]) -> CategoryStats {
    if scores.is_empty() {
        return CategoryStats::default();
    }
    CategoryStats {
        avg: rounded_mean(scores),
        median: lower_median(scores),
        min: scores.iter().copied().min().unwrap_or(0),
        max: scores.iter().copied().max().unwrap_or(0),
        pages_analyzed: scores.len(),
    }
}

fn rounded_mean(values: &[u32]) -> u32 {
    if values.is_empty() {
        return 0;
    }
    let sum: u64 = values.iter().map(|&v| u64::from(v)).sum();
    (sum as f64 / values.len() as f64).round() as u32
}

/// Middle value; the lower of the two middle values for even counts
fn lower_median(values: &[u32]) -> u32 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    sorted[(sorted.len() - 1) / 2]
}
