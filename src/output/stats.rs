//! Console report of a finished survey job

use crate::crawler::{JobOutput, PageErrorKind};
use std::collections::BTreeMap;

/// Counts of failed pages by error kind
pub fn failure_breakdown(output: &JobOutput) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for error in output.results.iter().filter_map(|r| r.error.as_ref()) {
        let label = match error.kind {
            PageErrorKind::Timeout => "timeout",
            PageErrorKind::Fetch => "fetch",
            PageErrorKind::Analysis => "analysis",
        };
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Prints the report to stdout in a formatted manner
///
/// # Arguments
///
/// * `output` - The finished job to display
pub fn print_report(output: &JobOutput) {
    let report = &output.report;
    let overall = &report.overall;

    println!("=== Site Survey: {} ===\n", output.seed_url);

    println!("Overview:");
    println!("  Average score: {}", overall.average_score);
    println!("  Median score: {}", overall.median_score);
    println!("  Pages analyzed: {}", overall.total_pages);
    println!("  Pages failed: {}", overall.failed_pages);
    println!("  Pages skipped (robots.txt): {}", output.skipped_count);
    if output.cancelled {
        println!("  Job was cancelled; the report is partial");
    }
    println!();

    println!("Score Distribution:");
    let distribution = &overall.score_distribution;
    for (label, count) in [
        ("80-100", distribution.excellent),
        ("60-79", distribution.good),
        ("40-59", distribution.fair),
        ("0-39", distribution.poor),
    ] {
        let percentage = if overall.total_pages > 0 {
            (count as f64 / overall.total_pages as f64) * 100.0
        } else {
            0.0
        };
        println!("  {:>6}: {} ({:.1}%)", label, count, percentage);
    }
    println!();

    println!("Categories:");
    for (category, stats) in &report.by_category {
        if stats.pages_analyzed == 0 {
            continue;
        }
        println!(
            "  {:<24} avg {:>3}  median {:>3}  ({} pages)",
            category.display_name(),
            stats.avg,
            stats.median,
            stats.pages_analyzed
        );
    }
    println!();

    let failures = failure_breakdown(output);
    if !failures.is_empty() {
        println!("Failures:");
        for (kind, count) in &failures {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    if !report.recommendations.is_empty() {
        println!("Recommendations ({}):", report.recommendations.len());
        for rec in &report.recommendations {
            println!("  [{}] {}", rec.priority, rec.issue);
            println!("      {}", rec.suggestion);
        }
        println!();
    }

    let attempted = overall.crawled_pages + overall.failed_pages;
    let success_rate = if attempted > 0 {
        (overall.crawled_pages as f64 / attempted as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Success Rate: {:.1}% ({} / {} pages analyzed)",
        success_rate, overall.crawled_pages, attempted
    );
}
