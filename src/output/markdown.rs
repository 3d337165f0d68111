//! Markdown summary generation
//!
//! This module generates a human-readable markdown summary of a survey job,
//! including the overall scores, category breakdown, rankings and
//! recommendations.

use crate::crawler::JobOutput;
use crate::output::OutputResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown summary of a job to a file
///
/// # Arguments
///
/// * `output` - The finished job
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(output: &JobOutput, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(output);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a job as markdown
pub fn format_markdown_summary(output: &JobOutput) -> String {
    let report = &output.report;
    let mut md = String::new();

    md.push_str("# Site Survey Summary\n\n");

    // Job metadata
    md.push_str("## Job Information\n\n");
    md.push_str(&format!("- **Site**: {}\n", output.seed_url));
    md.push_str(&format!("- **Started**: {}\n", output.started_at.to_rfc3339()));
    md.push_str(&format!(
        "- **Finished**: {}\n",
        output.completed_at.to_rfc3339()
    ));
    let duration = output.completed_at - output.started_at;
    md.push_str(&format!(
        "- **Duration**: {} seconds\n",
        duration.num_seconds()
    ));
    if let Some(hash) = &output.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    if output.cancelled {
        md.push_str("- **Status**: cancelled (partial report)\n");
    }
    md.push_str(&format!(
        "- **robots.txt**: {} (crawl-delay {} ms)\n\n",
        if output.robots.exists { "found" } else { "not found" },
        output.robots.crawl_delay_ms
    ));

    // Discovery
    let sources = &output.discovery.sources;
    md.push_str("## Discovery\n\n");
    md.push_str("| Source | Candidates |\n");
    md.push_str("|--------|------------|\n");
    md.push_str(&format!("| Sitemap | {} |\n", sources.sitemap));
    md.push_str(&format!("| Internal links | {} |\n", sources.internal_links));
    md.push_str(&format!("| Manual | {} |\n", sources.manual));
    md.push_str(&format!(
        "| Disallowed by robots.txt | {} |\n\n",
        output.discovery.disallowed
    ));

    // Overall statistics
    let overall = &report.overall;
    md.push_str("## Overall Score\n\n");
    md.push_str(&format!("- **Average Score**: {}\n", overall.average_score));
    md.push_str(&format!("- **Median Score**: {}\n", overall.median_score));
    md.push_str(&format!("- **Pages Analyzed**: {}\n", overall.total_pages));
    md.push_str(&format!("- **Pages Failed**: {}\n", overall.failed_pages));
    md.push_str(&format!(
        "- **Pages Skipped (robots.txt)**: {}\n\n",
        output.skipped_count
    ));

    let distribution = &overall.score_distribution;
    md.push_str("| Score | Pages |\n");
    md.push_str("|-------|-------|\n");
    md.push_str(&format!("| 80-100 | {} |\n", distribution.excellent));
    md.push_str(&format!("| 60-79 | {} |\n", distribution.good));
    md.push_str(&format!("| 40-59 | {} |\n", distribution.fair));
    md.push_str(&format!("| 0-39 | {} |\n\n", distribution.poor));

    // Category breakdown
    md.push_str("## Category Breakdown\n\n");
    md.push_str("| Category | Avg | Median | Min | Max | Pages |\n");
    md.push_str("|----------|-----|--------|-----|-----|-------|\n");
    for (category, stats) in &report.by_category {
        if stats.pages_analyzed == 0 {
            continue;
        }
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            category.display_name(),
            stats.avg,
            stats.median,
            stats.min,
            stats.max,
            stats.pages_analyzed
        ));
    }
    md.push('\n');

    // Rankings
    if !report.top_pages.is_empty() {
        md.push_str("## Top Pages\n\n");
        md.push_str("| URL | Score | Type |\n");
        md.push_str("|-----|-------|------|\n");
        for page in &report.top_pages {
            md.push_str(&format!("| {} | {} | {} |\n", page.url, page.score, page.category));
        }
        md.push('\n');

        md.push_str("## Pages Needing Attention\n\n");
        md.push_str("| URL | Score | Type |\n");
        md.push_str("|-----|-------|------|\n");
        for page in &report.bottom_pages {
            md.push_str(&format!("| {} | {} | {} |\n", page.url, page.score, page.category));
        }
        md.push('\n');
    }

    // Recommendations
    if !report.recommendations.is_empty() {
        md.push_str("## Recommendations\n\n");
        for (i, rec) in report.recommendations.iter().enumerate() {
            md.push_str(&format!(
                "### {}. [{}] {}\n\n",
                i + 1,
                rec.priority,
                rec.category.display_name()
            ));
            md.push_str(&format!("{}\n\n", rec.issue));
            md.push_str(&format!("**Suggestion**: {}\n\n", rec.suggestion));
            if !rec.affected_pages.is_empty() {
                md.push_str("Affected pages:\n\n");
                for url in &rec.affected_pages {
                    md.push_str(&format!("- {}\n", url));
                }
                md.push('\n');
            }
        }
    }

    // Failures
    let failures: Vec<_> = output.results.iter().filter(|r| !r.succeeded).collect();
    if !failures.is_empty() {
        md.push_str("## Failed Pages\n\n");
        md.push_str("| URL | Reason |\n");
        md.push_str("|-----|--------|\n");
        for result in failures {
            let reason = result
                .error
                .as_ref()
                .map(|e| e.reason.as_str())
                .unwrap_or("unknown");
            md.push_str(&format!("| {} | {} |\n", result.url, reason));
        }
        md.push('\n');
    }

    md
}
