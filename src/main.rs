//! Site-Survey main entry point
//!
//! This is the command-line interface for the Site-Survey site auditor.

use anyhow::Context;
use clap::Parser;
use site_survey::config::{load_config_with_hash, Config, CrawlJobConfig};
use site_survey::crawler::Coordinator;
use site_survey::output::{generate_markdown_summary, print_report, write_json_output};
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

/// Site-Survey: a polite multi-page site auditor
///
/// Site-Survey discovers a site's pages from its sitemaps and internal
/// links, crawls them while respecting robots.txt and crawl-delay, scores
/// every page and writes a site-level report with recommendations.
#[derive(Parser, Debug)]
#[command(name = "site-survey")]
#[command(version = "1.0.0")]
#[command(about = "A polite multi-page site auditor", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Survey this URL instead of the configured seed-url
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the job settings without crawling
    #[arg(long, conflicts_with = "discover_only")]
    dry_run: bool,

    /// Resolve robots.txt and list the candidate pages without crawling them
    #[arg(long, conflicts_with = "dry_run")]
    discover_only: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(url) = cli.url {
        tracing::info!("Overriding seed URL with {}", url);
        config.job.seed_url = url;
        config.job.urls.clear();
    }
    let job = config.job_config()?;

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, &job);
        return Ok(());
    }

    let coordinator = Coordinator::new(job)?.with_config_hash(config_hash);
    if cli.discover_only {
        handle_discover_only(&coordinator).await?;
    } else {
        handle_survey(&config, coordinator).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_survey=info,warn"),
            1 => EnvFilter::new("site_survey=debug,info"),
            2 => EnvFilter::new("site_survey=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the job that would run
fn handle_dry_run(config: &Config, job: &CrawlJobConfig) {
    println!("=== Site-Survey Dry Run ===\n");

    println!("Job:");
    println!("  Seed URL: {}", job.seed_url);
    match &job.manual_urls {
        Some(urls) => println!("  Manual URLs: {} (discovery skipped)", urls.len()),
        None => println!("  Discovery: sitemap {}, max depth {}", job.use_sitemap, job.max_depth),
    }

    println!("\nCrawler Configuration:");
    println!("  Max pages: {}", job.max_pages);
    println!("  Concurrency: {}", job.concurrency);
    println!("  Pacing: {:?}", job.pacing);
    println!("  Per-page timeout: {:?}", job.per_page_timeout);
    println!("  Discovery timeout: {:?}", job.discovery_timeout);
    println!("  Respect robots.txt: {}", job.respect_robots);

    println!("\nUser Agent:");
    println!("  {}", job.user_agent);

    println!("\nOutput:");
    println!("  Report: {}", config.output.report_path);
    println!("  Summary: {}", config.output.summary_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --discover-only mode: prints the ordered candidate list
async fn handle_discover_only(coordinator: &Coordinator) -> anyhow::Result<()> {
    let policy = coordinator.resolve_robots().await;
    let report = coordinator
        .discover(&policy)
        .await
        .context("Discovery failed")?;

    println!("=== Candidates for {} ===\n", coordinator.config().seed_url);
    println!(
        "robots.txt: {} (crawl-delay {:?}), {} URL(s) disallowed\n",
        if policy.exists() { "found" } else { "not found" },
        policy.crawl_delay(),
        report.disallowed
    );
    for (i, candidate) in report.candidates.iter().enumerate() {
        println!(
            "{:>3}. [{:?}/{}] {} (priority {:.1}, depth {})",
            i + 1,
            candidate.importance,
            candidate.category,
            candidate.url,
            candidate.priority,
            candidate.depth
        );
    }
    println!(
        "\nSources: sitemap {}, internal links {}, manual {}",
        report.sources.sitemap, report.sources.internal_links, report.sources.manual
    );

    Ok(())
}

/// Handles the main survey operation
async fn handle_survey(config: &Config, coordinator: Coordinator) -> anyhow::Result<()> {
    // Ctrl-C stops dispatching new pages; in-flight pages finish
    let token = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling survey");
            token.cancel();
        }
    });

    let mut progress = coordinator.subscribe_tasks();
    tokio::spawn(async move {
        loop {
            match progress.recv().await {
                Ok(snapshot) => tracing::debug!(
                    "[{}] {}/{} pages {}",
                    snapshot.stage,
                    snapshot.completed,
                    snapshot.total,
                    snapshot.current_url.unwrap_or_default()
                ),
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!("Progress log skipped {} pages", missed)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let output = coordinator.run().await.context("Survey failed")?;

    let report_path = Path::new(&config.output.report_path);
    write_json_output(&output, report_path)
        .with_context(|| format!("Failed to write report to {}", report_path.display()))?;
    tracing::info!("Report written to {}", report_path.display());

    let summary_path = Path::new(&config.output.summary_path);
    generate_markdown_summary(&output, summary_path)
        .with_context(|| format!("Failed to write summary to {}", summary_path.display()))?;
    tracing::info!("Summary written to {}", summary_path.display());

    print_report(&output);

    Ok(())
}
