//! Output module for survey reports
//!
//! This module handles:
//! - Aggregating page results into the site-level report
//! - Synthesizing prioritized recommendations
//! - Writing the JSON job output and the markdown summary
//! - Printing a console summary

mod aggregate;
mod markdown;
mod recommendations;
pub mod stats;

pub use aggregate::{
    aggregate, page_total_score, AggregateReport, CategoryStats, OverallStats, PageScore,
    RankedPage, ScoreDistribution,
};
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use recommendations::{Priority, Recommendation};
pub use stats::print_report;

use crate::crawler::JobOutput;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Writes the full job output as pretty-printed JSON
///
/// # Arguments
///
/// * `output` - The finished job
/// * `output_path` - Path of the JSON file
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the file
/// * `Err(OutputError)` - Failed to create or serialize
pub fn write_json_output(output: &JobOutput, output_path: &Path) -> OutputResult<()> {
    let mut writer = BufWriter::new(File::create(output_path)?);
    serde_json::to_writer_pretty(&mut writer, output)?;
    writer.flush()?;
    Ok(())
}
