//! Page analysis
//!
//! The crawl engine only depends on the [`Analyzer`] contract; the scoring
//! rules of individual categories live behind it.

mod basic;
mod types;

pub use basic::BasicAnalyzer;
pub use types::{
    AnalysisError, Analyzer, Category, CategoryResult, Detail, PageAnalysis,
};

use crate::crawler::PageData;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Runs an analyzer, turning a panic into an [`AnalysisError`]
///
/// A misbehaving analyzer must only fail the page it was given.
pub fn run_analyzer(analyzer: &dyn Analyzer, page: &PageData) -> Result<PageAnalysis, AnalysisError> {
    match catch_unwind(AssertUnwindSafe(|| analyzer.analyze(page))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(AnalysisError::Panicked(message))
        }
    }
}
