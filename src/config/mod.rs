//! Configuration module for Site-Survey
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and turning them into the immutable [`CrawlJobConfig`] a job runs with.
//!
//! # Example
//!
//! ```no_run
//! use site_survey::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("survey.toml")).unwrap();
//! println!("Survey will crawl at most {} pages", config.crawler.max_pages);
//! ```

mod job;
mod parser;
mod types;
mod validation;

// Re-export types
pub use job::{CrawlJobConfig, PacingMode};
pub use types::{Config, CrawlerConfig, JobSection, OutputConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
