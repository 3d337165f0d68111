//! State module for tracking job progress
//!
//! # Components
//!
//! - `JobStage`: The stage a job is in, with the allowed transitions
//! - `JobProgress`: An immutable snapshot of counters and the current URL
//! - `JobState`: The single owner that publishes snapshots over a watch channel

mod job_state;

// Re-export main types
pub use job_state::{JobProgress, JobStage, JobState};
