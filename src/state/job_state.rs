//! Job lifecycle and progress publication

use crate::SurveyError;
use serde::Serialize;
use std::fmt;
use tokio::sync::{broadcast, watch};

/// Per-task snapshots buffered for a lagging task subscriber
const TASK_EVENT_CAPACITY: usize = 1024;

/// The stage a survey job is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStage {
    #[default]
    Pending,
    Robots,
    Discovering,
    Crawling,
    Aggregating,
    Completed,
    Failed,
    Cancelled,
}

impl JobStage {
    /// Returns true if the job can no longer change stage
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Checks whether moving from `self` to `next` is allowed
    ///
    /// Stages advance strictly in order
    /// (pending → robots → discovering → crawling → aggregating → completed);
    /// any non-terminal stage may also end in `Failed` or `Cancelled`.
    pub fn can_transition_to(&self, next: JobStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (_, Self::Failed)
                | (_, Self::Cancelled)
                | (Self::Pending, Self::Robots)
                | (Self::Robots, Self::Discovering)
                | (Self::Discovering, Self::Crawling)
                | (Self::Crawling, Self::Aggregating)
                | (Self::Aggregating, Self::Completed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Robots => "robots",
            Self::Discovering => "discovering",
            Self::Crawling => "crawling",
            Self::Aggregating => "aggregating",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An immutable snapshot of a job's progress
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub stage: JobStage,
    /// Tasks finished so far (crawled + failed + skipped)
    pub completed: usize,
    /// Tasks dispatched in total
    pub total: usize,
    pub crawled: usize,
    pub failed: usize,
    pub skipped: usize,
    pub current_url: Option<String>,
    pub message: Option<String>,
}

impl JobProgress {
    /// Fraction of tasks finished, 0.0 when nothing is scheduled yet
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// The single owner of a job's progress
///
/// Only the code driving the job mutates it; everyone else reads snapshots
/// through [`JobState::subscribe`] or [`JobState::subscribe_tasks`].
#[derive(Debug)]
pub struct JobState {
    tx: watch::Sender<JobProgress>,
    task_tx: broadcast::Sender<JobProgress>,
}

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}

impl JobState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(JobProgress::default());
        let (task_tx, _task_rx) = broadcast::channel(TASK_EVENT_CAPACITY);
        Self { tx, task_tx }
    }

    /// Subscribes to the latest progress snapshot
    ///
    /// Snapshots are coalesced: a receiver that falls behind only sees the
    /// newest one, so it may miss individual task completions. Use
    /// [`JobState::subscribe_tasks`] to observe every finished task.
    pub fn subscribe(&self) -> watch::Receiver<JobProgress> {
        self.tx.subscribe()
    }

    /// Subscribes to one snapshot per finished or skipped task
    ///
    /// A receiver more than 1024 snapshots behind gets
    /// `RecvError::Lagged` instead of silently skipping tasks.
    pub fn subscribe_tasks(&self) -> broadcast::Receiver<JobProgress> {
        self.task_tx.subscribe()
    }

    /// Returns a copy of the current progress
    pub fn snapshot(&self) -> JobProgress {
        self.tx.borrow().clone()
    }

    pub fn stage(&self) -> JobStage {
        self.tx.borrow().stage
    }

    /// Moves the job to `next`
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The transition was published
    /// * `Err(SurveyError::InvalidTransition)` - The move is not allowed
    pub fn transition(&self, next: JobStage, message: impl Into<String>) -> Result<(), SurveyError> {
        let current = self.stage();
        if !current.can_transition_to(next) {
            return Err(SurveyError::InvalidTransition {
                from: current,
                to: next,
            });
        }

        let message = message.into();
        tracing::info!("Job stage {} -> {}: {}", current, next, message);
        self.tx.send_modify(|progress| {
            progress.stage = next;
            progress.message = Some(message);
            if next.is_terminal() {
                progress.current_url = None;
            }
        });
        Ok(())
    }

    /// Sets the number of tasks the crawl will run
    pub fn set_total(&self, total: usize) {
        self.tx.send_modify(|progress| progress.total = total);
    }

    /// Records that a worker picked up `url`
    pub fn task_started(&self, url: &str) {
        self.tx
            .send_modify(|progress| progress.current_url = Some(url.to_string()));
    }

    /// Records a finished task
    pub fn task_finished(&self, url: &str, succeeded: bool) {
        self.tx.send_modify(|progress| {
            progress.completed += 1;
            if succeeded {
                progress.crawled += 1;
            } else {
                progress.failed += 1;
            }
            progress.current_url = Some(url.to_string());
        });
        self.publish_task();
    }

    /// Records a task skipped because robots.txt disallows it
    pub fn task_skipped(&self, url: &str) {
        self.tx.send_modify(|progress| {
            progress.completed += 1;
            progress.skipped += 1;
            progress.current_url = Some(url.to_string());
        });
        self.publish_task();
    }

    fn publish_task(&self) {
        // No task subscribers is not an error
        let _ = self.task_tx.send(self.snapshot());
    }
}
