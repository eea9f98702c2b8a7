//! The paginated task-source seam
//!
//! The walker consumes tasks through this trait; the HTTP tracker client
//! implements it in production and scripted fakes implement it in tests.
//! The cursor is opaque: an empty string means the stream is exhausted,
//! and nothing else may be inferred from its content.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use taskprobe_core::{Result, Task};

/// One page of task records plus the resume cursor for the next page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPage {
    /// Records in non-decreasing `updated` order
    pub tasks: Vec<Task>,
    /// Opaque resume point; empty when no further pages exist
    pub after: String,
}

/// Query shape for the first page of a walk
#[derive(Debug, Clone)]
pub struct TaskFilter {
    /// Completion state to match
    pub state: String,
    /// Lower bound on `updated`
    pub updated_after: DateTime<Utc>,
    /// Page-size limit; 0 lets the source pick its default
    pub limit: usize,
}

impl TaskFilter {
    /// Completed tasks updated within the trailing `lookback` window. This
    /// is the filter every scheduled refresh uses; ascending update order
    /// is what makes the per-namespace freshness check sufficient.
    #[must_use]
    pub fn completed_since(lookback: Duration, limit: usize) -> Self {
        let lookback = ChronoDuration::seconds(lookback.as_secs().min(i64::MAX as u64) as i64);
        Self {
            state: "completed".to_string(),
            updated_after: Utc::now() - lookback,
            limit,
        }
    }
}

/// Remote collaborator supplying task pages in ascending `updated` order
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Fetch the first page matching `filter`
    async fn first_page(&self, filter: &TaskFilter) -> Result<TaskPage>;

    /// Fetch the continuation page for a cursor returned by a prior call
    async fn next_page(&self, after: &str) -> Result<TaskPage>;
}
