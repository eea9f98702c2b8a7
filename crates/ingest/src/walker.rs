//! The paginated fetch/drain loop
//!
//! A walk alternates between fetching one page from the source and draining
//! it task-by-task through the pipeline, until the source returns an empty
//! cursor. Any fetch or pipeline error ends the run immediately; the next
//! scheduled run resumes the work for free because already-cached newer
//! entries fall out of the freshness filter.

use crate::pipeline::Stage;
use crate::source::{TaskFilter, TaskPage, TaskSource};
use std::time::Duration;
use taskprobe_core::Result;

/// What a completed walk covered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    pub pages: usize,
    pub tasks: usize,
}

/// Stream every task matching `filter` through `pipeline`, one page at a
/// time, one task at a time. The walk is deliberately sequential: the
/// source returns records in non-decreasing `updated` order, and draining
/// them in order is what keeps the single-entry freshness comparison
/// correct.
pub async fn walk(
    source: &dyn TaskSource,
    filter: &TaskFilter,
    pipeline: &dyn Stage,
) -> Result<WalkSummary> {
    let mut summary = WalkSummary::default();
    let mut page = source.first_page(filter).await?;

    loop {
        log_page(&page);
        summary.pages += 1;
        for task in &page.tasks {
            pipeline.process(task)?;
            summary.tasks += 1;
        }
        if page.after.is_empty() {
            break;
        }
        page = source.next_page(&page.after).await?;
    }

    tracing::debug!(pages = summary.pages, tasks = summary.tasks, "walk finished");
    Ok(summary)
}

/// Run a full refresh: completed tasks from the trailing `lookback` window,
/// ascending by update time, drained into `pipeline`.
pub async fn refresh(
    source: &dyn TaskSource,
    pipeline: &dyn Stage,
    lookback: Duration,
    limit: usize,
) -> Result<WalkSummary> {
    let filter = TaskFilter::completed_since(lookback, limit);
    walk(source, &filter, pipeline).await
}

fn log_page(page: &TaskPage) {
    let first_updated = page
        .tasks
        .first()
        .map(|t| t.updated.to_rfc3339())
        .unwrap_or_default();
    tracing::debug!(
        records = page.tasks.len(),
        after = abbreviate(&page.after),
        %first_updated,
        "fetched page"
    );
}

/// Cursors can be very long tokens; log only a stable prefix
fn abbreviate(cursor: &str) -> &str {
    cursor.get(..16).unwrap_or(cursor)
}
