//! Task ingestion for taskprobe
//!
//! This crate drives records from the remote tracker into the keyed caches:
//! - **`pipeline`**: composable per-task stages (fan-out, freshness filter,
//!   policy branch, cache sink)
//! - **`source`**: the paginated task-source seam consumed by the walker
//! - **`client`**: the HTTP tracker client implementing that seam
//! - **`walker`**: the fetch/drain loop that streams pages through a
//!   pipeline until the cursor runs dry

pub mod client;
pub mod pipeline;
pub mod source;
pub mod walker;

pub use client::{TrackerClient, TrackerConfig};
pub use pipeline::{fresh_write, CacheWrite, Discard, FanOut, IfNewer, SplitByPolicy, Stage};
pub use source::{TaskFilter, TaskPage, TaskSource};
pub use walker::{refresh, walk, WalkSummary};
