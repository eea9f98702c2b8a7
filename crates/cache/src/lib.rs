//! Keyed on-disk task cache for taskprobe
//!
//! This crate provides the cache layer of the ingestion pipeline:
//! - A `Store` trait with filesystem and in-memory implementations
//! - Scoped shared/exclusive file locking so concurrent readers and
//!   writers never observe a partially written entry
//! - Key policies projecting a task record to its cache key, one
//!   namespace directory per policy
//! - Retention-based pruning of stale entry files

pub mod keys;
pub mod prune;
pub mod store;

pub use keys::{KeyPolicy, Namespace};
pub use prune::prune_namespace;
pub use store::{FsStore, MemStore, Store};
