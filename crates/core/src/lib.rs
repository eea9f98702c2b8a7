//! Core domain types and errors for the `taskprobe` application.
//!
//! This crate establishes the foundational data structures and error handling
//! mechanisms shared by the cache and ingestion crates.
//!
//! ## Key Components
//!
//! - **`errors`**: Defines the primary `Error` enum and `Result` type alias,
//!   centralizing all possible failure modes for predictable error handling.
//! - **`task`**: The task record as returned by the remote tracker, with the
//!   wire field names preserved through serde renames.

pub mod errors;
pub mod task;

pub use self::{
    errors::{Error, Result},
    task::{ErrorContext, ExecutionContext, Policy, Task, TaskError, TaskResult, Tenant},
};
