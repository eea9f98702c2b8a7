//! Composable per-task pipeline stages
//!
//! A stage processes one task and either succeeds or fails the whole run.
//! Combinators are plain values so each can be unit tested in isolation
//! against an in-memory store, without network or disk.

use taskprobe_cache::Namespace;
use taskprobe_core::{Result, Task};

/// One step of the ingestion pipeline
pub trait Stage: Send + Sync {
    fn process(&self, task: &Task) -> Result<()>;
}

/// Terminal sink: write the task through a namespace under its derived key
pub struct CacheWrite {
    ns: Namespace,
}

impl CacheWrite {
    #[must_use]
    pub fn new(ns: Namespace) -> Self {
        Self { ns }
    }
}

impl Stage for CacheWrite {
    fn process(&self, task: &Task) -> Result<()> {
        self.ns.write(task)
    }
}

/// Freshness filter: invoke the inner stage only when the incoming task is
/// not strictly older than what this namespace already holds for its key.
///
/// The check is local to this namespace; an absent entry always proceeds,
/// and any other read failure aborts the task.
pub struct IfNewer {
    ns: Namespace,
    next: Box<dyn Stage>,
}

impl IfNewer {
    pub fn new(ns: Namespace, next: impl Stage + 'static) -> Self {
        Self {
            ns,
            next: Box::new(next),
        }
    }
}

impl Stage for IfNewer {
    fn process(&self, task: &Task) -> Result<()> {
        match self.ns.read_current(task) {
            Err(e) if e.is_not_found() => self.next.process(task),
            Err(e) => Err(e),
            Ok(cached) if task.updated < cached.updated => {
                tracing::trace!(
                    uuid = %task.uuid,
                    "skipping stale record for {}",
                    self.ns.policy().dir_name()
                );
                Ok(())
            }
            Ok(_) => self.next.process(task),
        }
    }
}

/// Sequential fan-out: run every child for the same task, stopping at the
/// first failure. Each child's freshness check stays local to its own
/// namespace, so child order does not change what ends up cached.
pub struct FanOut {
    stages: Vec<Box<dyn Stage>>,
}

impl FanOut {
    #[must_use]
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }
}

impl Stage for FanOut {
    fn process(&self, task: &Task) -> Result<()> {
        for stage in &self.stages {
            stage.process(task)?;
        }
        Ok(())
    }
}

/// Route on whether the tracker assigned a policy to the task
pub struct SplitByPolicy {
    assigned: Box<dyn Stage>,
    unassigned: Box<dyn Stage>,
}

impl SplitByPolicy {
    pub fn new(assigned: impl Stage + 'static, unassigned: impl Stage + 'static) -> Self {
        Self {
            assigned: Box::new(assigned),
            unassigned: Box::new(unassigned),
        }
    }
}

impl Stage for SplitByPolicy {
    fn process(&self, task: &Task) -> Result<()> {
        if task.has_policy() {
            self.assigned.process(task)
        } else {
            self.unassigned.process(task)
        }
    }
}

/// Explicit no-op sink
pub struct Discard;

impl Stage for Discard {
    fn process(&self, _task: &Task) -> Result<()> {
        Ok(())
    }
}

/// The standard per-namespace sink: freshness-filtered cache write
#[must_use]
pub fn fresh_write(ns: Namespace) -> IfNewer {
    IfNewer::new(ns.clone(), CacheWrite::new(ns))
}
