//! End-to-end ingestion: a scripted two-page stream drained through the
//! production pipeline shape into real filesystem namespaces.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use taskprobe_cache::{KeyPolicy, Namespace};
use taskprobe_core::{Policy, Result, Task, Tenant};
use taskprobe_ingest::{
    fresh_write, walk, Discard, FanOut, SplitByPolicy, TaskFilter, TaskPage, TaskSource,
};

struct Scripted {
    pages: Mutex<VecDeque<TaskPage>>,
    fetches: AtomicUsize,
}

impl Scripted {
    fn new(pages: Vec<TaskPage>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            fetches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TaskSource for Scripted {
    async fn first_page(&self, _filter: &TaskFilter) -> Result<TaskPage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.pages.lock().unwrap().pop_front().unwrap())
    }

    async fn next_page(&self, _after: &str) -> Result<TaskPage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.pages.lock().unwrap().pop_front().unwrap())
    }
}

fn task(n: i64, policy_id: &str, tenant: &str) -> Task {
    Task {
        uuid: format!("uuid-{n}"),
        updated: Utc.timestamp_opt(1_700_000_000 + n, 0).unwrap(),
        state: "completed".to_string(),
        policy: Policy {
            id: policy_id.to_string(),
            ..Policy::default()
        },
        tenant: Tenant {
            name: tenant.to_string(),
            id: format!("tenant-id-{tenant}"),
        },
        ..Task::default()
    }
}

fn production_pipeline(policy: &Namespace, tenant: &Namespace, uuid: &Namespace) -> FanOut {
    FanOut::new(vec![
        Box::new(SplitByPolicy::new(fresh_write(policy.clone()), Discard)),
        Box::new(fresh_write(tenant.clone())),
        Box::new(fresh_write(uuid.clone())),
    ])
}

fn entries(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn two_page_stream_fills_every_namespace() {
    let cache = tempfile::TempDir::new().unwrap();
    let policy_ns = Namespace::open(KeyPolicy::ByPolicy, cache.path()).unwrap();
    let tenant_ns = Namespace::open(KeyPolicy::ByTenant, cache.path()).unwrap();
    let uuid_ns = Namespace::open(KeyPolicy::ByUuid, cache.path()).unwrap();
    let pipeline = production_pipeline(&policy_ns, &tenant_ns, &uuid_ns);

    let source = Scripted::new(vec![
        TaskPage {
            tasks: vec![
                task(1, "p-1", "alpha"),
                task(2, "p-2", "beta"),
                task(3, "p-3", "gamma"),
            ],
            after: "cursor-1".to_string(),
        },
        TaskPage {
            tasks: vec![task(4, "p-4", "delta"), task(5, "p-5", "epsilon")],
            after: String::new(),
        },
    ]);

    let filter = TaskFilter::completed_since(std::time::Duration::from_secs(3600), 100);
    let summary = walk(&source, &filter, &pipeline).await.unwrap();

    assert_eq!(summary.tasks, 5);
    assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    assert_eq!(entries(&cache.path().join("byPolicy")), 5);
    assert_eq!(entries(&cache.path().join("byTenant")), 5);
    assert_eq!(entries(&cache.path().join("byUuid")), 5);
    assert_eq!(uuid_ns.read("uuid-4").unwrap().policy.id, "p-4");
}

#[tokio::test]
async fn unassigned_tasks_skip_the_policy_cache_only() {
    let cache = tempfile::TempDir::new().unwrap();
    let policy_ns = Namespace::open(KeyPolicy::ByPolicy, cache.path()).unwrap();
    let tenant_ns = Namespace::open(KeyPolicy::ByTenant, cache.path()).unwrap();
    let uuid_ns = Namespace::open(KeyPolicy::ByUuid, cache.path()).unwrap();
    let pipeline = production_pipeline(&policy_ns, &tenant_ns, &uuid_ns);

    let source = Scripted::new(vec![TaskPage {
        tasks: vec![task(1, "", "alpha"), task(2, "p-2", "beta")],
        after: String::new(),
    }]);

    let filter = TaskFilter::completed_since(std::time::Duration::from_secs(3600), 100);
    walk(&source, &filter, &pipeline).await.unwrap();

    assert_eq!(entries(&cache.path().join("byPolicy")), 1);
    assert_eq!(entries(&cache.path().join("byTenant")), 2);
    assert_eq!(entries(&cache.path().join("byUuid")), 2);
    assert_eq!(tenant_ns.read("alpha").unwrap().uuid, "uuid-1");
}

#[tokio::test]
async fn overlapping_runs_converge_to_the_newest_record() {
    let cache = tempfile::TempDir::new().unwrap();
    let uuid_ns = Namespace::open(KeyPolicy::ByUuid, cache.path()).unwrap();
    let pipeline = fresh_write(uuid_ns.clone());

    // A long-lookback backfill replaying older records after a fresh
    // periodic run already cached newer ones.
    let mut newest = task(10, "p-1", "alpha");
    newest.uuid = "shared".to_string();
    let mut stale = task(3, "p-1", "alpha");
    stale.uuid = "shared".to_string();

    let recent = Scripted::new(vec![TaskPage {
        tasks: vec![newest.clone()],
        after: String::new(),
    }]);
    let backfill = Scripted::new(vec![TaskPage {
        tasks: vec![stale],
        after: String::new(),
    }]);

    let filter = TaskFilter::completed_since(std::time::Duration::from_secs(3600), 100);
    walk(&recent, &filter, &pipeline).await.unwrap();
    walk(&backfill, &filter, &pipeline).await.unwrap();

    assert_eq!(uuid_ns.read("shared").unwrap().updated, newest.updated);
}
