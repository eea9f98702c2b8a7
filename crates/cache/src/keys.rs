//! Cache key policies and namespaces
//!
//! A key policy is a pure projection from a task record to its cache key.
//! Each policy owns one namespace directory; namespaces never overlap, and
//! the same task stream may feed several of them at once.

use crate::store::{FsStore, Store};
use std::path::Path;
use std::sync::Arc;
use taskprobe_core::{Error, Result, Task};

/// Projection from a task record to a stable cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPolicy {
    /// Keyed by the assigned policy id. Tasks without a policy project to
    /// the empty key and are skipped by the store.
    ByPolicy,
    /// Keyed by tenant display name, falling back to the tenant id
    ByTenant,
    /// Keyed by the task uuid
    ByUuid,
}

impl KeyPolicy {
    /// Derive the cache key for a task. Pure function of the record.
    #[must_use]
    pub fn key(&self, task: &Task) -> String {
        match self {
            KeyPolicy::ByPolicy => task.policy.id.clone(),
            KeyPolicy::ByTenant => {
                if task.tenant.name.is_empty() {
                    task.tenant.id.clone()
                } else {
                    task.tenant.name.clone()
                }
            }
            KeyPolicy::ByUuid => task.uuid.clone(),
        }
    }

    /// Directory name of this policy's namespace
    #[must_use]
    pub fn dir_name(&self) -> &'static str {
        match self {
            KeyPolicy::ByPolicy => "byPolicy",
            KeyPolicy::ByTenant => "byTenant",
            KeyPolicy::ByUuid => "byUuid",
        }
    }
}

/// One key policy bound to the store that owns its namespace
#[derive(Clone)]
pub struct Namespace {
    policy: KeyPolicy,
    store: Arc<dyn Store>,
}

impl Namespace {
    /// Open a filesystem-backed namespace under `cache_root`, creating the
    /// namespace directory (and parents) idempotently.
    pub fn open(policy: KeyPolicy, cache_root: &Path) -> Result<Self> {
        let dir = cache_root.join(policy.dir_name());
        std::fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, "create", e))?;
        Ok(Self {
            policy,
            store: Arc::new(FsStore::new(dir)),
        })
    }

    /// Bind a policy to an arbitrary store implementation
    #[must_use]
    pub fn with_store(policy: KeyPolicy, store: Arc<dyn Store>) -> Self {
        Self { policy, store }
    }

    /// The key this namespace derives for a task
    #[must_use]
    pub fn key(&self, task: &Task) -> String {
        self.policy.key(task)
    }

    #[must_use]
    pub fn policy(&self) -> KeyPolicy {
        self.policy
    }

    /// Write a task under its derived key
    pub fn write(&self, task: &Task) -> Result<()> {
        self.store.write(&self.key(task), task)
    }

    /// Read whatever is cached under the key this task derives
    pub fn read_current(&self, task: &Task) -> Result<Task> {
        self.store.read(&self.key(task))
    }

    /// Read by explicit key, for the serving layer
    pub fn read(&self, key: &str) -> Result<Task> {
        self.store.read(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use taskprobe_core::{Policy, Tenant};

    fn task_with_identities() -> Task {
        Task {
            uuid: "4242-uuid".to_string(),
            policy: Policy {
                id: "p-9".to_string(),
                ..Policy::default()
            },
            tenant: Tenant {
                name: "Acme".to_string(),
                id: "t-5".to_string(),
            },
            ..Task::default()
        }
    }

    #[test]
    fn projections() {
        let task = task_with_identities();
        assert_eq!(KeyPolicy::ByPolicy.key(&task), "p-9");
        assert_eq!(KeyPolicy::ByTenant.key(&task), "Acme");
        assert_eq!(KeyPolicy::ByUuid.key(&task), "4242-uuid");
    }

    #[test]
    fn tenant_falls_back_to_id() {
        let mut task = task_with_identities();
        task.tenant.name.clear();
        assert_eq!(KeyPolicy::ByTenant.key(&task), "t-5");
    }

    #[test]
    fn unassigned_policy_projects_empty() {
        let mut task = task_with_identities();
        task.policy.id.clear();
        assert_eq!(KeyPolicy::ByPolicy.key(&task), "");
    }

    #[test]
    fn namespace_round_trip() {
        let ns = Namespace::with_store(KeyPolicy::ByUuid, Arc::new(MemStore::new()));
        let task = task_with_identities();
        ns.write(&task).unwrap();
        assert_eq!(ns.read("4242-uuid").unwrap(), task);
        assert_eq!(ns.read_current(&task).unwrap(), task);
    }

    #[test]
    fn open_creates_namespace_dir() {
        let root = tempfile::TempDir::new().unwrap();
        let ns = Namespace::open(KeyPolicy::ByPolicy, root.path()).unwrap();
        assert!(root.path().join("byPolicy").is_dir());
        // idempotent
        Namespace::open(KeyPolicy::ByPolicy, root.path()).unwrap();
        assert_eq!(ns.policy(), KeyPolicy::ByPolicy);
    }
}
