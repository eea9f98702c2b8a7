//! The task record as reported by the remote tracker.
//!
//! Records are immutable once fetched; the cache only ever replaces a whole
//! entry with a newer one. Serde renames preserve the tracker's wire field
//! names, and every field defaults when the tracker omits it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed unit of work reported by the tracker.
///
/// `updated` is the ordering key for the whole ingestion path: a record with
/// an older `updated` never overwrites a cached record with a newer one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Task {
    pub id: i64,
    pub uuid: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub tenant: Tenant,
    pub policy: Policy,
    pub context: ExecutionContext,
    #[serde(rename = "updatedAt")]
    pub updated: DateTime<Utc>,
    pub state: String,
    #[serde(rename = "startedByUser")]
    pub started_by_user: String,
    #[serde(rename = "cancelRequested")]
    pub cancel_requested: bool,
    pub kind: i64,
    pub result: TaskResult,
}

impl Task {
    /// Whether the tracker assigned a policy to this task. Tasks without
    /// one are still meaningful through the tenant and uuid caches.
    #[must_use]
    pub fn has_policy(&self) -> bool {
        !self.policy.id.is_empty()
    }
}

/// Tenant identity attached to a task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tenant {
    #[serde(rename = "Name")]
    pub name: String,
    pub id: String,
}

/// Policy identity attached to a task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub id: String,
    #[serde(rename = "type")]
    pub policy_type: String,
    pub name: String,
}

/// Where the task executed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionContext {
    #[serde(rename = "MachineName")]
    pub machine_name: String,
    #[serde(rename = "ProtectionPlanID")]
    pub protection_plan_id: String,
}

/// Outcome of a completed task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskResult {
    pub code: String,
    pub error: TaskError,
}

/// Error detail present when the result code is not success
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskError {
    pub reason: String,
    pub context: ErrorContext,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorContext {
    #[serde(rename = "cause_str")]
    pub cause: String,
    #[serde(rename = "effect_str")]
    pub effect: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wire_field_names() {
        let raw = r#"{
            "id": 414863,
            "uuid": "FC1E08D9-A52D-4CD6-87A1-76E754D994ED",
            "type": "backup",
            "tenant": {"Name": "Example Corp", "id": "t-100"},
            "policy": {"id": "p-7", "type": "policy.backup", "name": "Nightly"},
            "context": {"MachineName": "db01", "ProtectionPlanID": "pp-1"},
            "updatedAt": "2024-03-01T02:15:00Z",
            "state": "completed",
            "startedByUser": "scheduler",
            "cancelRequested": false,
            "kind": 2,
            "result": {
                "code": "error",
                "error": {
                    "reason": "disk full",
                    "context": {"cause_str": "volume /dev/sda1", "effect_str": "backup skipped"}
                }
            }
        }"#;

        let task: Task = serde_json::from_str(raw).unwrap();
        assert_eq!(task.task_type, "backup");
        assert_eq!(task.tenant.name, "Example Corp");
        assert_eq!(task.policy.id, "p-7");
        assert_eq!(task.context.machine_name, "db01");
        assert_eq!(task.result.error.context.cause, "volume /dev/sda1");
        assert!(task.has_policy());
    }

    #[test]
    fn missing_fields_default() {
        let task: Task = serde_json::from_str(r#"{"uuid": "u-1"}"#).unwrap();
        assert_eq!(task.uuid, "u-1");
        assert_eq!(task.id, 0);
        assert!(!task.has_policy());
        assert_eq!(task.result.code, "");
    }
}
