//! Point-in-time probe rendering
//!
//! A probe builds a fresh registry per request, the same shape the
//! blackbox-exporter family uses: `probe_success` says whether the target
//! had a cached record, and the task gauges describe that record. An
//! absent key is a normal unknown state; a corrupt or unreadable entry is
//! a probe failure and surfaces as an error to the caller.

use prometheus::{Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::time::Instant;
use taskprobe_cache::Namespace;
use taskprobe_core::Task;

/// Metric namespace for task gauges
const NAMESPACE: &str = "taskprobe";

/// Content type of the text exposition format
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Render the cached record for `target` as an exposition-format payload
pub fn render(ns: &Namespace, target: &str, started: Instant) -> eyre::Result<String> {
    let registry = Registry::new();

    let success = Gauge::new("probe_success", "Boolean if probe was successful")?;
    registry.register(Box::new(success.clone()))?;
    let duration = Gauge::new("probe_duration_seconds", "Seconds for probe to respond")?;
    registry.register(Box::new(duration.clone()))?;

    let task = match ns.read(target) {
        Ok(task) => {
            success.set(1.0);
            Some(task)
        }
        Err(e) if e.is_not_found() => {
            success.set(0.0);
            None
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(task) = &task {
        register_task(&registry, task)?;
    }
    register_state(&registry, task.as_ref())?;

    duration.set(started.elapsed().as_secs_f64());
    Ok(TextEncoder::new().encode_to_string(&registry.gather())?)
}

/// OK=0 WARNING=1 ERROR=2 UNKNOWN=3, also emitted when nothing is cached
fn register_state(registry: &Registry, task: Option<&Task>) -> eyre::Result<()> {
    let state = Gauge::with_opts(
        Opts::new("policy_state", "OK=0 WARNING=1 ERROR=2 UNKNOWN=3").namespace(NAMESPACE),
    )?;
    state.set(match task.map(|t| t.result.code.as_str()) {
        Some("ok") => 0.0,
        Some("warning") => 1.0,
        Some("error") => 2.0,
        _ => 3.0,
    });
    registry.register(Box::new(state))?;
    Ok(())
}

fn register_task(registry: &Registry, task: &Task) -> eyre::Result<()> {
    let info = GaugeVec::new(
        Opts::new("policy_info", "Metadata of the last run's policy").namespace(NAMESPACE),
        &[
            "tenantId",
            "tenantName",
            "policyType",
            "policyId",
            "policyName",
            "machineName",
        ],
    )?;
    info.with_label_values(&[
        &task.tenant.id,
        &task.tenant.name,
        &task.policy.policy_type,
        &task.policy.id,
        &task.policy.name,
        &task.context.machine_name,
    ])
    .set(1.0);
    registry.register(Box::new(info))?;

    let error = GaugeVec::new(
        Opts::new("policy_error", "Error from the last run of the policy").namespace(NAMESPACE),
        &["reason", "cause", "effect"],
    )?;
    error
        .with_label_values(&[
            &task.result.error.reason,
            &task.result.error.context.cause,
            &task.result.error.context.effect,
        ])
        .set(1.0);
    registry.register(Box::new(error))?;

    let last_run = Gauge::with_opts(
        Opts::new("lastrun_timestamp", "Timestamp of the last task run").namespace(NAMESPACE),
    )?;
    last_run.set(task.updated.timestamp() as f64);
    registry.register(Box::new(last_run))?;

    Ok(())
}
