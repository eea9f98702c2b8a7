//! Process-level exporter metrics
//!
//! These live in the default registry and describe the exporter itself,
//! not any one cached record; per-record gauges are built per request in
//! `probe`.

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec, TextEncoder,
};

static REFRESH_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "taskprobe_refresh_runs_total",
        "Cache refresh runs by trigger and outcome",
        &["trigger", "outcome"]
    )
    .expect("register refresh run counter")
});

static TASKS_INGESTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "taskprobe_tasks_ingested_total",
        "Task records drained through the pipeline"
    )
    .expect("register ingested task counter")
});

/// Account for one finished refresh run
pub fn record_run(trigger: &str, outcome: &str, tasks: usize) {
    REFRESH_RUNS.with_label_values(&[trigger, outcome]).inc();
    TASKS_INGESTED.inc_by(tasks as u64);
}

/// Encode the default registry in the text exposition format
pub fn gather_text() -> prometheus::Result<String> {
    TextEncoder::new().encode_to_string(&prometheus::gather())
}
