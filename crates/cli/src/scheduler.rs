//! Refresh scheduling and signal handling
//!
//! One deep backfill at startup, a periodic refresh on a fixed interval,
//! and an on-demand backfill on SIGUSR1/SIGUSR2. Runs may overlap: every
//! cache write is individually locked and freshness-filtered, so
//! interleaved runs converge on the newest record. A failed run initiates
//! shutdown; the process supervisor owns the restart.

use crate::metrics;
use std::sync::Arc;
use std::time::Duration;
use taskprobe_ingest::{refresh, Stage, TaskSource};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info};

/// Refresh cadence and lookback windows
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub refresh_interval: Duration,
    pub refresh_lookback: Duration,
    pub backfill_lookback: Duration,
    pub page_limit: usize,
}

/// Drive refresh runs until a shutdown signal arrives or a run fails
pub async fn run(
    source: Arc<dyn TaskSource>,
    pipeline: Arc<dyn Stage>,
    schedule: Schedule,
    shutdown: watch::Sender<bool>,
) -> eyre::Result<()> {
    let mut usr1 = signal(SignalKind::user_defined1())?;
    let mut usr2 = signal(SignalKind::user_defined2())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;

    let shutdown = Arc::new(shutdown);
    // Subscribe before the first run so an immediate failure is not missed.
    let mut failed = shutdown.subscribe();
    spawn_run(
        "startup",
        Arc::clone(&source),
        Arc::clone(&pipeline),
        schedule.backfill_lookback,
        schedule.page_limit,
        Arc::clone(&shutdown),
    );

    let mut ticker = tokio::time::interval(schedule.refresh_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // the startup backfill covers the first period
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                spawn_run(
                    "interval",
                    Arc::clone(&source),
                    Arc::clone(&pipeline),
                    schedule.refresh_lookback,
                    schedule.page_limit,
                    Arc::clone(&shutdown),
                );
            }
            _ = usr1.recv() => {
                info!("got SIGUSR1, backfilling");
                spawn_run(
                    "signal",
                    Arc::clone(&source),
                    Arc::clone(&pipeline),
                    schedule.backfill_lookback,
                    schedule.page_limit,
                    Arc::clone(&shutdown),
                );
            }
            _ = usr2.recv() => {
                info!("got SIGUSR2, backfilling");
                spawn_run(
                    "signal",
                    Arc::clone(&source),
                    Arc::clone(&pipeline),
                    schedule.backfill_lookback,
                    schedule.page_limit,
                    Arc::clone(&shutdown),
                );
            }
            _ = interrupt.recv() => {
                info!("got SIGINT, shutting down");
                break;
            }
            _ = hangup.recv() => {
                info!("got SIGHUP, shutting down");
                break;
            }
            _ = terminate.recv() => {
                info!("got SIGTERM, shutting down");
                break;
            }
            _ = failed.changed() => {
                // a run failed and already requested shutdown
                break;
            }
        }
    }

    let _ = shutdown.send(true);
    Ok(())
}

fn spawn_run(
    trigger: &'static str,
    source: Arc<dyn TaskSource>,
    pipeline: Arc<dyn Stage>,
    lookback: Duration,
    page_limit: usize,
    shutdown: Arc<watch::Sender<bool>>,
) {
    tokio::spawn(async move {
        info!(
            trigger,
            "refreshing cache for the trailing {}s window",
            lookback.as_secs()
        );
        match refresh(source.as_ref(), pipeline.as_ref(), lookback, page_limit).await {
            Ok(summary) => {
                metrics::record_run(trigger, "ok", summary.tasks);
                info!(
                    trigger,
                    pages = summary.pages,
                    tasks = summary.tasks,
                    "refresh finished"
                );
            }
            Err(e) => {
                metrics::record_run(trigger, "error", 0);
                error!("problem refreshing cache: {e}");
                let _ = shutdown.send(true);
            }
        }
    });
}
