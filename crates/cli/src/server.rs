//! Probe and metrics HTTP server
//!
//! Each probe route serves one cache namespace: `?target=<key>` renders the
//! cached record for that key as a throwaway metric registry. Cache reads
//! take a shared file lock, so they run on the blocking pool.

use crate::{metrics, probe};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::time::Instant;
use taskprobe_cache::Namespace;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::error;

#[derive(Clone)]
pub struct AppState {
    pub policy: Namespace,
    pub tenant: Namespace,
    pub uuid: Namespace,
}

#[derive(Debug, Deserialize)]
pub struct ProbeParams {
    #[serde(default)]
    target: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/byPolicy", get(probe_by_policy))
        .route("/byTenant", get(probe_by_tenant))
        .route("/byUuid", get(probe_by_uuid))
        .route("/metrics", get(process_metrics))
        .with_state(state)
}

/// Serve until the shutdown flag flips
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
}

async fn probe_by_policy(State(state): State<AppState>, Query(params): Query<ProbeParams>) -> Response {
    render_probe(state.policy, params).await
}

async fn probe_by_tenant(State(state): State<AppState>, Query(params): Query<ProbeParams>) -> Response {
    render_probe(state.tenant, params).await
}

async fn probe_by_uuid(State(state): State<AppState>, Query(params): Query<ProbeParams>) -> Response {
    render_probe(state.uuid, params).await
}

async fn render_probe(ns: Namespace, params: ProbeParams) -> Response {
    let started = Instant::now();
    let rendered =
        tokio::task::spawn_blocking(move || probe::render(&ns, &params.target, started)).await;

    match rendered {
        Ok(Ok(body)) => (
            [(header::CONTENT_TYPE, probe::TEXT_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Ok(Err(e)) => {
            error!("probe failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            error!("probe task failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn process_metrics() -> Response {
    match metrics::gather_text() {
        Ok(body) => (
            [(header::CONTENT_TYPE, probe::TEXT_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("failed to encode metrics: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn index() -> Html<&'static str> {
    Html(
        r#"<html>
<head><title>Taskprobe</title></head>
<body>
<h1>Taskprobe</h1>
<p>Probe endpoints require a target GET argument. Example:
<a href="/byPolicy?target=FC1E08D9-A52D-4CD6-87A1-76E754D994ED">/byPolicy?target=FC1E08D9-A52D-4CD6-87A1-76E754D994ED</a></p>
<ul>
<li><a href="/byPolicy">/byPolicy</a> - cached task by policy id</li>
<li><a href="/byTenant">/byTenant</a> - cached task by tenant</li>
<li><a href="/byUuid">/byUuid</a> - cached task by uuid</li>
<li><a href="/metrics">/metrics</a> - exporter metrics</li>
</ul>
</body>
</html>"#,
    )
}
