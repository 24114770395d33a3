// src/status.rs
//! Shared view of the monitor for the optional HTTP status endpoint.

use anyhow::{Context, Result};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::monitor::CycleOutcome;
use crate::poller::Fingerprint;
use crate::scheduler::SchedulerState;

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub scheduler: SchedulerState,
    pub resource: String,
    pub cycles: u64,
    pub last_outcome: Option<CycleOutcome>,
    /// Fingerprint from the last successful poll.
    pub last_fingerprint: Option<Fingerprint>,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct StatusBoard {
    inner: Arc<Mutex<StatusSnapshot>>,
}

impl StatusBoard {
    pub fn new(resource: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StatusSnapshot {
                scheduler: SchedulerState::Idle,
                resource: resource.to_string(),
                cycles: 0,
                last_outcome: None,
                last_fingerprint: None,
                last_cycle_at: None,
            })),
        }
    }

    pub fn record_cycle(&self, outcome: &CycleOutcome, at: DateTime<Utc>) {
        let mut s = self.inner.lock().expect("status mutex poisoned");
        s.cycles += 1;
        if let Some(fp) = outcome.fingerprint() {
            s.last_fingerprint = Some(fp.clone());
        }
        s.last_outcome = Some(outcome.clone());
        s.last_cycle_at = Some(at);
    }

    pub fn set_scheduler(&self, state: SchedulerState) {
        self.inner.lock().expect("status mutex poisoned").scheduler = state;
    }

    pub fn scheduler(&self) -> SchedulerState {
        self.inner.lock().expect("status mutex poisoned").scheduler
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.lock().expect("status mutex poisoned").clone()
    }
}

#[derive(Clone)]
struct AppState {
    board: StatusBoard,
    metrics: Option<PrometheusHandle>,
}

/// `/health`, `/status` and `/metrics` (when a Prometheus handle is given).
pub fn router(board: StatusBoard, metrics: Option<PrometheusHandle>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .route("/metrics", get(render_metrics))
        .with_state(AppState { board, metrics })
}

async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    Json(state.board.snapshot())
}

async fn render_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(h) => (StatusCode::OK, h.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}

/// Install the global Prometheus recorder. Call once per process.
pub fn install_metrics_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("prometheus: install recorder")
}

/// Bind the status listener. Done at startup so a taken port fails the process early.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding status server on {addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, "status server listening");
    Ok(listener)
}

/// Serve `router` until `shutdown` flips to true (or its sender is dropped).
pub async fn serve(listener: TcpListener, router: Router, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            // Err means the sender is gone, which also ends the server.
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .context("status server")
}
