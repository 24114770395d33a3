// tests/status_http.rs
//
// HTTP-level tests for the status Router, driven directly via
// tower::ServiceExt::oneshot, plus the listener lifecycle.

mod common;

use std::sync::Arc;

use activity_monitor::status;
use activity_monitor::{MemoryStore, Scheduler, SchedulerCfg};
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use common::{fail, ok, RecordingNotifier, ScriptedSource};

const BODY_LIMIT: usize = 1024 * 1024;

async fn get(app: axum::Router, uri: &str) -> (StatusCode, String) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, String::from_utf8(bytes).expect("utf8"))
}

#[tokio::test]
async fn health_returns_ok() {
    let m = common::monitor(
        Arc::new(ScriptedSource::new(vec![])),
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingNotifier::default()),
    );
    let (code, body) = get(status::router(m.board(), None), "/health").await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body.trim(), "ok");
}

#[tokio::test]
async fn status_reports_scheduler_and_last_cycle() {
    let m = Arc::new(common::monitor(
        Arc::new(ScriptedSource::new(vec![ok("post_100"), fail()])),
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingNotifier::default()),
    ));
    let scheduler = Scheduler::new(
        m.clone(),
        SchedulerCfg {
            interval: std::time::Duration::from_secs(3600),
            shutdown_grace: std::time::Duration::from_secs(1),
        },
    );

    let (_, idle) = get(status::router(m.board(), None), "/status").await;
    let v: Json = serde_json::from_str(&idle).expect("status json");
    assert_eq!(v["scheduler"], "idle");
    assert_eq!(v["cycles"], 0);
    assert!(v["last_outcome"].is_null());

    drop(scheduler);
    m.run_cycle().await;
    m.run_cycle().await;

    let (code, body) = get(status::router(m.board(), None), "/status").await;
    assert_eq!(code, StatusCode::OK);
    let v: Json = serde_json::from_str(&body).expect("status json");
    assert_eq!(v["resource"], "natgeo");
    assert_eq!(v["cycles"], 2);
    assert_eq!(v["last_fingerprint"], "post_100");
    assert_eq!(v["last_outcome"]["kind"], "fetch_failed");
    assert!(v["last_cycle_at"].is_string());
}

#[tokio::test]
async fn metrics_disabled_without_handle() {
    let m = common::monitor(
        Arc::new(ScriptedSource::new(vec![])),
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingNotifier::default()),
    );
    let (code, _) = get(status::router(m.board(), None), "/metrics").await;
    assert_eq!(code, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metrics_render_with_handle() {
    // Built, not installed: the global recorder stays untouched across tests.
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    let m = common::monitor(
        Arc::new(ScriptedSource::new(vec![])),
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingNotifier::default()),
    );
    let (code, _) = get(status::router(m.board(), Some(handle)), "/metrics").await;
    assert_eq!(code, StatusCode::OK);
}

#[tokio::test]
async fn bind_fails_when_port_is_taken() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = taken.local_addr().unwrap();

    let err = status::bind(addr).await.unwrap_err();
    assert!(format!("{err:#}").contains("binding status server"), "{err:#}");
}

#[tokio::test]
async fn serve_stops_when_shutdown_is_signalled() {
    let listener = status::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let m = common::monitor(
        Arc::new(ScriptedSource::new(vec![])),
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingNotifier::default()),
    );
    let (tx, rx) = tokio::sync::watch::channel(false);
    let server = tokio::spawn(status::serve(listener, status::router(m.board(), None), rx));

    tx.send(true).unwrap();
    let result = tokio::time::timeout(std::time::Duration::from_secs(5), server)
        .await
        .expect("server stops after shutdown")
        .expect("server task");
    assert!(result.is_ok());
}
