// tests/metrics.rs
mod common;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use common::config;
use fin_briefing::metrics::Metrics;
use fin_briefing::pipeline::monitor;
use fin_briefing::{router, AppState};
use tower::ServiceExt;

// One test per binary: the recorder is process-global.
#[tokio::test]
async fn metrics_endpoint_exposes_pipeline_series() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let metrics = Metrics::init(&cfg).unwrap();

    let mut idle = cfg.clone();
    idle.prelim.active_hours = [0, 0];
    monitor::run(&idle, async {}).await;

    let app = router(AppState::new(cfg).with_metrics(metrics.handle.clone()));

    let resp = app
        .clone()
        .oneshot(
            Request::post("/api/pipelines/call-summary/run")
                .body(Body::from(r#"{"text":"ACME 4Q25 call"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8_lossy(&body);

    for series in [
        "pipeline_items_fetched_total",
        "pipeline_items_delivered_total",
        "pipeline_run_ms",
        "pipeline_last_run_ts",
        "cache_retention_days",
    ] {
        assert!(text.contains(series), "missing {series} in:\n{text}");
    }
    assert!(text.contains(r#"pipeline="call-summary""#));
    assert!(text.contains("# HELP monitor_ticks_total"), "{text}");
}
