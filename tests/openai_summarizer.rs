// tests/openai_summarizer.rs
mod common;

use std::time::Duration;

use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use chrono::NaiveDate;
use common::{config, credentials, serve};
use fin_briefing::config::LlmMode;
use fin_briefing::pipeline::call_summary::{self, CallSummaryOptions};
use fin_briefing::record::Template;
use fin_briefing::summarize::{OpenAiSummarizer, Summarizer};
use fin_briefing::SummarizationError;
use serde_json::{json, Value};

const KEY: &str = "sk-test";

fn reply(content: &str) -> Value {
    json!({ "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }] })
}

async fn completions(headers: HeaderMap, Json(req): Json<Value>) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if auth != format!("Bearer {KEY}") {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad key" })));
    }
    let system = req["messages"][0]["content"].as_str().unwrap_or_default();
    let user = req["messages"][1]["content"].as_str().unwrap_or_default();
    let first = user.lines().next().unwrap_or_default();
    let content = if system.contains("earnings-call") || system.contains("{company}") {
        format!("< {first} earnings call >\n\n1. Annual results\n- ok")
    } else {
        format!("  brief of {first}  ")
    };
    (StatusCode::OK, Json(reply(&content)))
}

async fn model_server() -> String {
    serve(Router::new().route("/chat/completions", post(completions))).await
}

async fn fixed(status: StatusCode, body: Value) -> String {
    let app = Router::new().route(
        "/chat/completions",
        post(move || {
            let body = body.clone();
            async move { (status, Json(body)) }
        }),
    );
    serve(app).await
}

fn client(base: &str) -> OpenAiSummarizer {
    OpenAiSummarizer::new(base, "gpt-4o-mini", Some(KEY.into()), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn content_is_trimmed_and_request_carries_template_parameters() {
    let app = Router::new().route(
        "/chat/completions",
        post(|Json(req): Json<Value>| async move {
            assert_eq!(req["model"], "gpt-4o-mini");
            assert_eq!(req["messages"][0]["role"], "system");
            assert_eq!(req["messages"][1]["role"], "user");
            assert_eq!(req["max_tokens"], 300);
            let t = req["temperature"].as_f64().unwrap();
            assert!((t - 0.3).abs() < 1e-6, "{t}");
            Json(reply("\n 반도체 수출이 늘었다. \n"))
        }),
    );
    let base = serve(app).await;

    let out = client(&base)
        .summarize("반도체 수출 증가\n\n본문", Template::NewsBrief)
        .await
        .unwrap();
    assert_eq!(out, "반도체 수출이 늘었다.");
}

#[tokio::test]
async fn quota_and_server_errors_map_to_their_variants() {
    let base = fixed(StatusCode::TOO_MANY_REQUESTS, json!({ "error": { "type": "insufficient_quota" } })).await;
    assert!(matches!(
        client(&base).summarize("x", Template::NewsBrief).await,
        Err(SummarizationError::Quota)
    ));

    let base = fixed(StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": "boom" })).await;
    match client(&base).summarize("x", Template::MarketOverview).await {
        Err(SummarizationError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert!(body.contains("boom"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn empty_or_garbled_replies_are_errors() {
    let base = fixed(StatusCode::OK, reply("   ")).await;
    assert!(matches!(
        client(&base).summarize("x", Template::NewsBrief).await,
        Err(SummarizationError::EmptyOutput)
    ));

    let base = fixed(StatusCode::OK, json!({ "unexpected": true })).await;
    assert!(matches!(
        client(&base).summarize("x", Template::NewsBrief).await,
        Err(SummarizationError::Malformed(_))
    ));
}

#[tokio::test]
async fn call_summary_document_uses_the_model_output() {
    let base = model_server().await;
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.llm.mode = LlmMode::Openai;
    cfg.llm.base_url = base;
    let cfg = cfg.with_credentials(credentials(&[("OPENAI_API", KEY)]));

    let date = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
    let opts = CallSummaryOptions {
        text: Some("넷마블 4Q25 실적발표 컨퍼런스콜\n\n매출은 전년 대비 증가했습니다.".into()),
        ..Default::default()
    };
    let report = call_summary::run_on(&cfg, opts, date).await.unwrap();

    assert_eq!(report.delivered, 1, "{:?}", report.failures);
    assert_eq!(report.summaries, 1);
    let doc = cfg.output_dir.join("넷마블_20260210_4Q25_call_summary.txt");
    let saved = std::fs::read_to_string(&doc).unwrap();
    assert!(saved.starts_with("< 넷마블 4Q25 earnings call >"), "{saved}");
}

#[tokio::test]
async fn call_summary_without_a_key_records_a_summarize_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.llm.mode = LlmMode::Openai;
    cfg.llm.base_url = "http://127.0.0.1:1".into();

    let opts = CallSummaryOptions {
        text: Some("넷마블 4Q25 실적발표".into()),
        ..Default::default()
    };
    let date = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
    let report = call_summary::run_on(&cfg, opts, date).await.unwrap();

    assert_eq!(report.delivered, 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, "summarize");
    assert!(report.outputs.is_empty());
}
