// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use fin_briefing::config::{AppConfig, Credentials, LlmMode};
use serde_json::{json, Value};

pub const BOT_TOKEN: &str = "TESTTOKEN";
pub const CHAT_ID: &str = "4242";

/// Serve `app` on an ephemeral local port; returns `http://127.0.0.1:<port>`.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub fn credentials(pairs: &[(&str, &str)]) -> Credentials {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Credentials::from_lookup(move |k| map.get(k).cloned())
}

/// Config rooted in `dir`, mock summarizer, every endpoint unreachable until
/// a test points it somewhere.
pub fn config(dir: &Path) -> AppConfig {
    let mut cfg = AppConfig {
        output_dir: dir.join("output"),
        http_timeout_secs: 5,
        ..AppConfig::default()
    };
    cfg.cache.dir = dir.join("cache");
    cfg.llm.mode = LlmMode::Mock;
    cfg.endpoints.naver_news = "http://127.0.0.1:1/v1/search/news.json".into();
    cfg.endpoints.kind_base = "http://127.0.0.1:1".into();
    cfg.endpoints.yahoo_base = "http://127.0.0.1:1".into();
    cfg.endpoints.telegram_base = "http://127.0.0.1:1".into();
    cfg.prelim.request_timeout_secs = 5;
    cfg
}

/// Bot API stand-in: records every sendMessage payload and answers from a
/// script, then with `{"ok": true}` once the script is used up.
#[derive(Clone, Default)]
pub struct TelegramMock {
    received: Arc<Mutex<Vec<Value>>>,
    script: Arc<Mutex<VecDeque<(StatusCode, Value)>>>,
}

impl TelegramMock {
    pub fn respond(self, status: StatusCode, body: Value) -> Self {
        self.script.lock().unwrap().push_back((status, body));
        self
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    pub async fn start(&self) -> String {
        let app = Router::new()
            .route(&format!("/bot{BOT_TOKEN}/sendMessage"), post(send_message))
            .with_state(self.clone());
        serve(app).await
    }
}

async fn send_message(State(mock): State<TelegramMock>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    mock.received.lock().unwrap().push(body);
    let next = mock.script.lock().unwrap().pop_front();
    let (status, body) = next.unwrap_or((StatusCode::OK, json!({ "ok": true, "result": {} })));
    (status, Json(body))
}

/// Read a CSV written by the sheet sink: header plus data rows.
pub fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut r = csv::ReaderBuilder::new().has_headers(true).from_path(path).unwrap();
    let header = r.headers().unwrap().iter().map(str::to_string).collect();
    let rows = r
        .records()
        .map(|rec| rec.unwrap().iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}
