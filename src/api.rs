// src/api.rs
//! Dashboard: pipeline list, run trigger, Prometheus metrics and the static UI.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::pipeline::registry::{PipelineInfo, RequestError};
use crate::pipeline::{PipelineKind, RunRequest};

pub const DEFAULT_UI_DIR: &str = "ui";

#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    metrics: Option<PrometheusHandle>,
    ui_dir: PathBuf,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            metrics: None,
            ui_dir: PathBuf::from(DEFAULT_UI_DIR),
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn with_ui_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ui_dir = dir.into();
        self
    }
}

pub fn router(state: AppState) -> Router {
    let ui = ServeDir::new(&state.ui_dir);
    let mut app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/pipelines", get(list_pipelines))
        .route("/api/pipelines/{name}/run", post(run_pipeline));

    if let Some(handle) = state.metrics.clone() {
        app = app.merge(crate::metrics::router(handle));
    }

    app.fallback_service(ui)
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct PipelineList {
    pipelines: Vec<PipelineInfo>,
    credentials: Vec<&'static str>,
    llm_mode: String,
}

async fn list_pipelines(State(state): State<AppState>) -> Json<PipelineList> {
    let cfg = &state.config;
    Json(PipelineList {
        pipelines: PipelineKind::ALL.iter().map(|k| k.info(cfg)).collect(),
        credentials: cfg.credentials.present(),
        llm_mode: format!("{:?}", cfg.llm.mode).to_lowercase(),
    })
}

enum ApiError {
    Request(RequestError),
    Body(serde_json::Error),
    Pipeline(PipelineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Request(e) => (StatusCode::BAD_REQUEST, json!({ "error": e.to_string() })),
            ApiError::Body(e) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": format!("request body is not JSON: {e}") }),
            ),
            ApiError::Pipeline(e) => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": e.to_string(), "stage": e.stage() }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

async fn run_pipeline(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let options: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&body).map_err(ApiError::Body)?
    };
    let request = RunRequest::from_json(&name, options).map_err(ApiError::Request)?;
    let report = request
        .execute(&state.config)
        .await
        .map_err(ApiError::Pipeline)?;
    Ok(Json(report).into_response())
}
