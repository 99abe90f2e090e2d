// src/pipeline/registry.rs
//! Named pipelines and their JSON options, shared by the CLI and the dashboard.

use serde::Serialize;
use serde_json::Value as Json;
use thiserror::Error;

use super::call_summary::{self, CallSummaryOptions};
use super::earnings::{self, EarningsOptions};
use super::market::{self, MarketOptions};
use super::news::{self, NewsOptions};
use super::prelim::{self, PrelimOptions};
use super::RunReport;
use crate::cache;
use crate::config::{AppConfig, LlmMode};
use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    News,
    Prelim,
    Earnings,
    Market,
    CallSummary,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 5] = [
        PipelineKind::News,
        PipelineKind::Prelim,
        PipelineKind::Earnings,
        PipelineKind::Market,
        PipelineKind::CallSummary,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PipelineKind::News => news::NAME,
            PipelineKind::Prelim => prelim::NAME,
            PipelineKind::Earnings => earnings::NAME,
            PipelineKind::Market => market::NAME,
            PipelineKind::CallSummary => call_summary::NAME,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    pub fn description(&self) -> &'static str {
        match self {
            PipelineKind::News => "Keyword news search to CSV, with a per-keyword Telegram digest",
            PipelineKind::Prelim => "Preliminary earnings filings of a day to CSV and Telegram",
            PipelineKind::Earnings => "Global earnings tracker by sector with upcoming report dates",
            PipelineKind::Market => "Overnight US market summary: indices, sectors, indicators",
            PipelineKind::CallSummary => "Earnings-call transcript to a structured summary document",
        }
    }

    /// Services whose credentials the pipeline needs. Prelim exists to alert
    /// by Telegram (the monitor always sends), so the bot counts as required.
    pub fn required_services(&self, cfg: &AppConfig) -> Vec<&'static str> {
        match self {
            PipelineKind::News => vec!["naver"],
            PipelineKind::Prelim => vec!["telegram"],
            PipelineKind::CallSummary if cfg.llm.mode == LlmMode::Openai => vec!["openai"],
            _ => Vec::new(),
        }
    }

    /// Services needed only when an option turns them on (`telegram`).
    pub fn optional_services(&self) -> Vec<&'static str> {
        match self {
            PipelineKind::Prelim => Vec::new(),
            _ => vec!["telegram"],
        }
    }

    pub fn info(&self, cfg: &AppConfig) -> PipelineInfo {
        let present = cfg.credentials.present();
        let absent = |services: &[&'static str]| -> Vec<&'static str> {
            services.iter().copied().filter(|s| !present.contains(s)).collect()
        };
        let required = self.required_services(cfg);
        let optional = self.optional_services();
        let missing = absent(&required);
        let missing_optional = absent(&optional);
        PipelineInfo {
            name: self.name(),
            description: self.description(),
            ready: missing.is_empty(),
            required,
            missing,
            optional,
            missing_optional,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub required: Vec<&'static str>,
    pub missing: Vec<&'static str>,
    /// Services used only when enabled per run; missing ones do not affect `ready`.
    pub optional: Vec<&'static str>,
    pub missing_optional: Vec<&'static str>,
    pub ready: bool,
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("unknown pipeline `{0}`")]
    UnknownPipeline(String),

    #[error("invalid options for {pipeline}: {source}")]
    BadOptions {
        pipeline: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// One pipeline invocation with its options.
#[derive(Debug, Clone)]
pub enum RunRequest {
    News(NewsOptions),
    Prelim(PrelimOptions),
    Earnings(EarningsOptions),
    Market(MarketOptions),
    CallSummary(CallSummaryOptions),
}

fn options<T: serde::de::DeserializeOwned>(pipeline: &'static str, value: Json) -> Result<T, RequestError> {
    let value = if value.is_null() {
        Json::Object(Default::default())
    } else {
        value
    };
    serde_json::from_value(value).map_err(|source| RequestError::BadOptions { pipeline, source })
}

impl RunRequest {
    pub fn from_json(name: &str, value: Json) -> Result<Self, RequestError> {
        let kind = PipelineKind::from_name(name).ok_or_else(|| RequestError::UnknownPipeline(name.to_string()))?;
        let n = kind.name();
        Ok(match kind {
            PipelineKind::News => RunRequest::News(options(n, value)?),
            PipelineKind::Prelim => RunRequest::Prelim(options(n, value)?),
            PipelineKind::Earnings => RunRequest::Earnings(options(n, value)?),
            PipelineKind::Market => RunRequest::Market(options(n, value)?),
            PipelineKind::CallSummary => RunRequest::CallSummary(options(n, value)?),
        })
    }

    pub fn kind(&self) -> PipelineKind {
        match self {
            RunRequest::News(_) => PipelineKind::News,
            RunRequest::Prelim(_) => PipelineKind::Prelim,
            RunRequest::Earnings(_) => PipelineKind::Earnings,
            RunRequest::Market(_) => PipelineKind::Market,
            RunRequest::CallSummary(_) => PipelineKind::CallSummary,
        }
    }

    /// Sweep the cache directory, then run.
    pub async fn execute(self, cfg: &AppConfig) -> Result<RunReport, PipelineError> {
        if let Err(e) = cache::sweep(&cfg.cache.dir, cfg.cache.retention_days) {
            tracing::warn!(dir = %cfg.cache.dir.display(), error = ?e, "cache sweep failed");
        }
        tracing::info!(pipeline = self.kind().name(), "run requested");
        match self {
            RunRequest::News(o) => news::run(cfg, o).await,
            RunRequest::Prelim(o) => prelim::run(cfg, o).await,
            RunRequest::Earnings(o) => earnings::run(cfg, o).await,
            RunRequest::Market(o) => market::run(cfg, o).await,
            RunRequest::CallSummary(o) => call_summary::run(cfg, o).await,
        }
    }
}
