// src/lib.rs
//! Financial briefing pipelines: fetch market data, news and filings,
//! normalize them into records, optionally summarize with a language model,
//! and deliver to spreadsheets, documents and Telegram.

pub mod api;
pub mod cache;
pub mod config;
pub mod deliver;
pub mod error;
pub mod fetch;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod summarize;
pub mod text;

pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;
pub use crate::error::{DeliveryError, FetchError, PipelineError, SummarizationError, ValidationError};
pub use crate::pipeline::{PipelineKind, RunReport, RunRequest};
