// src/error.rs
//! Error taxonomy shared by every pipeline stage.
//!
//! Each stage owns one error type. The driver wraps them in [`PipelineError`]
//! so a run report can say which stage an item died in.

use std::path::PathBuf;
use thiserror::Error;

/// Source Fetcher failures.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("missing credential {0}")]
    MissingCredential(&'static str),

    #[error("request to {source_name} timed out")]
    Timeout { source_name: &'static str },

    #[error("request to {source_name} failed: {source}")]
    Network {
        source_name: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{source_name} answered HTTP {status}")]
    Status { source_name: &'static str, status: u16 },

    #[error("{source_name} rate limited the request")]
    RateLimited { source_name: &'static str },

    #[error("malformed response from {source_name}: {detail}")]
    Malformed {
        source_name: &'static str,
        detail: String,
    },

    #[error("unsupported input: {0}")]
    Unsupported(String),

    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Classify a reqwest error: timeouts are reported separately from other
    /// transport failures.
    pub fn from_reqwest(source_name: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout { source_name }
        } else {
            FetchError::Network { source_name, source: err }
        }
    }

    /// Map a non-success status; 429 is its own variant.
    pub fn from_status(source_name: &'static str, status: reqwest::StatusCode) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            FetchError::RateLimited { source_name }
        } else {
            FetchError::Status {
                source_name,
                status: status.as_u16(),
            }
        }
    }

    pub fn malformed(source_name: &'static str, detail: impl Into<String>) -> Self {
        FetchError::Malformed {
            source_name,
            detail: detail.into(),
        }
    }
}

/// Normalizer failures. A raw item either becomes a full record or one of these.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field `{field}` in {item}")]
    MissingField { field: &'static str, item: String },

    #[error("invalid `{field}` value {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("no earnings table found in {0}")]
    NoEarningsTable(String),
}

impl ValidationError {
    pub fn missing(field: &'static str, item: impl Into<String>) -> Self {
        ValidationError::MissingField {
            field,
            item: item.into(),
        }
    }

    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        ValidationError::InvalidField {
            field,
            value: value.into(),
        }
    }
}

/// Summarizer failures.
#[derive(Debug, Error)]
pub enum SummarizationError {
    #[error("missing credential {0}")]
    MissingCredential(&'static str),

    #[error("model endpoint quota exhausted or rate limited")]
    Quota,

    #[error("model endpoint timed out")]
    Timeout,

    #[error("model request failed: {0}")]
    Network(#[source] reqwest::Error),

    #[error("model endpoint answered HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed model output: {0}")]
    Malformed(String),

    #[error("model returned an empty summary")]
    EmptyOutput,

    #[error("summarization is disabled")]
    Disabled,
}

impl From<reqwest::Error> for SummarizationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SummarizationError::Timeout
        } else {
            SummarizationError::Network(err)
        }
    }
}

/// Delivery Sink failures.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("missing credential {0}")]
    MissingCredential(&'static str),

    #[error("{sink} request failed: {source}")]
    Network {
        sink: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{sink} rejected the message: {description}")]
    Rejected {
        sink: &'static str,
        description: String,
    },

    #[error("writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("writing spreadsheet {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("message has no spreadsheet row")]
    MissingRow,

    #[error("{path} has columns {existing:?}, row has {row:?}")]
    HeaderMismatch {
        path: PathBuf,
        existing: Vec<String>,
        row: Vec<String>,
    },

    #[error("message has no file name for a directory target")]
    MissingFileName,
}

/// Stage-tagged failure of one item (or of the whole run when the list fetch fails).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch: {0}")]
    Fetch(#[from] FetchError),

    #[error("normalize: {0}")]
    Validation(#[from] ValidationError),

    #[error("summarize: {0}")]
    Summarization(#[from] SummarizationError),

    #[error("deliver: {0}")]
    Delivery(#[from] DeliveryError),
}

impl PipelineError {
    /// Stage name used in logs, metrics labels and run reports.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Fetch(_) => "fetch",
            PipelineError::Validation(_) => "normalize",
            PipelineError::Summarization(_) => "summarize",
            PipelineError::Delivery(_) => "deliver",
        }
    }
}
