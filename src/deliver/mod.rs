// src/deliver/mod.rs
//! Delivery sinks. Each `deliver` call is one external side effect with no
//! idempotency: delivering the same message twice yields two entries.

pub mod document;
pub mod sheet;
pub mod telegram;

use crate::error::DeliveryError;
use crate::record::Row;

pub use document::DocumentSink;
pub use sheet::CsvSink;
pub use telegram::TelegramSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Plain,
    Html,
    Markdown,
}

/// What a sink receives. Text sinks use `subject`/`body`; the spreadsheet sink
/// uses `row`; directory-backed document sinks use `file_name`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub subject: String,
    pub body: String,
    pub format: Format,
    pub row: Option<Row>,
    pub file_name: Option<String>,
}

impl Message {
    pub fn new(subject: impl Into<String>, body: impl Into<String>, format: Format) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            format,
            ..Default::default()
        }
    }

    pub fn plain(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(subject, body, Format::Plain)
    }

    pub fn with_row(mut self, row: Row) -> Self {
        self.row = Some(row);
        self
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }
}

#[async_trait::async_trait]
pub trait Sink: Send + Sync {
    fn name(&self) -> &'static str;

    /// Where deliveries land (file path, chat), for the run report.
    fn target(&self) -> String;

    async fn deliver(&self, msg: &Message) -> Result<(), DeliveryError>;
}
