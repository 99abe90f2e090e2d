// src/pipeline/call_summary.rs
//! Earnings-call transcript → structured summary document, optionally posted
//! to Telegram.

use chrono::{Local, NaiveDate};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

use super::{Formatter, Pipeline, Processed, RunReport, SummaryStage};
use crate::config::AppConfig;
use crate::deliver::{DocumentSink, Format, Message, TelegramSink};
use crate::error::{FetchError, PipelineError};
use crate::fetch::transcript::{TranscriptFetcher, TranscriptSource};
use crate::normalize::transcript::TranscriptNormalizer;
use crate::record::{Record, Summary, Template};
use crate::summarize::{build_summarizer, DisabledSummarizer, Summarizer};
use crate::text::file_stem;

pub const NAME: &str = "call-summary";

/// Above this the chat copy drops the Q&A section.
pub const CHAT_SUMMARY_LIMIT: usize = 3500;
const QA_MARKER: &str = "Q&A";
const QA_POINTER: &str = "(Q&A: see the saved file)";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CallSummaryOptions {
    /// `.txt` or `.docx` transcript.
    pub file: Option<PathBuf>,
    /// Inline transcript text, used when no file is given.
    pub text: Option<String>,
    pub telegram: bool,
}

impl CallSummaryOptions {
    pub fn source(&self) -> Result<TranscriptSource, FetchError> {
        match (&self.file, &self.text) {
            (Some(path), _) => Ok(TranscriptSource::File(path.clone())),
            (None, Some(text)) => Ok(TranscriptSource::Inline {
                origin: "inline".to_string(),
                text: text.clone(),
            }),
            (None, None) => Err(FetchError::Unsupported(
                "no transcript: pass a file or inline text".to_string(),
            )),
        }
    }
}

pub fn document_name(record: &Record) -> String {
    format!(
        "{}_{}_{}_call_summary.txt",
        file_stem(record.text_field("company").unwrap_or("Company")),
        record.timestamp().format("%Y%m%d"),
        file_stem(record.text_field("quarter").unwrap_or("Quarter")),
    )
}

/// Chat copy: header plus the summary, cut before Q&A when too long.
pub fn chat_text(record: &Record, summary: &str) -> String {
    let header = format!(
        "📊 *{} {} call summary*",
        record.text_field("company").unwrap_or_default(),
        record.text_field("quarter").unwrap_or_default()
    );
    let body = if summary.chars().count() > CHAT_SUMMARY_LIMIT {
        match summary.find(QA_MARKER) {
            Some(i) => format!("{}\n\n{QA_POINTER}", summary[..i].trim_end()),
            None => summary.to_string(),
        }
    } else {
        summary.to_string()
    };
    format!("{header}\n\n{body}")
}

pub struct CallSummaryFormatter;

impl Formatter for CallSummaryFormatter {
    fn item(&self, record: &Record, summary: Option<&Summary>) -> Message {
        let body = summary.map(|s| s.text.clone()).unwrap_or_default();
        Message::plain("", body).with_file_name(document_name(record))
    }

    fn digest(&self, items: &[Processed], _summary: Option<&Summary>) -> Vec<Message> {
        items
            .iter()
            .filter_map(|p| {
                let s = p.summary.as_ref()?;
                Some(Message::new("", chat_text(&p.record, &s.text), Format::Markdown))
            })
            .collect()
    }
}

pub async fn run(cfg: &AppConfig, opts: CallSummaryOptions) -> Result<RunReport, PipelineError> {
    run_on(cfg, opts, Local::now().date_naive()).await
}

pub async fn run_on(cfg: &AppConfig, opts: CallSummaryOptions, date: NaiveDate) -> Result<RunReport, PipelineError> {
    let source = opts.source()?;
    let summarizer: Arc<dyn Summarizer> = build_summarizer(cfg)?.unwrap_or_else(|| Arc::new(DisabledSummarizer));

    let mut pipeline = Pipeline::new(NAME, TranscriptFetcher, TranscriptNormalizer::new(date), CallSummaryFormatter)
        .summarize_items(Some(SummaryStage::new(summarizer, Template::EarningsCall)))
        .item_sink(DocumentSink::dir(cfg.output_dir.clone()));
    if opts.telegram {
        pipeline = pipeline.digest_sink(TelegramSink::from_config(cfg));
    }
    pipeline.run(&source).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SourceId;

    fn rec() -> Record {
        let ts = NaiveDate::from_ymd_opt(2026, 2, 10)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Record::builder(SourceId::Transcript, ts, "넷마블 4Q25")
            .field("company", "넷마블")
            .field("quarter", "4Q25")
            .build()
    }

    #[test]
    fn document_name_layout() {
        assert_eq!(document_name(&rec()), "넷마블_20260210_4Q25_call_summary.txt");
    }

    #[test]
    fn short_summary_goes_out_whole() {
        let text = chat_text(&rec(), "1. Annual results\n- up\n\n9. Q&A\n- Q: a");
        assert!(text.starts_with("📊 *넷마블 4Q25 call summary*\n\n1. Annual results"));
        assert!(text.contains("Q: a"));
    }

    #[test]
    fn long_summary_is_cut_at_qa() {
        let summary = format!("1. Annual results\n{}\n\n9. Q&A\n- Q: long", "- x\n".repeat(1000));
        let text = chat_text(&rec(), &summary);
        assert!(text.ends_with("\n\n(Q&A: see the saved file)"));
        assert!(!text.contains("Q: long"));
    }

    #[test]
    fn a_transcript_source_is_required() {
        assert!(CallSummaryOptions::default().source().is_err());
        let inline = CallSummaryOptions {
            text: Some("ACME 4Q25".into()),
            ..Default::default()
        };
        assert!(matches!(inline.source(), Ok(TranscriptSource::Inline { .. })));
    }
}
