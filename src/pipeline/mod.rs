// src/pipeline/mod.rs
//! Pipeline driver: fetch → detail → normalize → gate → summarize → item sinks,
//! then an optional digest to digest sinks. Items run one after another; a
//! failing item is recorded and the run moves on.

pub mod call_summary;
pub mod earnings;
pub mod market;
pub mod monitor;
pub mod news;
pub mod prelim;
pub mod registry;

use chrono::Local;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use crate::deliver::{Message, Sink};
use crate::error::{PipelineError, SummarizationError};
use crate::fetch::SourceFetcher;
use crate::normalize::Normalizer;
use crate::record::{Record, Summary, Template};
use crate::summarize::Summarizer;

pub use registry::{PipelineKind, RunRequest};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_items_fetched_total", "Raw items returned by list fetches.");
        describe_counter!(
            "pipeline_items_failed_total",
            "Items that failed, labelled by stage."
        );
        describe_counter!(
            "pipeline_items_delivered_total",
            "Items delivered to every item sink."
        );
        describe_counter!(
            "pipeline_items_skipped_total",
            "Items dropped by an admission gate."
        );
        describe_histogram!("pipeline_run_ms", "Pipeline run time in milliseconds.");
        describe_gauge!("pipeline_last_run_ts", "Unix ts when a pipeline last finished.");
        describe_counter!(
            "monitor_ticks_total",
            "Monitor ticks inside active hours that ran the prelim pipeline."
        );
    });
}

/// Admission check between normalize and summarize (dedup, press filter,
/// already-sent filings).
pub trait Gate: Send + Sync {
    /// `false` skips the record; it is counted, not failed.
    fn admit(&mut self, record: &Record) -> bool;

    /// Called once the record reached every item sink.
    fn commit(&mut self, _record: &Record) -> std::io::Result<()> {
        Ok(())
    }
}

/// A record that made it through the item stages.
#[derive(Debug, Clone)]
pub struct Processed {
    pub record: Record,
    pub summary: Option<Summary>,
}

/// Turns records into messages. Digests default to none.
pub trait Formatter: Send + Sync {
    fn item(&self, record: &Record, summary: Option<&Summary>) -> Message;

    /// Text for the digest-level summary; `None` skips it.
    fn digest_input(&self, _items: &[Processed]) -> Option<String> {
        None
    }

    fn digest(&self, _items: &[Processed], _summary: Option<&Summary>) -> Vec<Message> {
        Vec::new()
    }
}

#[derive(Clone)]
pub struct SummaryStage {
    pub summarizer: Arc<dyn Summarizer>,
    pub template: Template,
}

impl SummaryStage {
    pub fn new(summarizer: Arc<dyn Summarizer>, template: Template) -> Self {
        Self { summarizer, template }
    }

    async fn run(&self, input: &str) -> Result<Summary, SummarizationError> {
        let text = self.summarizer.summarize(input, self.template).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SummarizationError::EmptyOutput);
        }
        Ok(Summary {
            template: self.template,
            text: text.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    /// Position in the fetched list; `None` for digest failures.
    pub index: Option<usize>,
    pub label: String,
    pub stage: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub pipeline: &'static str,
    pub started_at: String,
    pub elapsed_ms: u64,
    pub fetched: usize,
    pub normalized: usize,
    pub skipped: usize,
    pub delivered: usize,
    pub summaries: usize,
    pub digests_sent: usize,
    pub failures: Vec<Failure>,
    pub outputs: BTreeSet<String>,
    pub items: Vec<ItemOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest_summary: Option<String>,
}

impl RunReport {
    pub fn new(pipeline: &'static str) -> Self {
        Self {
            pipeline,
            started_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            elapsed_ms: 0,
            fetched: 0,
            normalized: 0,
            skipped: 0,
            delivered: 0,
            summaries: 0,
            digests_sent: 0,
            failures: Vec::new(),
            outputs: BTreeSet::new(),
            items: Vec::new(),
            digest_summary: None,
        }
    }

    fn fail(&mut self, index: Option<usize>, label: String, err: PipelineError) {
        let stage = err.stage();
        tracing::warn!(pipeline = self.pipeline, stage, item = %label, error = ?err, "item failed");
        counter!("pipeline_items_failed_total", "pipeline" => self.pipeline, "stage" => stage).increment(1);
        self.failures.push(Failure {
            index,
            label,
            stage,
            error: err.to_string(),
        });
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

pub struct Pipeline<F, N>
where
    F: SourceFetcher,
    N: Normalizer<Item = F::Item>,
{
    name: &'static str,
    fetcher: F,
    normalizer: N,
    formatter: Box<dyn Formatter>,
    gate: Option<Box<dyn Gate>>,
    item_summary: Option<SummaryStage>,
    digest_summary: Option<SummaryStage>,
    item_sinks: Vec<Box<dyn Sink>>,
    digest_sinks: Vec<Box<dyn Sink>>,
}

impl<F, N> Pipeline<F, N>
where
    F: SourceFetcher,
    N: Normalizer<Item = F::Item>,
{
    pub fn new(name: &'static str, fetcher: F, normalizer: N, formatter: impl Formatter + 'static) -> Self {
        Self {
            name,
            fetcher,
            normalizer,
            formatter: Box::new(formatter),
            gate: None,
            item_summary: None,
            digest_summary: None,
            item_sinks: Vec::new(),
            digest_sinks: Vec::new(),
        }
    }

    pub fn gate(mut self, gate: impl Gate + 'static) -> Self {
        self.gate = Some(Box::new(gate));
        self
    }

    pub fn summarize_items(mut self, stage: Option<SummaryStage>) -> Self {
        self.item_summary = stage;
        self
    }

    pub fn summarize_digest(mut self, stage: Option<SummaryStage>) -> Self {
        self.digest_summary = stage;
        self
    }

    pub fn item_sink(mut self, sink: impl Sink + 'static) -> Self {
        self.item_sinks.push(Box::new(sink));
        self
    }

    pub fn digest_sink(mut self, sink: impl Sink + 'static) -> Self {
        self.digest_sinks.push(Box::new(sink));
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run once. Only a failed list fetch is an `Err`; everything after that
    /// lands in the report.
    pub async fn run(&mut self, query: &F::Query) -> Result<RunReport, PipelineError> {
        ensure_metrics_described();
        let started = Instant::now();
        let mut report = RunReport::new(self.name);

        let items = match self.fetcher.fetch(query).await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(pipeline = self.name, source = self.fetcher.name(), error = ?e, "list fetch failed");
                counter!("pipeline_items_failed_total", "pipeline" => self.name, "stage" => "fetch").increment(1);
                return Err(e.into());
            }
        };
        report.fetched = items.len();
        counter!("pipeline_items_fetched_total", "pipeline" => self.name).increment(items.len() as u64);
        tracing::info!(pipeline = self.name, fetched = items.len(), "list fetched");

        let mut processed = Vec::new();
        for (index, raw) in items.into_iter().enumerate() {
            let label = self.normalizer.label(&raw);
            match self.process(raw, &mut report).await {
                Ok(Some(p)) => processed.push(p),
                Ok(None) => {
                    report.skipped += 1;
                    counter!("pipeline_items_skipped_total", "pipeline" => self.name).increment(1);
                    tracing::debug!(pipeline = self.name, item = %label, "skipped by gate");
                }
                Err(e) => report.fail(Some(index), label, e),
            }
        }

        report.items = processed
            .iter()
            .map(|p| ItemOutcome {
                title: p.record.title().to_string(),
                url: p.record.url().map(str::to_string),
                summary: p.summary.as_ref().map(|s| s.text.clone()),
            })
            .collect();

        if !processed.is_empty() && !self.digest_sinks.is_empty() {
            self.deliver_digest(&processed, &mut report).await;
        }

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        histogram!("pipeline_run_ms", "pipeline" => self.name).record(report.elapsed_ms as f64);
        gauge!("pipeline_last_run_ts", "pipeline" => self.name).set(chrono::Utc::now().timestamp() as f64);
        tracing::info!(
            pipeline = self.name,
            fetched = report.fetched,
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failed(),
            elapsed_ms = report.elapsed_ms,
            "run finished"
        );
        Ok(report)
    }

    async fn process(&mut self, raw: F::Item, report: &mut RunReport) -> Result<Option<Processed>, PipelineError> {
        let item = self.fetcher.fetch_detail(raw).await?;
        let record = self.normalizer.normalize(&item)?;
        report.normalized += 1;

        if let Some(gate) = self.gate.as_mut() {
            if !gate.admit(&record) {
                return Ok(None);
            }
        }

        let summary = match &self.item_summary {
            Some(stage) => {
                let s = stage.run(&record.summary_input()).await?;
                report.summaries += 1;
                Some(s)
            }
            None => None,
        };

        if !self.item_sinks.is_empty() {
            let msg = self.formatter.item(&record, summary.as_ref());
            for sink in &self.item_sinks {
                sink.deliver(&msg).await?;
                report.outputs.insert(sink.target());
            }
            report.delivered += 1;
            counter!("pipeline_items_delivered_total", "pipeline" => self.name).increment(1);
        }

        if let Some(gate) = self.gate.as_mut() {
            if let Err(e) = gate.commit(&record) {
                tracing::warn!(pipeline = self.name, error = ?e, "gate commit failed");
            }
        }
        Ok(Some(Processed { record, summary }))
    }

    async fn deliver_digest(&self, processed: &[Processed], report: &mut RunReport) {
        let summary = match (&self.digest_summary, self.formatter.digest_input(processed)) {
            (Some(stage), Some(input)) => match stage.run(&input).await {
                Ok(s) => {
                    report.summaries += 1;
                    report.digest_summary = Some(s.text.clone());
                    Some(s)
                }
                Err(e) => {
                    report.fail(None, "digest".to_string(), e.into());
                    None
                }
            },
            _ => None,
        };

        for msg in self.formatter.digest(processed, summary.as_ref()) {
            for sink in &self.digest_sinks {
                match sink.deliver(&msg).await {
                    Ok(()) => {
                        report.digests_sent += 1;
                        report.outputs.insert(sink.target());
                    }
                    Err(e) => report.fail(None, format!("digest via {}", sink.name()), e.into()),
                }
            }
        }
    }
}
