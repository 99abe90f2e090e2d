// src/pipeline/earnings.rs
//! Global earnings tracker: sector groups of tickers → CSV, plus a digest of
//! the nearest upcoming reports.

use chrono::{Local, NaiveDate};
use serde::Deserialize;

use super::{Formatter, Pipeline, Processed, RunReport};
use crate::config::{AppConfig, TickerGroup};
use crate::deliver::{CsvSink, DocumentSink, Message, TelegramSink};
use crate::error::PipelineError;
use crate::fetch::yahoo::{EarningsQuery, YahooEarningsFetcher};
use crate::normalize::earnings::EarningsNormalizer;
use crate::normalize::parse_date;
use crate::record::{Record, Summary};

pub const NAME: &str = "earnings";
pub const CUSTOM_GROUP: &str = "Custom";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EarningsOptions {
    /// Restrict to these group names.
    pub groups: Option<Vec<String>>,
    /// Ad hoc tickers, tracked under the `Custom` group instead of the configured ones.
    pub tickers: Option<Vec<String>>,
    pub no_cache: bool,
    pub telegram: bool,
    pub upcoming_limit: Option<usize>,
}

pub fn build_query(groups: &[TickerGroup], opts: &EarningsOptions) -> EarningsQuery {
    if let Some(tickers) = opts.tickers.as_ref().filter(|t| !t.is_empty()) {
        return EarningsQuery {
            tickers: tickers
                .iter()
                .map(|t| (CUSTOM_GROUP.to_string(), t.clone()))
                .collect(),
        };
    }
    let tickers = groups
        .iter()
        .filter(|g| {
            opts.groups
                .as_ref()
                .map_or(true, |wanted| wanted.iter().any(|w| w.eq_ignore_ascii_case(&g.name)))
        })
        .flat_map(|g| g.tickers.iter().map(move |t| (g.name.clone(), t.clone())))
        .collect();
    EarningsQuery { tickers }
}

pub struct EarningsFormatter {
    pub today: NaiveDate,
    pub limit: usize,
}

impl EarningsFormatter {
    /// Records with a next report on or after today, nearest first.
    pub fn upcoming<'a>(&self, items: &'a [Processed]) -> Vec<(NaiveDate, &'a Record)> {
        let mut out: Vec<(NaiveDate, &Record)> = items
            .iter()
            .filter_map(|p| {
                let d = p.record.text_field("next_earnings_date").and_then(parse_date)?;
                (d >= self.today).then_some((d, &p.record))
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.title().cmp(b.1.title())));
        out.truncate(self.limit);
        out
    }
}

impl Formatter for EarningsFormatter {
    fn item(&self, record: &Record, _summary: Option<&Summary>) -> Message {
        Message::plain(record.title(), "").with_row(record.to_row())
    }

    fn digest(&self, items: &[Processed], _summary: Option<&Summary>) -> Vec<Message> {
        let upcoming = self.upcoming(items);
        let subject = format!(
            "📅 Upcoming earnings ({}, as of {})",
            upcoming.len(),
            self.today.format("%Y-%m-%d")
        );
        let body = if upcoming.is_empty() {
            "No upcoming reports among tracked tickers.".to_string()
        } else {
            upcoming
                .iter()
                .map(|(d, r)| {
                    let est = r
                        .number("eps_estimate")
                        .map(|e| format!(", EPS est. {e:.2}"))
                        .unwrap_or_default();
                    format!(
                        "{} {} ({}) [{}]{}",
                        d.format("%Y-%m-%d"),
                        r.title(),
                        r.text_field("ticker").unwrap_or_default(),
                        r.text_field("sector").unwrap_or_default(),
                        est
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        vec![Message::plain(subject, body)]
    }
}

pub async fn run(cfg: &AppConfig, opts: EarningsOptions) -> Result<RunReport, PipelineError> {
    let today = Local::now().date_naive();
    let fetcher = YahooEarningsFetcher::from_config(cfg, !opts.no_cache)?;
    let query = build_query(&cfg.earnings.groups, &opts);
    let formatter = EarningsFormatter {
        today,
        limit: opts.upcoming_limit.unwrap_or(cfg.earnings.upcoming_limit),
    };

    let mut pipeline = Pipeline::new(NAME, fetcher, EarningsNormalizer, formatter)
        .item_sink(CsvSink::new(cfg.output_dir.join("global_earnings.csv")))
        .digest_sink(DocumentSink::file(cfg.output_dir.join(format!(
            "global_earnings_upcoming_{}.txt",
            today.format("%Y%m%d")
        ))));
    if opts.telegram {
        pipeline = pipeline.digest_sink(TelegramSink::from_config(cfg));
    }

    let mut report = pipeline.run(&query).await?;
    match pipeline.fetcher().persist_cache() {
        Ok(Some(path)) => {
            report.outputs.insert(path.display().to_string());
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(pipeline = NAME, error = ?e, "earnings cache not saved"),
    }
    Ok(report)
}
