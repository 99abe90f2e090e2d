// src/pipeline/news.rs
//! Keyword news search → CSV, with a per-keyword Telegram digest.

use chrono::{Local, NaiveDate};
use serde::Deserialize;
use std::collections::HashSet;

use super::{Formatter, Gate, Pipeline, Processed, RunReport, SummaryStage};
use crate::config::AppConfig;
use crate::deliver::{CsvSink, Format, Message, TelegramSink};
use crate::error::{PipelineError, ValidationError};
use crate::fetch::naver::{NaverNewsFetcher, NewsQuery};
use crate::normalize::news::NewsNormalizer;
use crate::normalize::parse_date;
use crate::record::{Record, Summary, Template};
use crate::summarize::build_summarizer;
use crate::text::title_key;

pub const NAME: &str = "news";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewsOptions {
    pub keywords: Option<Vec<String>>,
    pub max_results: Option<u32>,
    pub press_filter: Option<Vec<String>>,
    /// `YYYYMMDD`; names the output file. Defaults to today.
    pub date: Option<String>,
    pub telegram: bool,
    pub summarize: bool,
}

/// Selecting every outlet in the press filter.
pub const ALL_PRESS: &str = "전체";

/// Press whitelist (empty or containing [`ALL_PRESS`] = all) plus
/// duplicate-title removal.
#[derive(Debug, Default)]
pub struct NewsGate {
    press_filter: Vec<String>,
    seen: HashSet<String>,
}

impl NewsGate {
    pub fn new(mut press_filter: Vec<String>) -> Self {
        if press_filter.iter().any(|p| p.trim() == ALL_PRESS) {
            press_filter.clear();
        }
        Self {
            press_filter,
            seen: HashSet::new(),
        }
    }
}

impl Gate for NewsGate {
    fn admit(&mut self, record: &Record) -> bool {
        if !self.press_filter.is_empty() {
            let press = record.text_field("press").unwrap_or_default();
            if !self.press_filter.iter().any(|p| p == press) {
                return false;
            }
        }
        self.seen.insert(title_key(record.title()))
    }
}

pub struct NewsFormatter {
    pub max_per_message: usize,
}

impl Formatter for NewsFormatter {
    fn item(&self, record: &Record, summary: Option<&Summary>) -> Message {
        let mut row = record.to_row();
        row.push("brief", summary.map(|s| s.text.clone()).unwrap_or_default());
        Message::plain(record.title(), record.text().unwrap_or_default()).with_row(row)
    }

    fn digest(&self, items: &[Processed], _summary: Option<&Summary>) -> Vec<Message> {
        let mut keywords: Vec<&str> = Vec::new();
        for p in items {
            let kw = p.record.text_field("keyword").unwrap_or_default();
            if !keywords.contains(&kw) {
                keywords.push(kw);
            }
        }

        keywords
            .into_iter()
            .map(|kw| {
                let group: Vec<&Processed> = items
                    .iter()
                    .filter(|p| p.record.text_field("keyword").unwrap_or_default() == kw)
                    .collect();
                let mut body = format!(
                    "<b>📰 [{}] news ({})</b>\n",
                    html_escape::encode_text(kw),
                    group.len()
                );
                for p in group.iter().take(self.max_per_message) {
                    let r = &p.record;
                    body.push_str(&format!(
                        "\n• <a href='{}'>{}</a> ({})",
                        html_escape::encode_single_quoted_attribute(r.url().unwrap_or_default()),
                        html_escape::encode_text(r.title()),
                        html_escape::encode_text(r.text_field("press").unwrap_or_default()),
                    ));
                    if let Some(s) = &p.summary {
                        body.push_str(&format!("\n  {}", html_escape::encode_text(&s.text)));
                    }
                }
                Message::new("", body, Format::Html)
            })
            .collect()
    }
}

fn run_date(raw: Option<&str>) -> Result<NaiveDate, ValidationError> {
    match raw {
        Some(s) => parse_date(s).ok_or_else(|| ValidationError::invalid("date", s)),
        None => Ok(Local::now().date_naive()),
    }
}

pub async fn run(cfg: &AppConfig, opts: NewsOptions) -> Result<RunReport, PipelineError> {
    let date = run_date(opts.date.as_deref())?;
    let fetcher = NaverNewsFetcher::from_config(cfg)?;
    let csv = CsvSink::new(
        cfg.output_dir
            .join(format!("naver_news_{}.csv", date.format("%Y%m%d"))),
    );
    let press_filter = opts
        .press_filter
        .unwrap_or_else(|| cfg.news.press_filter.clone());

    let mut pipeline = Pipeline::new(
        NAME,
        fetcher,
        NewsNormalizer,
        NewsFormatter {
            max_per_message: cfg.news.max_per_message,
        },
    )
    .gate(NewsGate::new(press_filter))
    .item_sink(csv);

    if opts.summarize {
        let stage = build_summarizer(cfg)?.map(|s| SummaryStage::new(s, Template::NewsBrief));
        pipeline = pipeline.summarize_items(stage);
    }
    if opts.telegram {
        pipeline = pipeline.digest_sink(TelegramSink::from_config(cfg));
    }

    let query = NewsQuery {
        keywords: opts.keywords.unwrap_or_else(|| cfg.news.keywords.clone()),
        max_results: opts.max_results.unwrap_or(cfg.news.max_results),
    };
    pipeline.run(&query).await
}
