// src/pipeline/market.rs
//! Overnight US market summary: indices, sector ETFs and key indicators.

use chrono::{Local, NaiveDate};
use serde::Deserialize;

use super::{Formatter, Pipeline, Processed, RunReport, SummaryStage};
use crate::config::AppConfig;
use crate::deliver::{CsvSink, DocumentSink, Message, TelegramSink};
use crate::error::PipelineError;
use crate::fetch::yahoo::{QuoteGroup, QuoteSpec, YahooChartFetcher};
use crate::normalize::quote::QuoteNormalizer;
use crate::record::{Record, Summary, Template};
use crate::summarize::build_summarizer;

pub const NAME: &str = "market";

const INDICES: &[(&str, &str)] = &[
    ("^DJI", "Dow Jones"),
    ("^GSPC", "S&P 500"),
    ("^IXIC", "Nasdaq"),
    ("^RUT", "Russell 2000"),
    ("^SOX", "Philadelphia Semiconductor"),
    ("^NBI", "Nasdaq Biotech"),
    ("^VIX", "VIX"),
];

const SECTORS: &[(&str, &str)] = &[
    ("XLK", "Technology"),
    ("XLF", "Financials"),
    ("XLV", "Health Care"),
    ("XLY", "Consumer Discretionary"),
    ("XLP", "Consumer Staples"),
    ("XLE", "Energy"),
    ("XLI", "Industrials"),
    ("XLB", "Materials"),
    ("XLU", "Utilities"),
    ("XLRE", "Real Estate"),
    ("XLC", "Communication Services"),
];

const INDICATORS: &[(&str, &str)] = &[
    ("CL=F", "WTI Crude"),
    ("GC=F", "Gold"),
    ("SI=F", "Silver"),
    ("EURUSD=X", "EUR/USD"),
    ("^TNX", "US 10Y Yield"),
    ("DX-Y.NYB", "Dollar Index"),
    ("KRW=X", "USD/KRW"),
    ("BTC-USD", "Bitcoin"),
];

const VIX: &str = "^VIX";
const USD_KRW: &str = "KRW=X";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MarketOptions {
    pub telegram: bool,
    pub summarize: bool,
}

pub fn default_quotes() -> Vec<QuoteSpec> {
    let table = |rows: &[(&str, &str)], group: QuoteGroup| {
        rows.iter()
            .map(move |(ticker, name)| QuoteSpec {
                ticker: ticker.to_string(),
                name: name.to_string(),
                group,
            })
            .collect::<Vec<_>>()
    };
    let mut out = table(INDICES, QuoteGroup::Index);
    out.extend(table(SECTORS, QuoteGroup::Sector));
    out.extend(table(INDICATORS, QuoteGroup::Indicator));
    out
}

fn in_group<'a>(items: &'a [Processed], group: QuoteGroup) -> impl Iterator<Item = &'a Record> {
    items
        .iter()
        .map(|p| &p.record)
        .filter(move |r| r.text_field("group") == Some(group.as_str()))
}

fn pct(r: &Record) -> f64 {
    r.number("pct").unwrap_or(0.0)
}

fn ticker(r: &Record) -> &str {
    r.text_field("ticker").unwrap_or_default()
}

fn last(r: &Record) -> f64 {
    r.number("last").unwrap_or(0.0)
}

fn best<'a>(rs: &[&'a Record]) -> Option<&'a Record> {
    rs.iter().copied().max_by(|a, b| pct(a).total_cmp(&pct(b)))
}

fn worst<'a>(rs: &[&'a Record]) -> Option<&'a Record> {
    rs.iter().copied().min_by(|a, b| pct(a).total_cmp(&pct(b)))
}

/// Rule-based narrative over whatever quotes made it through.
pub fn narrative(items: &[Processed]) -> Vec<String> {
    let mut out = Vec::new();

    let indices: Vec<&Record> = in_group(items, QuoteGroup::Index)
        .filter(|r| ticker(r) != VIX)
        .collect();
    match best(&indices) {
        Some(b) if pct(b) > 0.0 => out.push(format!(
            "{} led the indices, {:+.2}% to {:.2}.",
            b.title(),
            pct(b),
            last(b)
        )),
        _ => {
            if let Some(w) = worst(&indices) {
                out.push(format!(
                    "Every index closed lower; {} fell the most, {:+.2}% to {:.2}.",
                    w.title(),
                    pct(w),
                    last(w)
                ));
            }
        }
    }

    if let Some(v) = in_group(items, QuoteGroup::Index).find(|r| ticker(r) == VIX) {
        let mood = if pct(v) > 0.0 { "rose" } else { "eased" };
        out.push(format!("VIX {mood} to {:.2} ({:+.2}%).", last(v), pct(v)));
    }

    let sectors: Vec<&Record> = in_group(items, QuoteGroup::Sector).collect();
    if let (Some(b), Some(w)) = (best(&sectors), worst(&sectors)) {
        out.push(format!(
            "Best sector: {} ({:+.2}%), worst: {} ({:+.2}%).",
            b.title(),
            pct(b),
            w.title(),
            pct(w)
        ));
    }

    let mut indicators: Vec<&Record> = in_group(items, QuoteGroup::Indicator).collect();
    indicators.sort_by(|a, b| pct(b).abs().total_cmp(&pct(a).abs()));
    let movers: Vec<String> = indicators
        .iter()
        .take(2)
        .map(|r| format!("{} {:+.2}%", r.title(), pct(r)))
        .collect();
    if !movers.is_empty() {
        out.push(format!("Biggest indicator moves: {}.", movers.join(", ")));
    }

    if let Some(k) = indicators.iter().find(|r| ticker(r) == USD_KRW) {
        let won = if pct(k) > 0.0 {
            "won weaker"
        } else if pct(k) < 0.0 {
            "won stronger"
        } else {
            "unchanged"
        };
        out.push(format!("USD/KRW {:.2} ({:+.2}%, {won}).", last(k), pct(k)));
    }
    out
}

/// Quote tables as plain text, also the model's input.
pub fn tables(items: &[Processed]) -> String {
    let mut out = String::new();
    for (group, heading) in [
        (QuoteGroup::Index, "[Indices]"),
        (QuoteGroup::Sector, "[Sectors]"),
        (QuoteGroup::Indicator, "[Indicators]"),
    ] {
        let rows: Vec<String> = in_group(items, group)
            .map(|r| format!("{}: {:.2} ({:+.2}%)", r.title(), last(r), pct(r)))
            .collect();
        if rows.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(heading);
        out.push('\n');
        out.push_str(&rows.join("\n"));
        out.push('\n');
    }
    out
}

pub struct MarketFormatter {
    pub as_of: NaiveDate,
}

impl Formatter for MarketFormatter {
    fn item(&self, record: &Record, _summary: Option<&Summary>) -> Message {
        Message::plain(record.title(), "").with_row(record.to_row())
    }

    fn digest_input(&self, items: &[Processed]) -> Option<String> {
        Some(tables(items))
    }

    fn digest(&self, items: &[Processed], summary: Option<&Summary>) -> Vec<Message> {
        let mut body = narrative(items).join("\n");
        if let Some(s) = summary {
            body.push_str("\n\n[Overview]\n");
            body.push_str(&s.text);
        }
        body.push_str("\n\n");
        body.push_str(&tables(items));
        vec![Message::plain(
            format!("🌎 Global market summary {}", self.as_of.format("%Y-%m-%d")),
            body,
        )]
    }
}

pub async fn run(cfg: &AppConfig, opts: MarketOptions) -> Result<RunReport, PipelineError> {
    let as_of = Local::now().date_naive();
    let ymd = as_of.format("%Y%m%d");
    let fetcher = YahooChartFetcher::from_config(cfg)?;

    let mut pipeline = Pipeline::new(NAME, fetcher, QuoteNormalizer::new(as_of), MarketFormatter { as_of })
        .item_sink(CsvSink::new(
            cfg.output_dir.join(format!("global_market_summary_{ymd}.csv")),
        ))
        .digest_sink(DocumentSink::file(
            cfg.output_dir.join(format!("global_market_summary_{ymd}.txt")),
        ));
    if opts.summarize {
        let stage = build_summarizer(cfg)?.map(|s| SummaryStage::new(s, Template::MarketOverview));
        pipeline = pipeline.summarize_digest(stage);
    }
    if opts.telegram {
        pipeline = pipeline.digest_sink(TelegramSink::from_config(cfg));
    }
    pipeline.run(&default_quotes()).await
}
