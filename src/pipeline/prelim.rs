// src/pipeline/prelim.rs
//! Preliminary earnings filings of one day → CSV, optionally one Telegram
//! message per filing.

use chrono::{Local, NaiveDate};
use serde::Deserialize;

use super::{Formatter, Gate, Pipeline, RunReport};
use crate::cache::{SentLog, SENT_LOG_FILE};
use crate::config::AppConfig;
use crate::deliver::{CsvSink, Message, TelegramSink};
use crate::error::{PipelineError, ValidationError};
use crate::fetch::kind::{KindFetcher, KindQuery};
use crate::normalize::parse_date;
use crate::normalize::prelim::{PrelimNormalizer, METRICS, UNIT};
use crate::record::{Record, Summary};

pub const NAME: &str = "prelim";

/// Metrics that make it into the chat message, with their display names.
const MESSAGE_METRICS: [(&str, &str); 3] = [
    ("revenue", "Revenue"),
    ("operating_profit", "Operating profit"),
    ("net_income", "Net income"),
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrelimOptions {
    /// `YYYYMMDD`; defaults to today.
    pub date: Option<String>,
    pub telegram: bool,
    /// Leave out filings already in the sent log.
    pub only_new: bool,
}

/// Filters by the sent log and, when filings go out by chat, records them
/// there once every sink accepted them.
pub struct SentGate {
    log: SentLog,
    only_new: bool,
    record_sent: bool,
}

impl SentGate {
    pub fn new(log: SentLog, only_new: bool, record_sent: bool) -> Self {
        Self {
            log,
            only_new,
            record_sent,
        }
    }
}

impl Gate for SentGate {
    fn admit(&mut self, record: &Record) -> bool {
        let acptno = record.text_field("acptno").unwrap_or_default();
        !(self.only_new && self.log.contains(acptno))
    }

    fn commit(&mut self, record: &Record) -> std::io::Result<()> {
        if !self.record_sent {
            return Ok(());
        }
        match record.text_field("acptno") {
            Some(acptno) => self.log.insert(acptno),
            None => Ok(()),
        }
    }
}

/// `1234567.0` → `1,234,567`.
pub fn thousands(v: f64) -> String {
    let n = v.round() as i64;
    let digits = n.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if n < 0 {
        format!("-{out}")
    } else {
        out
    }
}

fn amount(r: &Record, column: &str) -> String {
    r.number(column).map(thousands).unwrap_or_else(|| "-".to_string())
}

fn change(r: &Record, pct_col: &str, turn_col: &str) -> String {
    if let Some(t) = r.text_field(turn_col).filter(|t| !t.is_empty()) {
        return t.to_string();
    }
    match r.number(pct_col) {
        Some(p) => format!("{p:+.1}%"),
        None => "-".to_string(),
    }
}

pub struct PrelimFormatter;

impl PrelimFormatter {
    pub fn body(record: &Record) -> String {
        let mut lines = vec![
            format!("(unit: {UNIT})"),
            format!(
                "[{}] {}",
                record.text_field("stock_code").unwrap_or_default(),
                record.text_field("company").unwrap_or(record.title())
            ),
        ];
        for (key, display) in MESSAGE_METRICS {
            let Some(m) = METRICS.iter().find(|m| m.key == key) else {
                continue;
            };
            let [cur, prev, qoq, qoq_t, yoy, yoy_pct, yoy_t] = m.columns;
            if record.number(cur).is_none() {
                continue;
            }
            lines.push(format!(
                "- {display}: current {}, previous {} (QoQ, {}) year-ago {} (YoY, {})",
                amount(record, cur),
                amount(record, prev),
                change(record, qoq, qoq_t),
                amount(record, yoy),
                change(record, yoy_pct, yoy_t),
            ));
        }
        if let Some(url) = record.url() {
            lines.push(url.to_string());
        }
        lines.join("\n")
    }
}

impl Formatter for PrelimFormatter {
    fn item(&self, record: &Record, _summary: Option<&Summary>) -> Message {
        Message::plain("", Self::body(record)).with_row(record.to_row())
    }
}

pub fn run_date(raw: Option<&str>) -> Result<NaiveDate, ValidationError> {
    match raw {
        Some(s) => parse_date(s).ok_or_else(|| ValidationError::invalid("date", s)),
        None => Ok(Local::now().date_naive()),
    }
}

pub async fn run(cfg: &AppConfig, opts: PrelimOptions) -> Result<RunReport, PipelineError> {
    let date = run_date(opts.date.as_deref())?;
    let fetcher = KindFetcher::from_config(cfg)?;
    let normalizer = PrelimNormalizer::new(fetcher.base());
    let csv = CsvSink::new(
        cfg.output_dir
            .join(format!("prelim_earnings_{}.csv", date.format("%Y%m%d"))),
    );

    let mut query = KindQuery::new(date);
    let mut pipeline = Pipeline::new(NAME, fetcher, normalizer, PrelimFormatter).item_sink(csv);
    if opts.telegram {
        pipeline = pipeline.item_sink(TelegramSink::from_config(cfg).with_link_preview(true));
    }
    if opts.telegram || opts.only_new {
        let log = SentLog::load(cfg.cache.dir.join(SENT_LOG_FILE));
        if opts.only_new {
            query.exclude = log.entries().clone();
        }
        pipeline = pipeline.gate(SentGate::new(log, opts.only_new, opts.telegram));
    }
    pipeline.run(&query).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{SourceId, Value};

    #[test]
    fn thousands_separators() {
        assert_eq!(thousands(0.0), "0");
        assert_eq!(thousands(999.0), "999");
        assert_eq!(thousands(1000.0), "1,000");
        assert_eq!(thousands(-1234567.0), "-1,234,567");
    }

    fn filing() -> Record {
        let ts = NaiveDate::from_ymd_opt(2026, 2, 9)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap();
        Record::builder(SourceId::KindDisclosure, ts, "연결재무제표기준영업(잠정)실적(공정공시)")
            .field("company", "삼성전자")
            .field("stock_code", "005930")
            .field("acptno", "20260209000123")
            .field("revenue_current", 1_234_000.0)
            .field("revenue_prev", 1_000_000.0)
            .field("revenue_qoq_pct", 23.4)
            .field("revenue_qoq_turnaround", Value::Empty)
            .field("revenue_yoy", 1_100_000.0)
            .field("revenue_yoy_pct", 12.18)
            .field("revenue_yoy_turnaround", Value::Empty)
            .field("operating_profit_current", 5_000.0)
            .field("operating_profit_prev", -300.0)
            .field("operating_profit_qoq_pct", Value::Empty)
            .field("operating_profit_qoq_turnaround", "turned profit")
            .url("https://kind.krx.co.kr/common/disclsviewer.do?method=search&acptno=20260209000123")
            .build()
    }

    #[test]
    fn message_layout() {
        let body = PrelimFormatter::body(&filing());
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines[0], "(unit: KRW million)");
        assert_eq!(lines[1], "[005930] 삼성전자");
        assert_eq!(
            lines[2],
            "- Revenue: current 1,234,000, previous 1,000,000 (QoQ, +23.4%) year-ago 1,100,000 (YoY, +12.2%)"
        );
        assert_eq!(
            lines[3],
            "- Operating profit: current 5,000, previous -300 (QoQ, turned profit) year-ago - (YoY, -)"
        );
        assert!(lines[4].ends_with("acptno=20260209000123"));
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn sent_gate_only_new() {
        let dir = tempfile::tempdir().unwrap();
        let log = SentLog::load(dir.path().join(SENT_LOG_FILE));
        let mut gate = SentGate::new(log, true, true);
        let r = filing();
        assert!(gate.admit(&r));
        gate.commit(&r).unwrap();
        assert!(!gate.admit(&r));

        let reloaded = SentLog::load(dir.path().join(SENT_LOG_FILE));
        assert!(reloaded.contains("20260209000123"));
        let mut resend = SentGate::new(reloaded, false, true);
        assert!(resend.admit(&r));
    }

    #[test]
    fn sent_gate_without_chat_leaves_the_log_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SENT_LOG_FILE);
        let mut gate = SentGate::new(SentLog::load(&path), true, false);
        let r = filing();
        gate.commit(&r).unwrap();
        assert!(gate.admit(&r));
        assert!(!SentLog::load(&path).contains("20260209000123"));
    }
}
