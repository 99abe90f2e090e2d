// src/record.rs
//! The normalized data model: one [`Record`] per fetched item, an optional
//! [`Summary`] derived from it, and the flat [`Row`] a spreadsheet sink appends.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    NaverNews,
    KindDisclosure,
    YahooEarnings,
    YahooQuote,
    Transcript,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::NaverNews => "naver_news",
            SourceId::KindDisclosure => "kind_disclosure",
            SourceId::YahooEarnings => "yahoo_earnings",
            SourceId::YahooQuote => "yahoo_quote",
            SourceId::Transcript => "transcript",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field value. `Empty` is only used for optional fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    Empty,
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Spreadsheet cell rendering.
    pub fn to_cell(&self) -> String {
        match self {
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::Empty => String::new(),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<Option<f64>> for Value {
    fn from(v: Option<f64>) -> Self {
        v.map(Value::Number).unwrap_or(Value::Empty)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Option<String>> for Value {
    fn from(v: Option<String>) -> Self {
        v.map(Value::Text).unwrap_or(Value::Empty)
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: &'static str,
    pub value: Value,
}

/// Normalized unit of fetched data. Immutable once built: there are no setters,
/// the pipeline reads it and hands it to sinks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    source: SourceId,
    timestamp: NaiveDateTime,
    title: String,
    fields: Vec<Field>,
    text: Option<String>,
    url: Option<String>,
}

impl Record {
    pub fn builder(source: SourceId, timestamp: NaiveDateTime, title: impl Into<String>) -> RecordBuilder {
        RecordBuilder {
            record: Record {
                source,
                timestamp,
                title: title.into(),
                fields: Vec::new(),
                text: None,
                url: None,
            },
        }
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.field(name).and_then(Value::as_f64)
    }

    pub fn text_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    /// Long textual payload (transcripts, article descriptions).
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Input handed to the summarizer: headline plus textual payload.
    pub fn summary_input(&self) -> String {
        match self.text.as_deref() {
            Some(t) if !t.is_empty() => format!("{}\n\n{}", self.title, t),
            _ => self.title.clone(),
        }
    }

    /// Flatten into a spreadsheet row: fixed leading columns, then the record's fields.
    pub fn to_row(&self) -> Row {
        let mut row = Row::default();
        row.push("source", self.source.as_str());
        row.push("timestamp", self.timestamp.format("%Y-%m-%d %H:%M").to_string());
        row.push("title", self.title.clone());
        for f in &self.fields {
            row.push(f.name, f.value.to_cell());
        }
        row.push("url", self.url.clone().unwrap_or_default());
        row
    }
}

pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    pub fn field(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.record.fields.push(Field {
            name,
            value: value.into(),
        });
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.record.text = Some(text.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        if !url.is_empty() {
            self.record.url = Some(url);
        }
        self
    }

    pub fn build(self) -> Record {
        self.record
    }
}

/// Which fixed prompt produced a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Template {
    NewsBrief,
    MarketOverview,
    EarningsCall,
}

impl Template {
    pub fn as_str(&self) -> &'static str {
        match self {
            Template::NewsBrief => "news-brief",
            Template::MarketOverview => "market-overview",
            Template::EarningsCall => "earnings-call",
        }
    }
}

/// Text derived from a record (or a digest of records) by the summarizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub template: Template,
    pub text: String,
}

/// Ordered (column, cell) pairs appended by the spreadsheet sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Row {
    cells: Vec<(String, String)>,
}

impl Row {
    pub fn push(&mut self, column: impl Into<String>, cell: impl Into<String>) {
        self.cells.push((column.into(), cell.into()));
    }

    pub fn with(mut self, column: impl Into<String>, cell: impl Into<String>) -> Self {
        self.push(column, cell);
        self
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(c, _)| c.as_str())
    }

    pub fn cells(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(_, v)| v.as_str())
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 9)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    #[test]
    fn row_keeps_field_order_between_fixed_columns() {
        let r = Record::builder(SourceId::YahooQuote, ts(), "S&P 500")
            .field("ticker", "^GSPC")
            .field("last", 6012.5)
            .field("pct", Some(-0.31))
            .url("https://finance.yahoo.com/quote/%5EGSPC")
            .build();
        let row = r.to_row();
        let cols: Vec<_> = row.columns().collect();
        assert_eq!(cols, ["source", "timestamp", "title", "ticker", "last", "pct", "url"]);
        assert_eq!(row.get("timestamp"), Some("2026-02-09 09:30"));
        assert_eq!(row.get("last"), Some("6012.5"));
    }

    #[test]
    fn whole_numbers_render_without_fraction() {
        assert_eq!(Value::Number(125_300.0).to_cell(), "125300");
        assert_eq!(Value::Empty.to_cell(), "");
    }

    #[test]
    fn summary_input_includes_payload() {
        let r = Record::builder(SourceId::Transcript, ts(), "ACME 4Q25")
            .text("Revenue grew.")
            .build();
        assert_eq!(r.summary_input(), "ACME 4Q25\n\nRevenue grew.");
    }
}
