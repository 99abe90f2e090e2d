// src/normalize/transcript.rs
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{midnight, Normalizer};
use crate::error::ValidationError;
use crate::fetch::transcript::TranscriptItem;
use crate::record::{Record, SourceId};

pub const DEFAULT_COMPANY: &str = "Company";
pub const DEFAULT_QUARTER: &str = "Quarter";

/// Tried in order on the opening of the transcript.
static HEADER_PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"([가-힣A-Za-z]+)\s*(\d{1,2}Q\d{2})").expect("nQyy regex"),
        Regex::new(r"([가-힣A-Za-z]+)\s*(\d{4}년?\s*\d분기)").expect("yyyy quarter regex"),
        Regex::new(r"([가-힣A-Za-z]+)\s*실적").expect("results regex"),
    ]
});

const HEADER_WINDOW: usize = 500;

/// Company and quarter named near the top, e.g. `넷마블 4Q25`, `넷마블 2025년 4분기`.
pub fn company_and_quarter(transcript: &str) -> (String, String) {
    let head: String = transcript.chars().take(HEADER_WINDOW).collect();
    for re in HEADER_PATTERNS.iter() {
        if let Some(c) = re.captures(&head) {
            let company = c[1].to_string();
            let quarter = c
                .get(2)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| DEFAULT_QUARTER.to_string());
            return (company, quarter);
        }
    }
    (DEFAULT_COMPANY.to_string(), DEFAULT_QUARTER.to_string())
}

pub struct TranscriptNormalizer {
    as_of: NaiveDate,
}

impl TranscriptNormalizer {
    pub fn new(as_of: NaiveDate) -> Self {
        Self { as_of }
    }
}

impl Normalizer for TranscriptNormalizer {
    type Item = TranscriptItem;

    fn normalize(&self, item: &TranscriptItem) -> Result<Record, ValidationError> {
        let text = item.text.trim();
        if text.is_empty() {
            return Err(ValidationError::missing("text", self.label(item)));
        }
        let (company, quarter) = company_and_quarter(text);
        Ok(
            Record::builder(SourceId::Transcript, midnight(self.as_of), format!("{company} {quarter}"))
                .field("company", company)
                .field("quarter", quarter)
                .field("origin", item.origin.as_str())
                .field("chars", text.chars().count() as f64)
                .text(text)
                .build(),
        )
    }

    fn label(&self, item: &TranscriptItem) -> String {
        item.origin.clone()
    }
}
