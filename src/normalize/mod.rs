// src/normalize/mod.rs
//! Normalizers: pure functions from one raw item to one [`Record`].
//!
//! A normalizer either fills every mandatory field or fails with
//! [`ValidationError`]; it never produces a partial record.

pub mod earnings;
pub mod news;
pub mod prelim;
pub mod quote;
pub mod table;
pub mod transcript;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::ValidationError;
use crate::record::Record;

pub trait Normalizer: Send + Sync {
    type Item;

    fn normalize(&self, item: &Self::Item) -> Result<Record, ValidationError>;

    /// Short human label for logs and run reports.
    fn label(&self, item: &Self::Item) -> String;
}

/// Trimmed, non-empty text or a missing-field error.
pub(crate) fn required<'a>(
    value: &'a str,
    field: &'static str,
    item: &str,
) -> Result<&'a str, ValidationError> {
    let v = value.trim();
    if v.is_empty() {
        Err(ValidationError::missing(field, item))
    } else {
        Ok(v)
    }
}

/// Accepts `YYYYMMDD` and `YYYY-MM-DD`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .ok()
}

pub(crate) fn midnight(d: NaiveDate) -> NaiveDateTime {
    d.and_time(NaiveTime::MIN)
}

/// Round half away from zero to `places` decimals.
pub fn round_to(v: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (v * f).round() / f
}
