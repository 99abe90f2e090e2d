// src/normalize/quote.rs
use chrono::NaiveDate;

use super::{midnight, round_to, Normalizer};
use crate::error::ValidationError;
use crate::fetch::yahoo::QuoteItem;
use crate::record::{Record, SourceId};

/// Yahoo sometimes reports the 10-year yield ×10 or ×100; above this it is rescaled.
const TNX_SCALE_THRESHOLD: f64 = 20.0;

pub fn pct_change(last: f64, prev: f64) -> Option<f64> {
    (prev != 0.0).then(|| round_to((last - prev) / prev * 100.0, 2))
}

pub struct QuoteNormalizer {
    as_of: NaiveDate,
}

impl QuoteNormalizer {
    pub fn new(as_of: NaiveDate) -> Self {
        Self { as_of }
    }
}

impl Normalizer for QuoteNormalizer {
    type Item = QuoteItem;

    fn normalize(&self, item: &QuoteItem) -> Result<Record, ValidationError> {
        let label = self.label(item);
        let mut last = item.last.ok_or_else(|| ValidationError::missing("last", &label))?;
        let mut prev = item.prev.ok_or_else(|| ValidationError::missing("prev", &label))?;
        if item.spec.ticker == "^TNX" && last > TNX_SCALE_THRESHOLD {
            last /= 100.0;
            prev /= 100.0;
        }
        let pct = pct_change(last, prev).ok_or_else(|| ValidationError::invalid("prev", "0"))?;

        Ok(Record::builder(SourceId::YahooQuote, midnight(self.as_of), item.spec.name.as_str())
            .field("group", item.spec.group.as_str())
            .field("ticker", item.spec.ticker.as_str())
            .field("last", round_to(last, 2))
            .field("prev", round_to(prev, 2))
            .field("pct", pct)
            .url(format!("https://finance.yahoo.com/quote/{}", item.spec.ticker))
            .build())
    }

    fn label(&self, item: &QuoteItem) -> String {
        format!("{} ({})", item.spec.name, item.spec.ticker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::yahoo::{QuoteGroup, QuoteSpec};

    fn q(ticker: &str, last: Option<f64>, prev: Option<f64>) -> QuoteItem {
        QuoteItem {
            spec: QuoteSpec {
                ticker: ticker.into(),
                name: ticker.into(),
                group: QuoteGroup::Indicator,
            },
            last,
            prev,
        }
    }

    fn n() -> QuoteNormalizer {
        QuoteNormalizer::new(NaiveDate::from_ymd_opt(2026, 2, 10).unwrap())
    }

    #[test]
    fn pct_is_rounded_to_two_places() {
        let r = n().normalize(&q("^GSPC", Some(6012.345), Some(6030.0))).unwrap();
        assert_eq!(r.number("pct"), Some(-0.29));
        assert_eq!(r.number("last"), Some(6012.35));
        assert_eq!(r.text_field("group"), Some("indicator"));
    }

    #[test]
    fn ten_year_yield_is_rescaled() {
        let r = n().normalize(&q("^TNX", Some(425.0), Some(420.0))).unwrap();
        assert_eq!(r.number("last"), Some(4.25));
        assert_eq!(r.number("pct"), Some(1.19));
        let r = n().normalize(&q("^TNX", Some(4.25), Some(4.2))).unwrap();
        assert_eq!(r.number("last"), Some(4.25));
    }

    #[test]
    fn missing_or_zero_previous_close_fails() {
        assert!(matches!(
            n().normalize(&q("XLK", Some(1.0), None)),
            Err(ValidationError::MissingField { field: "prev", .. })
        ));
        assert!(matches!(
            n().normalize(&q("XLK", None, None)),
            Err(ValidationError::MissingField { field: "last", .. })
        ));
        assert!(matches!(
            n().normalize(&q("XLK", Some(1.0), Some(0.0))),
            Err(ValidationError::InvalidField { field: "prev", .. })
        ));
    }
}
