// src/normalize/earnings.rs
use super::{midnight, parse_date, Normalizer};
use crate::error::ValidationError;
use crate::fetch::yahoo::EarningsItem;
use crate::record::{Record, SourceId};

#[derive(Debug, Default, Clone, Copy)]
pub struct EarningsNormalizer;

impl Normalizer for EarningsNormalizer {
    type Item = EarningsItem;

    fn normalize(&self, item: &EarningsItem) -> Result<Record, ValidationError> {
        let label = self.label(item);
        let data = item.data.clone().unwrap_or_default();

        let company = data
            .name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| Some(item.ticker.trim()).filter(|s| !s.is_empty()))
            .ok_or_else(|| ValidationError::missing("company", &label))?
            .to_string();
        let raw_date = data
            .last_earnings_date
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ValidationError::missing("date", &label))?;
        let date = parse_date(raw_date).ok_or_else(|| ValidationError::invalid("date", raw_date))?;
        let eps = data.eps.ok_or_else(|| ValidationError::missing("eps", &label))?;

        Ok(Record::builder(SourceId::YahooEarnings, midnight(date), company)
            .field("sector", item.sector.as_str())
            .field("ticker", item.ticker.as_str())
            .field("next_earnings_date", data.next_earnings_date)
            .field("last_earnings_date", date.format("%Y-%m-%d").to_string())
            .field("revenue", data.revenue)
            .field("eps", eps)
            .field("eps_estimate", data.eps_estimate)
            .field("eps_surprise_pct", data.eps_surprise_pct)
            .field("from_cache", if item.cached { "yes" } else { "no" })
            .url(format!("https://finance.yahoo.com/quote/{}", item.ticker))
            .build())
    }

    fn label(&self, item: &EarningsItem) -> String {
        format!("{} ({})", item.ticker, item.sector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::yahoo::EarningsData;

    fn item(name: Option<&str>, date: Option<&str>, eps: Option<f64>) -> EarningsItem {
        EarningsItem {
            sector: "Big Tech 7".into(),
            ticker: "ABC".into(),
            data: Some(EarningsData {
                name: name.map(str::to_string),
                last_earnings_date: date.map(str::to_string),
                eps,
                ..Default::default()
            }),
            cached: false,
        }
    }

    #[test]
    fn null_eps_is_rejected() {
        let err = EarningsNormalizer
            .normalize(&item(Some("ABC"), Some("20260209"), None))
            .unwrap_err();
        assert_eq!(err, ValidationError::missing("eps", "ABC (Big Tech 7)"));
    }

    #[test]
    fn both_date_layouts_accepted() {
        for d in ["20260209", "2026-02-09"] {
            let r = EarningsNormalizer
                .normalize(&item(Some("ABC Corp"), Some(d), Some(1.25)))
                .unwrap();
            assert_eq!(r.title(), "ABC Corp");
            assert_eq!(r.text_field("last_earnings_date"), Some("2026-02-09"));
            assert_eq!(r.number("eps"), Some(1.25));
            assert_eq!(r.url(), Some("https://finance.yahoo.com/quote/ABC"));
        }
    }

    #[test]
    fn ticker_stands_in_for_missing_name() {
        let r = EarningsNormalizer
            .normalize(&item(None, Some("20260209"), Some(0.5)))
            .unwrap();
        assert_eq!(r.title(), "ABC");
    }

    #[test]
    fn missing_date_or_data() {
        let err = EarningsNormalizer
            .normalize(&item(Some("ABC"), None, Some(1.0)))
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { field: "date", .. }));

        let mut it = item(Some("ABC"), Some("20260209"), Some(1.0));
        it.data = None;
        assert!(EarningsNormalizer.normalize(&it).is_err());
    }
}
