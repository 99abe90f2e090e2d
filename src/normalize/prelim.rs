// src/normalize/prelim.rs
//! Preliminary earnings filings: pick the results table out of the filing
//! document and flatten it into one record per filing.

use chrono::{NaiveDate, NaiveTime};

use super::table::{read_tables, Table};
use super::{midnight, required, Normalizer};
use crate::error::ValidationError;
use crate::fetch::kind::{viewer_url, Disclosure};
use crate::record::{Record, SourceId, Value};

pub struct Metric {
    /// Row label in the filing table.
    pub label: &'static str,
    pub key: &'static str,
    /// current, prev, qoq_pct, qoq_turnaround, yoy, yoy_pct, yoy_turnaround
    pub columns: [&'static str; 7],
    pub cumulative: &'static str,
}

macro_rules! metric {
    ($label:literal, $key:literal) => {
        Metric {
            label: $label,
            key: $key,
            columns: [
                concat!($key, "_current"),
                concat!($key, "_prev"),
                concat!($key, "_qoq_pct"),
                concat!($key, "_qoq_turnaround"),
                concat!($key, "_yoy"),
                concat!($key, "_yoy_pct"),
                concat!($key, "_yoy_turnaround"),
            ],
            cumulative: concat!($key, "_cum_current"),
        }
    };
}

/// Checked in this order; the first label contained in a row's first cell wins.
pub static METRICS: [Metric; 4] = [
    metric!("매출액", "revenue"),
    metric!("영업이익", "operating_profit"),
    metric!("법인세비용차감전계속사업이익", "pretax_profit"),
    metric!("당기순이익", "net_income"),
];

pub const TURNED_PROFIT: &str = "turned profit";
pub const TURNED_LOSS: &str = "turned loss";
pub const UNIT: &str = "KRW million";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Current,
    Cumulative,
}

/// Keyword score used to find the results table among all tables of a filing.
pub fn table_score(t: &Table) -> u32 {
    let mut score = 0;
    for kw in ["매출액", "영업이익", "당기순이익"] {
        if t.contains(kw) {
            score += 10;
        }
    }
    if t.contains("당기") || t.contains("당해") {
        score += 5;
    }
    if t.contains("전기") {
        score += 5;
    }
    if t.contains("전년동기") {
        score += 5;
    }
    if (3..=30).contains(&t.height()) && (3..=15).contains(&t.width()) {
        score += 5;
    }
    score
}

pub fn best_table(html: &str) -> Option<Table> {
    let mut best: Option<(u32, Table)> = None;
    for t in read_tables(html) {
        let s = table_score(&t);
        if s > 0 && best.as_ref().map_or(true, |(b, _)| s > *b) {
            best = Some((s, t));
        }
    }
    best.map(|(_, t)| t)
}

/// Strip thousands separators and `%`; parentheses mean negative; `-` or blank is absent.
pub fn clean_numeric(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s == "-" {
        return None;
    }
    let mut v: String = s.chars().filter(|c| *c != ',' && *c != '%').collect();
    if v.starts_with('(') && v.ends_with(')') && v.len() >= 2 {
        v = format!("-{}", &v[1..v.len() - 1]);
    }
    v.trim().parse::<f64>().ok()
}

pub fn standardize_turnaround(s: &str) -> String {
    let s = s.trim();
    if s.contains("흑자") || s.contains("흑전") {
        TURNED_PROFIT.to_string()
    } else if s.contains("적자") || s.contains("적전") {
        TURNED_LOSS.to_string()
    } else if s.is_empty() {
        "-".to_string()
    } else {
        s.to_string()
    }
}

struct MetricRow<'a> {
    metric: &'static Metric,
    scope: Scope,
    cells: &'a [String],
}

impl MetricRow<'_> {
    fn num(&self, idx: usize) -> Option<f64> {
        self.cells.get(idx).and_then(|c| clean_numeric(c))
    }

    fn turnaround(&self, idx: usize) -> String {
        self.cells
            .get(idx)
            .map(|c| standardize_turnaround(c))
            .unwrap_or_else(|| "-".to_string())
    }
}

fn metric_rows(t: &Table) -> Vec<MetricRow<'_>> {
    let mut out: Vec<MetricRow<'_>> = Vec::new();
    for row in &t.rows {
        if row.len() < 3 {
            continue;
        }
        let c0 = row[0].as_str();
        let c1 = row[1].as_str();
        let Some(metric) = METRICS.iter().find(|m| c0.contains(m.label)) else {
            continue;
        };
        let scope = if c1.contains("당해") || c0.contains("당해") {
            Scope::Current
        } else if c1.contains("누계") || c0.contains("누계") {
            Scope::Cumulative
        } else {
            continue;
        };
        // first row per (metric, scope) wins
        if out.iter().any(|r| r.metric.key == metric.key && r.scope == scope) {
            continue;
        }
        out.push(MetricRow {
            metric,
            scope,
            cells: row.as_slice(),
        });
    }
    out
}

pub struct PrelimNormalizer {
    kind_base: String,
}

impl PrelimNormalizer {
    pub fn new(kind_base: impl Into<String>) -> Self {
        Self {
            kind_base: kind_base.into().trim_end_matches('/').to_string(),
        }
    }
}

impl Normalizer for PrelimNormalizer {
    type Item = Disclosure;

    fn normalize(&self, d: &Disclosure) -> Result<Record, ValidationError> {
        let label = self.label(d);
        let company = required(&d.corp_name, "company", &label)?;
        let acptno = required(&d.acptno, "acptno", &label)?;
        let raw_date = required(&d.date, "date", &label)?;
        let date = NaiveDate::parse_from_str(raw_date, "%Y%m%d")
            .map_err(|_| ValidationError::invalid("date", raw_date))?;
        let ts = NaiveTime::parse_from_str(d.time.trim(), "%H:%M")
            .map(|t| date.and_time(t))
            .unwrap_or_else(|_| midnight(date));

        let doc = d
            .document
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ValidationError::missing("document", &label))?;
        let table = best_table(doc).ok_or_else(|| ValidationError::NoEarningsTable(label.clone()))?;
        let rows = metric_rows(&table);
        if rows.is_empty() {
            return Err(ValidationError::missing("metrics", &label));
        }

        let mut b = Record::builder(SourceId::KindDisclosure, ts, d.title.trim())
            .field("company", company)
            .field("stock_code", d.stock_code.as_str())
            .field("acptno", acptno)
            .field("submitter", d.submitter.as_str())
            .field("unit", UNIT);

        for m in &METRICS {
            let cur = rows
                .iter()
                .find(|r| r.metric.key == m.key && r.scope == Scope::Current);
            let [c_cur, c_prev, c_qoq, c_qoq_t, c_yoy, c_yoy_pct, c_yoy_t] = m.columns;
            match cur {
                Some(r) => {
                    b = b
                        .field(c_cur, r.num(2))
                        .field(c_prev, r.num(3))
                        .field(c_qoq, r.num(4))
                        .field(c_qoq_t, r.turnaround(5))
                        .field(c_yoy, r.num(6))
                        .field(c_yoy_pct, r.num(7))
                        .field(c_yoy_t, r.turnaround(8));
                }
                None => {
                    for c in m.columns {
                        b = b.field(c, Value::Empty);
                    }
                }
            }
            let cum = rows
                .iter()
                .find(|r| r.metric.key == m.key && r.scope == Scope::Cumulative)
                .and_then(|r| r.num(2));
            b = b.field(m.cumulative, cum);
        }

        Ok(b.url(viewer_url(&self.kind_base, acptno)).build())
    }

    fn label(&self, d: &Disclosure) -> String {
        format!("[{}] {}", d.stock_code, d.corp_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
<html><body>
<table><tr><td>회사명</td><td>삼성전자</td></tr></table>
<table border="1">
<tr><td>구분(단위 : 백만원, %)</td><td></td><td>당기실적</td><td>전기실적</td><td>전기대비증감율(%)</td><td>전기대비 흑자적자전환여부</td><td>전년동기실적</td><td>전년동기대비증감율(%)</td><td>전년동기대비 흑자적자전환여부</td></tr>
<tr><td rowspan="2">매출액</td><td>당해실적</td><td>79,140,000</td><td>86,061,000</td><td>-8.0</td><td>-</td><td>75,788,000</td><td>4.4</td><td>-</td></tr>
<tr><td>누계실적</td><td>300,870,000</td><td>-</td><td>-</td><td>-</td><td>258,935,000</td><td>16.2</td><td>-</td></tr>
<tr><td rowspan="2">영업이익</td><td>당해실적</td><td>(1,200)</td><td>9,180,000</td><td>-</td><td>적자전환</td><td>2,430,000</td><td>-</td><td>적자전환</td></tr>
<tr><td>누계실적</td><td>32,730,000</td><td>-</td><td>-</td><td>-</td><td>6,570,000</td><td>398.2</td><td>-</td></tr>
<tr><td rowspan="2">당기순이익</td><td>당해실적</td><td>7,750,000</td><td>10,100,000</td><td>-23.3</td><td>-</td><td>6,340,000</td><td>22.2</td><td>-</td></tr>
<tr><td>누계실적</td><td>34,450,000</td><td>-</td><td>-</td><td>-</td><td>15,480,000</td><td>122.5</td><td>-</td></tr>
</table>
</body></html>"#;

    fn disclosure() -> Disclosure {
        Disclosure {
            time: "15:32".into(),
            stock_code: "005930".into(),
            corp_name: "삼성전자".into(),
            title: "연결재무제표기준영업(잠정)실적(공정공시)".into(),
            acptno: "20260209000123".into(),
            submitter: "삼성전자".into(),
            date: "20260209".into(),
            document: Some(DOC.into()),
        }
    }

    #[test]
    fn numeric_cleanup() {
        assert_eq!(clean_numeric("79,140,000"), Some(79_140_000.0));
        assert_eq!(clean_numeric("(1,200)"), Some(-1200.0));
        assert_eq!(clean_numeric("12.5%"), Some(12.5));
        assert_eq!(clean_numeric("-"), None);
        assert_eq!(clean_numeric(""), None);
        assert_eq!(clean_numeric("n/a"), None);
    }

    #[test]
    fn turnaround_labels() {
        assert_eq!(standardize_turnaround("흑자전환"), TURNED_PROFIT);
        assert_eq!(standardize_turnaround("적전"), TURNED_LOSS);
        assert_eq!(standardize_turnaround(""), "-");
        assert_eq!(standardize_turnaround("지속"), "지속");
    }

    #[test]
    fn results_table_wins_over_cover_table() {
        let t = best_table(DOC).unwrap();
        assert!(t.contains("매출액"));
        assert_eq!(t.width(), 9);
    }

    #[test]
    fn filing_flattens_current_and_cumulative() {
        let n = PrelimNormalizer::new("https://kind.krx.co.kr");
        let r = n.normalize(&disclosure()).unwrap();
        assert_eq!(r.text_field("company"), Some("삼성전자"));
        assert_eq!(r.timestamp().format("%Y%m%d %H:%M").to_string(), "20260209 15:32");
        assert_eq!(r.number("revenue_current"), Some(79_140_000.0));
        assert_eq!(r.number("revenue_qoq_pct"), Some(-8.0));
        assert_eq!(r.number("revenue_yoy"), Some(75_788_000.0));
        assert_eq!(r.number("revenue_cum_current"), Some(300_870_000.0));
        assert_eq!(r.number("operating_profit_current"), Some(-1200.0));
        assert_eq!(r.text_field("operating_profit_qoq_turnaround"), Some(TURNED_LOSS));
        assert_eq!(r.number("net_income_yoy_pct"), Some(22.2));
        // absent metric still has its columns
        assert!(r.field("pretax_profit_current").unwrap().is_empty());
        assert_eq!(
            r.url(),
            Some("https://kind.krx.co.kr/common/disclsviewer.do?method=search&acptno=20260209000123")
        );
    }

    #[test]
    fn missing_mandatory_fields_fail() {
        let n = PrelimNormalizer::new("https://kind.krx.co.kr");

        let mut d = disclosure();
        d.corp_name = " ".into();
        assert!(matches!(
            n.normalize(&d),
            Err(ValidationError::MissingField { field: "company", .. })
        ));

        let mut d = disclosure();
        d.document = None;
        assert!(matches!(
            n.normalize(&d),
            Err(ValidationError::MissingField { field: "document", .. })
        ));

        let mut d = disclosure();
        d.document = Some("<p>정정 공시</p>".into());
        assert!(matches!(n.normalize(&d), Err(ValidationError::NoEarningsTable(_))));

        let mut d = disclosure();
        d.document = Some("<table><tr><td>매출액</td><td>기타</td><td>1</td></tr></table>".into());
        assert!(matches!(
            n.normalize(&d),
            Err(ValidationError::MissingField { field: "metrics", .. })
        ));
    }

    #[test]
    fn column_set_is_stable() {
        let n = PrelimNormalizer::new("https://kind.krx.co.kr");
        let r = n.normalize(&disclosure()).unwrap();
        // 5 identity fields + 4 metrics x (7 + 1)
        assert_eq!(r.fields().len(), 5 + 4 * 8);
    }
}
