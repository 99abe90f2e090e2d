// src/fetch/yahoo.rs
//! Yahoo Finance: daily chart closes for quotes, quoteSummary for earnings.
//!
//! Both fetchers list their inputs from the query without a network call and
//! do the per-ticker request in `fetch_detail`, so one bad ticker only fails
//! its own item.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use super::{http_client, send_json, SourceFetcher, BROWSER_USER_AGENT};
use crate::cache::EarningsCache;
use crate::config::AppConfig;
use crate::error::FetchError;

const NAME: &str = "yahoo";

/// Which table of the market summary a quote belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteGroup {
    Index,
    Sector,
    Indicator,
}

impl QuoteGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteGroup::Index => "index",
            QuoteGroup::Sector => "sector",
            QuoteGroup::Indicator => "indicator",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteSpec {
    pub ticker: String,
    pub name: String,
    pub group: QuoteGroup,
}

/// A quote before (`last`/`prev` unset) and after the chart request.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteItem {
    pub spec: QuoteSpec,
    pub last: Option<f64>,
    pub prev: Option<f64>,
}

pub struct YahooChartFetcher {
    client: reqwest::Client,
    base: String,
}

impl YahooChartFetcher {
    pub fn new(base: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: http_client(NAME, BROWSER_USER_AGENT, timeout)?,
            base: base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self, FetchError> {
        Self::new(cfg.endpoints.yahoo_base.clone(), cfg.http_timeout())
    }
}

#[async_trait::async_trait]
impl SourceFetcher for YahooChartFetcher {
    type Query = Vec<QuoteSpec>;
    type Item = QuoteItem;

    async fn fetch(&self, query: &Vec<QuoteSpec>) -> Result<Vec<QuoteItem>, FetchError> {
        Ok(query
            .iter()
            .cloned()
            .map(|spec| QuoteItem {
                spec,
                last: None,
                prev: None,
            })
            .collect())
    }

    async fn fetch_detail(&self, mut item: QuoteItem) -> Result<QuoteItem, FetchError> {
        let url = format!("{}/v8/finance/chart/{}", self.base, item.spec.ticker);
        let req = self
            .client
            .get(url)
            .query(&[("range", "10d"), ("interval", "1d")]);
        let json = send_json(NAME, req).await?;
        let (last, prev) = last_two_closes(&json)?;
        item.last = last;
        item.prev = prev;
        Ok(item)
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

/// Last two non-null adjusted closes, falling back to plain closes.
pub fn last_two_closes(chart: &Json) -> Result<(Option<f64>, Option<f64>), FetchError> {
    if let Some(err) = chart.pointer("/chart/error").filter(|e| !e.is_null()) {
        let detail = err
            .get("description")
            .and_then(Json::as_str)
            .unwrap_or("chart error");
        return Err(FetchError::malformed(NAME, detail.to_string()));
    }
    let result = chart
        .pointer("/chart/result/0")
        .ok_or_else(|| FetchError::malformed(NAME, "chart result missing"))?;

    let series = |ptr: &str| -> Vec<f64> {
        result
            .pointer(ptr)
            .and_then(Json::as_array)
            .map(|a| a.iter().filter_map(Json::as_f64).collect())
            .unwrap_or_default()
    };
    let mut closes = series("/indicators/adjclose/0/adjclose");
    if closes.len() < 2 {
        closes = series("/indicators/quote/0/close");
    }

    let n = closes.len();
    let last = closes.last().copied();
    let prev = if n >= 2 { Some(closes[n - 2]) } else { None };
    Ok((last, prev))
}

/// Convert `"9868 HK"`-style tickers into Yahoo symbols.
pub fn normalize_ticker(raw: &str) -> String {
    let t = raw.trim().to_uppercase();
    if t.contains('.') {
        return t;
    }
    let mut parts = t.split_whitespace();
    let symbol = parts.next().unwrap_or_default();
    let suffix = match parts.next() {
        Some("HK") => ".HK",
        Some("JP") | Some("JT") => ".T",
        Some("GR") | Some("DE") => ".DE",
        Some("LN") => ".L",
        Some("SS") => ".SS",
        Some("SZ") => ".SZ",
        _ => "",
    };
    format!("{symbol}{suffix}")
}

/// Per-ticker earnings facts. Also the cache payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EarningsData {
    pub name: Option<String>,
    pub next_earnings_date: Option<String>,
    pub last_earnings_date: Option<String>,
    pub revenue: Option<f64>,
    pub eps: Option<f64>,
    pub eps_estimate: Option<f64>,
    pub eps_surprise_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EarningsItem {
    pub sector: String,
    pub ticker: String,
    pub data: Option<EarningsData>,
    pub cached: bool,
}

#[derive(Debug, Clone)]
pub struct EarningsQuery {
    /// `(sector, raw ticker)` pairs, in display order.
    pub tickers: Vec<(String, String)>,
}

pub struct YahooEarningsFetcher {
    client: reqwest::Client,
    base: String,
    cache: Option<Mutex<EarningsCache>>,
}

impl YahooEarningsFetcher {
    pub fn new(base: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: http_client(NAME, BROWSER_USER_AGENT, timeout)?,
            base: base.into().trim_end_matches('/').to_string(),
            cache: None,
        })
    }

    pub fn from_config(cfg: &AppConfig, use_cache: bool) -> Result<Self, FetchError> {
        let f = Self::new(cfg.endpoints.yahoo_base.clone(), cfg.http_timeout())?;
        Ok(if use_cache {
            let path = cfg.cache.dir.join(crate::cache::EARNINGS_CACHE_FILE);
            let ttl = Duration::from_secs(cfg.cache.earnings_ttl_hours * 3600);
            f.with_cache(EarningsCache::load(path, ttl))
        } else {
            f
        })
    }

    pub fn with_cache(mut self, cache: EarningsCache) -> Self {
        self.cache = Some(Mutex::new(cache));
        self
    }

    /// Write the cache back to disk. No-op without a cache.
    pub fn persist_cache(&self) -> std::io::Result<Option<PathBuf>> {
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        let guard = cache
            .lock()
            .map_err(|_| std::io::Error::other("earnings cache lock poisoned"))?;
        guard.save()?;
        Ok(Some(guard.path().to_path_buf()))
    }

    fn cached(&self, ticker: &str) -> Option<EarningsData> {
        let cache = self.cache.as_ref()?;
        cache.lock().ok()?.get(ticker)
    }

    fn remember(&self, ticker: &str, data: &EarningsData) {
        if let Some(cache) = &self.cache {
            if let Ok(mut g) = cache.lock() {
                g.put(ticker, data.clone());
            }
        }
    }

    async fn quote_summary(&self, ticker: &str) -> Result<EarningsData, FetchError> {
        let url = format!("{}/v10/finance/quoteSummary/{}", self.base, ticker);
        let req = self.client.get(url).query(&[(
            "modules",
            "price,calendarEvents,earningsHistory,incomeStatementHistoryQuarterly",
        )]);
        let json = send_json(NAME, req).await?;
        parse_quote_summary(&json)
    }
}

#[async_trait::async_trait]
impl SourceFetcher for YahooEarningsFetcher {
    type Query = EarningsQuery;
    type Item = EarningsItem;

    async fn fetch(&self, query: &EarningsQuery) -> Result<Vec<EarningsItem>, FetchError> {
        Ok(query
            .tickers
            .iter()
            .map(|(sector, raw)| EarningsItem {
                sector: sector.clone(),
                ticker: normalize_ticker(raw),
                data: None,
                cached: false,
            })
            .collect())
    }

    async fn fetch_detail(&self, mut item: EarningsItem) -> Result<EarningsItem, FetchError> {
        if let Some(hit) = self.cached(&item.ticker) {
            tracing::debug!(source = NAME, ticker = %item.ticker, "earnings cache hit");
            item.data = Some(hit);
            item.cached = true;
            return Ok(item);
        }
        let data = self.quote_summary(&item.ticker).await?;
        self.remember(&item.ticker, &data);
        item.data = Some(data);
        Ok(item)
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

fn raw_f64(v: Option<&Json>) -> Option<f64> {
    let v = v?;
    v.get("raw").and_then(Json::as_f64).or_else(|| v.as_f64())
}

fn fmt_date(v: Option<&Json>) -> Option<String> {
    let v = v?;
    if let Some(s) = v.get("fmt").and_then(Json::as_str) {
        return Some(s.to_string());
    }
    let secs = v.get("raw").and_then(Json::as_i64).or_else(|| v.as_i64())?;
    chrono::DateTime::from_timestamp(secs, 0).map(|d| d.date_naive().format("%Y-%m-%d").to_string())
}

pub fn parse_quote_summary(json: &Json) -> Result<EarningsData, FetchError> {
    if let Some(err) = json.pointer("/quoteSummary/error").filter(|e| !e.is_null()) {
        let detail = err
            .get("description")
            .and_then(Json::as_str)
            .unwrap_or("quoteSummary error");
        return Err(FetchError::malformed(NAME, detail.to_string()));
    }
    let r = json
        .pointer("/quoteSummary/result/0")
        .ok_or_else(|| FetchError::malformed(NAME, "quoteSummary result missing"))?;

    let name = r
        .pointer("/price/shortName")
        .or_else(|| r.pointer("/price/longName"))
        .and_then(Json::as_str)
        .map(str::to_string);

    let earnings = r.pointer("/calendarEvents/earnings");
    let next_earnings_date = earnings
        .and_then(|e| e.get("earningsDate"))
        .and_then(Json::as_array)
        .and_then(|a| fmt_date(a.first()));
    let next_estimate = raw_f64(earnings.and_then(|e| e.get("earningsAverage")));

    let history = r
        .pointer("/earningsHistory/history")
        .and_then(Json::as_array)
        .and_then(|h| h.last());
    let eps = raw_f64(history.and_then(|h| h.get("epsActual")));
    let last_earnings_date = fmt_date(history.and_then(|h| h.get("quarter")));
    let eps_surprise_pct = raw_f64(history.and_then(|h| h.get("surprisePercent")))
        .map(|f| (f * 100.0 * 100.0).round() / 100.0);

    let revenue = raw_f64(r.pointer("/incomeStatementHistoryQuarterly/incomeStatementHistory/0/totalRevenue"));

    Ok(EarningsData {
        name,
        next_earnings_date,
        last_earnings_date,
        revenue,
        eps,
        eps_estimate: next_estimate.or_else(|| raw_f64(history.and_then(|h| h.get("epsEstimate")))),
        eps_surprise_pct,
    })
}
