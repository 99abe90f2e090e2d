// src/fetch/kind.rs
//! KIND (Korea Exchange disclosure system): today's disclosure list filtered
//! to preliminary earnings, and the filing document behind each entry.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use super::{decode_korean, http_client, send, send_text, SourceFetcher, BROWSER_USER_AGENT};
use crate::config::AppConfig;
use crate::error::FetchError;
use crate::text::clean_html;

const NAME: &str = "kind";

/// Title marker of preliminary results filings.
pub const PRELIM_MARKER: &str = "잠정";

static RE_TBODY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<tbody[^>]*>(.*?)</tbody>").expect("tbody regex"));
static RE_TR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").expect("tr regex"));
static RE_TD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<td[^>]*>(.*?)</td>").expect("td regex"));
static RE_ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a>").expect("anchor regex"));
static RE_ACPTNO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"openDisclsViewer\('(\d+)'").expect("acptno regex"));
static RE_COMPANY_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"companysummary_open\('(\d+)'").expect("company code regex"));
static RE_MAIN_DOC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<select[^>]*id=["']mainDoc["'][^>]*>(.*?)</select>"#).expect("mainDoc regex")
});
static RE_OPTION_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)<option[^>]*value=["']([^"']*)["']"#).expect("option regex"));
static RE_SET_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"setPath\s*\([^,]*,\s*['"]([^'"]+)['"]"#).expect("setPath regex")
});

/// One preliminary-results entry from the daily list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Disclosure {
    pub time: String,
    pub stock_code: String,
    pub corp_name: String,
    pub title: String,
    pub acptno: String,
    pub submitter: String,
    /// Search date, `YYYYMMDD`.
    pub date: String,
    /// Filing document HTML, filled by the detail fetch.
    pub document: Option<String>,
}

impl Disclosure {
    pub fn viewer_url(&self, base: &str) -> String {
        viewer_url(base, &self.acptno)
    }
}

pub fn viewer_url(base: &str, acptno: &str) -> String {
    format!("{base}/common/disclsviewer.do?method=search&acptno={acptno}")
}

#[derive(Debug, Clone)]
pub struct KindQuery {
    pub date: NaiveDate,
    /// Acceptance numbers to leave out of the list (already delivered).
    pub exclude: BTreeSet<String>,
}

impl KindQuery {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            exclude: BTreeSet::new(),
        }
    }
}

pub struct KindFetcher {
    client: reqwest::Client,
    base: String,
    page_size: u32,
    max_pages: u32,
    page_delay: Duration,
}

impl KindFetcher {
    pub fn new(base: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: http_client(NAME, BROWSER_USER_AGENT, timeout)?,
            base: base.into().trim_end_matches('/').to_string(),
            page_size: 500,
            max_pages: 10,
            page_delay: Duration::from_millis(300),
        })
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self, FetchError> {
        let mut f = Self::new(
            cfg.endpoints.kind_base.clone(),
            Duration::from_secs(cfg.prelim.request_timeout_secs),
        )?;
        f.page_size = cfg.prelim.page_size.max(1);
        f.max_pages = cfg.prelim.max_pages.max(1);
        Ok(f)
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    async fn list_page(&self, date: &str, page: u32) -> Result<String, FetchError> {
        let page_size = self.page_size.to_string();
        let page_index = page.to_string();
        let form = [
            ("method", "searchTodayDisclosureSub"),
            ("currentPageSize", page_size.as_str()),
            ("pageIndex", page_index.as_str()),
            ("orderMode", "0"),
            ("orderStat", "D"),
            ("forward", "todaydisclosure_sub"),
            ("marketType", ""),
            ("disclosureType", ""),
            ("fromDate", date),
            ("toDate", date),
        ];
        let req = self
            .client
            .post(format!("{}/disclosure/todaydisclosure.do", self.base))
            .header("X-Requested-With", "XMLHttpRequest")
            .form(&form);
        send_text(NAME, req).await
    }

    async fn document(&self, acptno: &str) -> Result<String, FetchError> {
        let viewer = viewer_url(&self.base, acptno);
        let page = send_text(NAME, self.client.get(&viewer)).await?;
        let doc_no = main_doc_number(&page)
            .ok_or_else(|| FetchError::malformed(NAME, format!("no mainDoc option for {acptno}")))?;

        let req = self
            .client
            .post(format!("{}/common/disclsviewer.do", self.base))
            .header(reqwest::header::REFERER, viewer.as_str())
            .form(&[("method", "searchContents"), ("docNo", doc_no.as_str())]);
        let contents = send_text(NAME, req).await?;
        let path = document_path(&contents)
            .ok_or_else(|| FetchError::malformed(NAME, format!("no document path for {acptno}")))?;
        let url = if path.starts_with("http") {
            path
        } else {
            format!("{}{}", self.base, path)
        };

        let bytes = send(NAME, self.client.get(&url))
            .await?
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(NAME, e))?;
        Ok(decode_korean(&bytes))
    }
}

#[async_trait::async_trait]
impl SourceFetcher for KindFetcher {
    type Query = KindQuery;
    type Item = Disclosure;

    async fn fetch(&self, query: &KindQuery) -> Result<Vec<Disclosure>, FetchError> {
        let date = query.date.format("%Y%m%d").to_string();
        let mut out: Vec<Disclosure> = Vec::new();
        let mut seen = HashSet::new();

        for page in 1..=self.max_pages {
            let html = self.list_page(&date, page).await?;
            let (rows, entries) = parse_disclosure_list(&html, &date);
            for d in entries {
                if !query.exclude.contains(&d.acptno) && seen.insert(d.acptno.clone()) {
                    out.push(d);
                }
            }
            if rows < self.page_size as usize {
                break;
            }
            tokio::time::sleep(self.page_delay).await;
        }

        tracing::debug!(source = NAME, date = %date, found = out.len(), "preliminary filings listed");
        Ok(out)
    }

    async fn fetch_detail(&self, mut item: Disclosure) -> Result<Disclosure, FetchError> {
        let doc = self.document(&item.acptno).await?;
        item.document = Some(doc);
        Ok(item)
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

/// Parse one list page. Returns the raw row count (for paging) and the
/// preliminary-results entries found on it.
pub fn parse_disclosure_list(html: &str, date: &str) -> (usize, Vec<Disclosure>) {
    let body = RE_TBODY
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(html);

    let mut rows = 0usize;
    let mut out = Vec::new();
    for tr in RE_TR.captures_iter(body) {
        rows += 1;
        let cells: Vec<&str> = RE_TD
            .captures_iter(&tr[1])
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        if cells.len() < 4 {
            continue;
        }
        let Some(title_a) = RE_ANCHOR.captures(cells[2]) else {
            continue;
        };
        let title = clean_html(&title_a[2]);
        if !title.contains(PRELIM_MARKER) {
            continue;
        }
        let Some(acptno) = RE_ACPTNO.captures(&title_a[1]).map(|c| c[1].to_string()) else {
            continue;
        };

        let company = RE_ANCHOR
            .captures_iter(cells[1])
            .find(|c| c[1].contains("companysum"));
        let (corp_name, stock_code) = match company {
            Some(c) => {
                let code = RE_COMPANY_CODE
                    .captures(&c[1])
                    .map(|m| format!("{:0>6}", &m[1]))
                    .unwrap_or_default();
                (clean_html(&c[2]), code)
            }
            None => (String::new(), String::new()),
        };

        out.push(Disclosure {
            time: clean_html(cells[0]),
            stock_code,
            corp_name,
            title,
            acptno,
            submitter: clean_html(cells[3]),
            date: date.to_string(),
            document: None,
        });
    }
    (rows, out)
}

/// `docNo` is the part before `|` of the first `mainDoc` option that has one.
pub fn main_doc_number(viewer_html: &str) -> Option<String> {
    let select = RE_MAIN_DOC.captures(viewer_html)?;
    RE_OPTION_VALUE
        .captures_iter(&select[1])
        .map(|c| c[1].to_string())
        .find(|v| v.contains('|'))
        .and_then(|v| v.split('|').next().map(str::to_string))
        .filter(|v| !v.is_empty())
}

pub fn document_path(contents_js: &str) -> Option<String> {
    RE_SET_PATH.captures(contents_js).map(|c| c[1].to_string())
}
