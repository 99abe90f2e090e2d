// src/fetch/naver.rs
//! Naver news search API, one request per keyword.

use serde::Deserialize;
use std::time::Duration;

use super::{http_client, send_json, SourceFetcher, USER_AGENT};
use crate::config::AppConfig;
use crate::error::FetchError;

const NAME: &str = "naver";

/// One search hit, as returned by the API plus the keyword that found it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NaverItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub originallink: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "pubDate", default)]
    pub pub_date: String,
    #[serde(skip)]
    pub keyword: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<NaverItem>,
}

#[derive(Debug, Clone)]
pub struct NewsQuery {
    pub keywords: Vec<String>,
    pub max_results: u32,
}

pub struct NaverNewsFetcher {
    client: reqwest::Client,
    endpoint: String,
    credentials: Option<(String, String)>,
}

impl NaverNewsFetcher {
    pub fn new(
        endpoint: impl Into<String>,
        credentials: Option<(String, String)>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            client: http_client(NAME, USER_AGENT, timeout)?,
            endpoint: endpoint.into(),
            credentials,
        })
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self, FetchError> {
        let creds = cfg
            .credentials
            .naver()
            .ok()
            .map(|(id, secret)| (id.to_string(), secret.to_string()));
        Self::new(cfg.endpoints.naver_news.clone(), creds, cfg.http_timeout())
    }

    async fn search(&self, keyword: &str, display: u32) -> Result<Vec<NaverItem>, FetchError> {
        let (id, secret) = self
            .credentials
            .as_ref()
            .ok_or(FetchError::MissingCredential("NAVER_CLIENT_ID"))?;
        let display = display.to_string();
        let req = self
            .client
            .get(&self.endpoint)
            .header("X-Naver-Client-Id", id)
            .header("X-Naver-Client-Secret", secret)
            .query(&[
                ("query", keyword),
                ("display", display.as_str()),
                ("start", "1"),
                ("sort", "date"),
            ]);
        let json = send_json(NAME, req).await?;
        let parsed: SearchResponse = serde_json::from_value(json)
            .map_err(|e| FetchError::malformed(NAME, e.to_string()))?;
        Ok(parsed
            .items
            .into_iter()
            .map(|mut it| {
                it.keyword = keyword.to_string();
                it
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl SourceFetcher for NaverNewsFetcher {
    type Query = NewsQuery;
    type Item = NaverItem;

    async fn fetch(&self, query: &NewsQuery) -> Result<Vec<NaverItem>, FetchError> {
        if self.credentials.is_none() {
            return Err(FetchError::MissingCredential("NAVER_CLIENT_ID"));
        }
        let display = query.max_results.clamp(1, 100);

        let mut out = Vec::new();
        let mut last_err = None;
        let mut succeeded = 0usize;
        for keyword in &query.keywords {
            match self.search(keyword, display).await {
                Ok(mut items) => {
                    tracing::debug!(source = NAME, keyword = %keyword, hits = items.len(), "search ok");
                    succeeded += 1;
                    out.append(&mut items);
                }
                Err(e) => {
                    tracing::warn!(error = ?e, source = NAME, keyword = %keyword, "keyword search failed");
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(out),
        }
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
