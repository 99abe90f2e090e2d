// src/fetch/mod.rs
//! Source fetchers: one outbound call per query, plus an optional per-item
//! detail call. No retries; callers decide what a failure means.

pub mod kind;
pub mod naver;
pub mod transcript;
pub mod yahoo;

use std::time::Duration;

use crate::error::FetchError;

pub const USER_AGENT: &str = concat!("fin-briefing/", env!("CARGO_PKG_VERSION"));

/// Desktop browser UA for endpoints that reject unknown clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[async_trait::async_trait]
pub trait SourceFetcher: Send + Sync {
    type Query: Send + Sync;
    type Item: Send;

    /// List fetch. A failure here aborts the whole run.
    async fn fetch(&self, query: &Self::Query) -> Result<Vec<Self::Item>, FetchError>;

    /// Per-item follow-up (document body, ticker data). Defaults to a no-op.
    async fn fetch_detail(&self, item: Self::Item) -> Result<Self::Item, FetchError> {
        Ok(item)
    }

    fn name(&self) -> &'static str;
}

/// HTTP client with a bounded connect phase and overall request timeout.
pub fn http_client(
    source_name: &'static str,
    user_agent: &str,
    timeout: Duration,
) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(timeout.min(Duration::from_secs(4)))
        .timeout(timeout)
        .build()
        .map_err(|e| FetchError::from_reqwest(source_name, e))
}

/// Send a request and reject non-success statuses.
pub(crate) async fn send(
    source_name: &'static str,
    req: reqwest::RequestBuilder,
) -> Result<reqwest::Response, FetchError> {
    let resp = req
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(source_name, e))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::from_status(source_name, status));
    }
    Ok(resp)
}

pub(crate) async fn send_text(
    source_name: &'static str,
    req: reqwest::RequestBuilder,
) -> Result<String, FetchError> {
    send(source_name, req)
        .await?
        .text()
        .await
        .map_err(|e| FetchError::from_reqwest(source_name, e))
}

pub(crate) async fn send_json(
    source_name: &'static str,
    req: reqwest::RequestBuilder,
) -> Result<serde_json::Value, FetchError> {
    let body = send(source_name, req)
        .await?
        .bytes()
        .await
        .map_err(|e| FetchError::from_reqwest(source_name, e))?;
    serde_json::from_slice(&body).map_err(|e| FetchError::malformed(source_name, e.to_string()))
}

/// Decode a Korean web page or text file: UTF-8 first, then EUC-KR (CP949).
pub fn decode_korean(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (text, _, _) = encoding_rs::EUC_KR.decode(bytes);
            text.into_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_korean_falls_back_to_euc_kr() {
        let (encoded, _, _) = encoding_rs::EUC_KR.encode("영업이익 잠정");
        assert!(std::str::from_utf8(&encoded).is_err());
        assert_eq!(decode_korean(&encoded), "영업이익 잠정");
        assert_eq!(decode_korean("매출액".as_bytes()), "매출액");
    }

    #[test]
    fn decode_korean_strips_utf8_bom() {
        assert_eq!(decode_korean(b"\xEF\xBB\xBFabc"), "abc");
    }
}
