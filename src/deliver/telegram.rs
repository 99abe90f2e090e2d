// src/deliver/telegram.rs
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{Format, Message, Sink};
use crate::config::{AppConfig, Credentials};
use crate::error::DeliveryError;
use crate::text::{anon_hash, truncate_chars};

const NAME: &str = "telegram";

/// Bot API limit is 4096; leave room for the truncation marker.
pub const MAX_TEXT_CHARS: usize = 4000;
const TRUNCATION_MARKER: &str = "\n...";
const MAX_RETRY_AFTER: u64 = 60;

#[derive(Clone)]
pub struct TelegramSink {
    client: Client,
    base: String,
    credentials: Credentials,
    timeout: Duration,
    max_retries: u8,
    link_preview: bool,
}

impl TelegramSink {
    pub fn new(base: impl Into<String>, token: Option<String>, chat_id: Option<String>) -> Self {
        Self::with_credentials(
            base,
            Credentials {
                telegram_bot_token: token,
                telegram_chat_id: chat_id,
                ..Credentials::default()
            },
        )
    }

    pub fn with_credentials(base: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            client: Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
            credentials,
            timeout: Duration::from_secs(10),
            max_retries: 3,
            link_preview: false,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::with_credentials(cfg.endpoints.telegram_base.as_str(), cfg.credentials.clone())
            .with_timeout(cfg.http_timeout_secs)
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Attempts allowed for rate-limited (429) sends.
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    /// Let Telegram render a preview of the first link. Off by default.
    pub fn with_link_preview(mut self, enabled: bool) -> Self {
        self.link_preview = enabled;
        self
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    disable_web_page_preview: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    ok: bool,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

fn parse_mode(format: Format) -> Option<&'static str> {
    match format {
        Format::Plain => None,
        Format::Html => Some("HTML"),
        Format::Markdown => Some("Markdown"),
    }
}

pub fn outgoing_text(msg: &Message) -> String {
    let text = if msg.subject.is_empty() {
        msg.body.clone()
    } else {
        format!("{}\n\n{}", msg.subject, msg.body)
    };
    truncate_chars(&text, MAX_TEXT_CHARS, TRUNCATION_MARKER)
}

#[async_trait::async_trait]
impl Sink for TelegramSink {
    fn name(&self) -> &'static str {
        NAME
    }

    fn target(&self) -> String {
        match &self.credentials.telegram_chat_id {
            Some(chat) => format!("telegram:{chat}"),
            None => "telegram".to_string(),
        }
    }

    async fn deliver(&self, msg: &Message) -> Result<(), DeliveryError> {
        let (token, chat_id) = self.credentials.telegram()?;

        let url = format!("{}/bot{}/sendMessage", self.base, token);
        let text = outgoing_text(msg);
        let mut mode = parse_mode(msg.format);
        let mut attempt: u8 = 0;

        loop {
            attempt += 1;
            let payload = SendMessage {
                chat_id,
                text: &text,
                parse_mode: mode,
                disable_web_page_preview: !self.link_preview,
            };
            let rsp = self
                .client
                .post(&url)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await
                .map_err(|source| DeliveryError::Network { sink: NAME, source })?;

            let status = rsp.status();
            let body: ApiResponse = rsp.json().await.unwrap_or_default();
            if status.is_success() && body.ok {
                tracing::info!(sink = NAME, body_hash = %anon_hash(&text), chars = text.chars().count(), "message sent");
                return Ok(());
            }

            if status == StatusCode::TOO_MANY_REQUESTS && attempt < self.max_retries {
                let wait = body
                    .parameters
                    .and_then(|p| p.retry_after)
                    .unwrap_or(1)
                    .min(MAX_RETRY_AFTER);
                tracing::warn!(sink = NAME, attempt, retry_after = wait, "rate limited");
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            if status == StatusCode::BAD_REQUEST && mode == Some("Markdown") {
                tracing::warn!(sink = NAME, error = ?body.description, "markdown rejected, resending as plain text");
                mode = None;
                continue;
            }

            let description = body
                .description
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            tracing::warn!(sink = NAME, status = status.as_u16(), error = %description, "message rejected");
            return Err(DeliveryError::Rejected {
                sink: NAME,
                description,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_text_is_truncated_with_marker() {
        let msg = Message::plain("", "가".repeat(4100));
        let out = outgoing_text(&msg);
        assert_eq!(out.chars().count(), MAX_TEXT_CHARS + TRUNCATION_MARKER.chars().count());
        assert!(out.ends_with("\n..."));

        let short = Message::plain("Title", "body");
        assert_eq!(outgoing_text(&short), "Title\n\nbody");
    }

    #[tokio::test]
    async fn missing_credentials_fail_at_delivery() {
        let sink = TelegramSink::new("http://127.0.0.1:1", None, Some("42".into()));
        assert!(matches!(
            sink.deliver(&Message::plain("", "x")).await,
            Err(DeliveryError::MissingCredential("BOT_TOKEN"))
        ));
        let sink = TelegramSink::new("http://127.0.0.1:1", Some("t".into()), None);
        assert!(matches!(
            sink.deliver(&Message::plain("", "x")).await,
            Err(DeliveryError::MissingCredential("CHAT_ID"))
        ));
    }

    #[test]
    fn parse_modes() {
        assert_eq!(parse_mode(Format::Html), Some("HTML"));
        assert_eq!(parse_mode(Format::Markdown), Some("Markdown"));
        assert_eq!(parse_mode(Format::Plain), None);
    }
}
