// src/summarize/openai.rs
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Summarizer;
use crate::config::{AppConfig, Credentials};
use crate::error::SummarizationError;
use crate::record::Template;

/// Chat Completions client for any OpenAI-compatible endpoint.
pub struct OpenAiSummarizer {
    http: reqwest::Client,
    credentials: Credentials,
    model: String,
    base_url: String,
}

impl OpenAiSummarizer {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SummarizationError> {
        let http = reqwest::Client::builder()
            .user_agent(crate::fetch::USER_AGENT)
            .connect_timeout(timeout.min(Duration::from_secs(4)))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            credentials: Credentials {
                openai_api_key: api_key,
                ..Credentials::default()
            },
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(cfg: &AppConfig) -> Result<Self, SummarizationError> {
        Self::new(
            cfg.llm.base_url.as_str(),
            cfg.llm.model.as_str(),
            cfg.credentials.openai_api_key.clone(),
            Duration::from_secs(cfg.llm.timeout_secs),
        )
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait::async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, text: &str, template: Template) -> Result<String, SummarizationError> {
        let key = self.credentials.openai()?;
        let prompt = template.prompt();
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: prompt.system,
                },
                Msg {
                    role: "user",
                    content: text,
                },
            ],
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key)
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SummarizationError::Quota);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), template = template.as_str(), "model endpoint error");
            return Err(SummarizationError::Status {
                status: status.as_u16(),
                body: crate::text::truncate_chars(&body, 300, "…"),
            });
        }

        let body: Resp = resp
            .json()
            .await
            .map_err(|e| SummarizationError::Malformed(e.to_string()))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            return Err(SummarizationError::EmptyOutput);
        }
        Ok(content)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let s = OpenAiSummarizer::new("http://127.0.0.1:1", "gpt-4o-mini", None, Duration::from_secs(1))
            .unwrap();
        assert!(matches!(
            s.summarize("text", Template::NewsBrief).await,
            Err(SummarizationError::MissingCredential("OPENAI_API"))
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        let s = OpenAiSummarizer::new(
            "http://127.0.0.1:1/v1/",
            "gpt-4o-mini",
            Some("sk-test".into()),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = s.summarize("text", Template::NewsBrief).await.unwrap_err();
        assert!(matches!(
            err,
            SummarizationError::Network(_) | SummarizationError::Timeout
        ));
    }
}
