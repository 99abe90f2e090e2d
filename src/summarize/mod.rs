// src/summarize/mod.rs
//! Summarizers: text + template in, templated summary out.
//!
//! Templates fix the system prompt, temperature and token budget; callers only
//! choose which template a pipeline uses.

pub mod openai;

use std::sync::Arc;

use crate::config::{AppConfig, LlmMode};
use crate::error::SummarizationError;
use crate::record::Template;
use crate::text::truncate_chars;

pub use openai::OpenAiSummarizer;

#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, template: Template) -> Result<String, SummarizationError>;
    fn name(&self) -> &'static str;
}

/// Fixed prompt parameters per template.
#[derive(Debug, Clone, Copy)]
pub struct PromptSpec {
    pub system: &'static str,
    pub temperature: f32,
    pub max_tokens: u32,
}

const NEWS_BRIEF: &str = "You are a financial news editor. Summarize the article in 2-3 short \
sentences in Korean. Keep figures and company names exactly as given. No opinions, no emojis.";

const MARKET_OVERVIEW: &str = "You are a markets desk analyst writing the overnight US market \
wrap for Korean investors. Using only the data provided, write 3-5 bullet points in Korean \
covering the major indices, sector leadership, volatility, commodities, rates, and the dollar. \
Each bullet is one sentence. Do not invent numbers.";

const EARNINGS_CALL: &str = "You summarize earnings-call transcripts for investors. The first \
line of the input names the company and quarter. Write in Korean and follow this form exactly, \
skipping a section only when the transcript says nothing about it:

< {company} {quarter} earnings call >

1. Annual results
2. Quarterly results
3. Revenue mix
4. Regional / segment mix
5. Cost structure
6. Pipeline
7. Shareholder returns
8. Comment
9. Q&A

Use '-' bullets under each heading, keep every figure with its unit, and put analyst \
questions and management answers under Q&A as 'Q:' / 'A:' pairs.";

impl Template {
    pub fn prompt(&self) -> PromptSpec {
        match self {
            Template::NewsBrief => PromptSpec {
                system: NEWS_BRIEF,
                temperature: 0.3,
                max_tokens: 300,
            },
            Template::MarketOverview => PromptSpec {
                system: MARKET_OVERVIEW,
                temperature: 0.7,
                max_tokens: 500,
            },
            Template::EarningsCall => PromptSpec {
                system: EARNINGS_CALL,
                temperature: 0.3,
                max_tokens: 4000,
            },
        }
    }
}

/// Deterministic summaries for local runs and tests: no network, same input
/// always yields the same text.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockSummarizer;

#[async_trait::async_trait]
impl Summarizer for MockSummarizer {
    async fn summarize(&self, text: &str, template: Template) -> Result<String, SummarizationError> {
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        let Some(first) = lines.first() else {
            return Err(SummarizationError::EmptyOutput);
        };
        let out = match template {
            Template::NewsBrief => format!("[brief] {}", truncate_chars(first, 120, "…")),
            Template::MarketOverview => lines
                .iter()
                .take(5)
                .map(|l| format!("• {}", truncate_chars(l, 100, "…")))
                .collect::<Vec<_>>()
                .join("\n"),
            Template::EarningsCall => format!(
                "< {} earnings call >\n\n8. Comment\n- {} lines, {} chars of transcript\n\n9. Q&A\n- (mock)",
                truncate_chars(first, 40, ""),
                lines.len(),
                text.chars().count()
            ),
        };
        Ok(out)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Always fails with [`SummarizationError::Disabled`]; stands in where a
/// summary is mandatory but the model is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledSummarizer;

#[async_trait::async_trait]
impl Summarizer for DisabledSummarizer {
    async fn summarize(&self, _text: &str, _template: Template) -> Result<String, SummarizationError> {
        Err(SummarizationError::Disabled)
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Summarizer selected by `[llm] mode`; `None` when summarization is disabled.
pub fn build_summarizer(cfg: &AppConfig) -> Result<Option<Arc<dyn Summarizer>>, SummarizationError> {
    Ok(match cfg.llm.mode {
        LlmMode::Disabled => None,
        LlmMode::Mock => Some(Arc::new(MockSummarizer)),
        LlmMode::Openai => Some(Arc::new(OpenAiSummarizer::from_config(cfg)?)),
    })
}
