// src/config.rs
//! Explicit application configuration.
//!
//! Layering: built-in defaults → TOML file → credentials from the environment
//! (after loading `.env`). The resulting [`AppConfig`] is passed into every
//! pipeline constructor; nothing reads the environment after startup.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DeliveryError, FetchError, SummarizationError};

pub const ENV_CONFIG_PATH: &str = "FIN_BRIEFING_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/fin-briefing.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub output_dir: PathBuf,
    pub http_timeout_secs: u64,
    pub cache: CacheSettings,
    pub llm: LlmSettings,
    pub endpoints: Endpoints,
    pub news: NewsSettings,
    pub prelim: PrelimSettings,
    pub earnings: EarningsSettings,
    #[serde(skip)]
    pub credentials: Credentials,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            http_timeout_secs: 10,
            cache: CacheSettings::default(),
            llm: LlmSettings::default(),
            endpoints: Endpoints::default(),
            news: NewsSettings::default(),
            prelim: PrelimSettings::default(),
            earnings: EarningsSettings::default(),
            credentials: Credentials::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub dir: PathBuf,
    pub retention_days: u64,
    pub earnings_ttl_hours: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output/cache"),
            retention_days: 7,
            earnings_ttl_hours: 24,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmMode {
    Openai,
    Mock,
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub mode: LlmMode,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            mode: LlmMode::Openai,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub naver_news: String,
    pub kind_base: String,
    pub yahoo_base: String,
    pub telegram_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            naver_news: "https://openapi.naver.com/v1/search/news.json".to_string(),
            kind_base: "https://kind.krx.co.kr".to_string(),
            yahoo_base: "https://query1.finance.yahoo.com".to_string(),
            telegram_base: "https://api.telegram.org".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsSettings {
    pub keywords: Vec<String>,
    pub max_results: u32,
    pub press_filter: Vec<String>,
    pub max_per_message: usize,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self {
            keywords: vec!["반도체".to_string(), "실적".to_string()],
            max_results: 10,
            press_filter: Vec::new(),
            max_per_message: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PrelimSettings {
    pub monitor_interval_mins: u64,
    /// Local hours `[start, end)` during which the monitor polls.
    pub active_hours: [u32; 2],
    pub page_size: u32,
    pub max_pages: u32,
    pub request_timeout_secs: u64,
}

impl Default for PrelimSettings {
    fn default() -> Self {
        Self {
            monitor_interval_mins: 5,
            active_hours: [8, 18],
            page_size: 500,
            max_pages: 10,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TickerGroup {
    pub name: String,
    pub tickers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EarningsSettings {
    pub groups: Vec<TickerGroup>,
    pub upcoming_limit: usize,
}

impl Default for EarningsSettings {
    fn default() -> Self {
        Self {
            groups: default_ticker_groups(),
            upcoming_limit: 15,
        }
    }
}

fn default_ticker_groups() -> Vec<TickerGroup> {
    let table: &[(&str, &[&str])] = &[
        ("Big Tech 7", &["AAPL", "MSFT", "GOOG", "AMZN", "NVDA", "TSLA", "META"]),
        ("Semiconductors", &["AVGO", "INTC", "LRCX", "QCOM", "MU", "AMD"]),
        ("EV", &["9868.HK", "1810.HK", "LCID", "TSLA", "NIO", "LI", "1211.HK"]),
        ("Lithium", &["PILBF", "SQM", "ALB", "SGML"]),
        ("AI", &["SNPS", "CDNS", "ANET", "NOW", "ADI"]),
        ("Social Media", &["PINS", "SPOT", "SNAP", "MTCH", "NFLX"]),
        ("Gaming", &["TTWO", "U", "NTDOY", "NTES", "EA"]),
        ("Crypto", &["MSTR", "COIN", "RIOT", "MARA", "APLD"]),
        ("Infrastructure", &["ETN", "TT", "FAST", "PH", "URI"]),
        ("Nuclear", &["GEV", "SO", "DUK", "NGG"]),
        ("Robotics", &["ROK", "ISRG", "ZBRA", "TER", "PATH"]),
        ("Defense", &["BA", "LMT", "NOC", "RTX"]),
        ("Hydrogen", &["PLUG", "LIN", "APD"]),
        ("Clean Energy", &["FSLR", "ENPH", "SEDG", "ORA", "BE"]),
        ("Aerospace", &["AVAV", "KTOS", "TRMB", "IRDM", "LHX"]),
        ("Obesity", &["NVO", "LLY", "AMGN", "PFE", "VKTX"]),
        (
            "Consumer",
            &["AMZN", "CPNG", "WMT", "COST", "9983.T", "NKE", "ADS.DE", "EL", "ULTA", "ELF"],
        ),
        (
            "Autos",
            &["7203.T", "7267.T", "GM", "F", "TSLA", "VOW3.DE", "BMW.DE", "MBG.DE"],
        ),
    ];
    table
        .iter()
        .map(|(name, tickers)| TickerGroup {
            name: name.to_string(),
            tickers: tickers.iter().map(|t| t.to_string()).collect(),
        })
        .collect()
}

impl AppConfig {
    /// Load `.env`, then the config file, then credentials from the environment.
    ///
    /// File lookup: `explicit` → `$FIN_BRIEFING_CONFIG` → `config/fin-briefing.toml`
    /// (if present) → defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut cfg = match resolve_config_path(explicit)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        cfg.credentials = Credentials::from_env();
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        let [start, end] = self.prelim.active_hours;
        if start >= end || end > 24 {
            return Err(anyhow!("prelim.active_hours must satisfy start < end <= 24"));
        }
        if self.http_timeout_secs == 0 {
            return Err(anyhow!("http_timeout_secs must be positive"));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(p) = explicit {
        return Ok(Some(p.to_path_buf()));
    }
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Ok(Some(pb));
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_PATH);
    Ok(default.exists().then_some(default))
}

/// API keys for the four external services. Only presence matters; a missing
/// key fails the stage that needs it, at first use.
#[derive(Clone, Default)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub naver_client_id: Option<String>,
    pub naver_client_secret: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub dart_api_key: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; blank values count as absent.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(k))
                .map(|v| v.trim().to_string())
                .find(|v| !v.is_empty())
        };
        Self {
            openai_api_key: get(&["OPENAI_API", "OPENAI_API_KEY"]),
            naver_client_id: get(&["NAVER_CLIENT_ID"]),
            naver_client_secret: get(&["NAVER_CLIENT_SECRET"]),
            telegram_bot_token: get(&["BOT_TOKEN"]),
            telegram_chat_id: get(&["CHAT_ID"]),
            dart_api_key: get(&["DART_KEY", "dart_key"]),
        }
    }

    pub fn openai(&self) -> Result<&str, SummarizationError> {
        self.openai_api_key
            .as_deref()
            .ok_or(SummarizationError::MissingCredential("OPENAI_API"))
    }

    pub fn naver(&self) -> Result<(&str, &str), FetchError> {
        let id = self
            .naver_client_id
            .as_deref()
            .ok_or(FetchError::MissingCredential("NAVER_CLIENT_ID"))?;
        let secret = self
            .naver_client_secret
            .as_deref()
            .ok_or(FetchError::MissingCredential("NAVER_CLIENT_SECRET"))?;
        Ok((id, secret))
    }

    pub fn telegram(&self) -> Result<(&str, &str), DeliveryError> {
        let token = self
            .telegram_bot_token
            .as_deref()
            .ok_or(DeliveryError::MissingCredential("BOT_TOKEN"))?;
        let chat = self
            .telegram_chat_id
            .as_deref()
            .ok_or(DeliveryError::MissingCredential("CHAT_ID"))?;
        Ok((token, chat))
    }

    pub fn dart(&self) -> Option<&str> {
        self.dart_api_key.as_deref()
    }

    /// Names of the services with credentials present, for the dashboard.
    pub fn present(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.openai().is_ok() {
            out.push("openai");
        }
        if self.naver().is_ok() {
            out.push("naver");
        }
        if self.telegram().is_ok() {
            out.push("telegram");
        }
        if self.dart().is_some() {
            out.push("dart");
        }
        out
    }
}

// Safe diagnostics: presence and length only.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<String>| match v {
            Some(s) => format!("set(len={})", s.len()),
            None => "unset".to_string(),
        };
        f.debug_struct("Credentials")
            .field("openai_api_key", &show(&self.openai_api_key))
            .field("naver_client_id", &show(&self.naver_client_id))
            .field("naver_client_secret", &show(&self.naver_client_secret))
            .field("telegram_bot_token", &show(&self.telegram_bot_token))
            .field("telegram_chat_id", &show(&self.telegram_chat_id))
            .field("dart_api_key", &show(&self.dart_api_key))
            .finish()
    }
}
