// src/main.rs
//! `fin-briefing` command line: one subcommand per pipeline, plus the
//! monitor loop, the dashboard server and cache maintenance.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fin_briefing::config::LlmMode;
use fin_briefing::pipeline::{
    call_summary::CallSummaryOptions, earnings::EarningsOptions, market::MarketOptions, monitor,
    news::NewsOptions, prelim::PrelimOptions,
};
use fin_briefing::{api, cache, metrics::Metrics, AppConfig, RunRequest};

#[derive(Parser)]
#[command(name = "fin-briefing", version, about = "Financial data briefing pipelines")]
struct Cli {
    /// TOML config file (default: $FIN_BRIEFING_CONFIG, then config/fin-briefing.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Override `[llm] mode`.
    #[arg(long, global = true, value_parser = ["openai", "mock", "disabled"])]
    llm: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Keyword news search to CSV (and Telegram).
    News {
        #[arg(short, long = "keyword")]
        keywords: Vec<String>,
        #[arg(long)]
        max_results: Option<u32>,
        /// Keep only these press names (repeatable).
        #[arg(long = "press")]
        press: Vec<String>,
        /// YYYYMMDD, names the output file.
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        telegram: bool,
        /// Add a brief model summary per article.
        #[arg(long)]
        summarize: bool,
    },
    /// Preliminary earnings filings of a day.
    Prelim {
        /// YYYYMMDD, default today.
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        telegram: bool,
        /// Skip filings already in the sent log.
        #[arg(long)]
        only_new: bool,
    },
    /// Global earnings tracker.
    Earnings {
        #[arg(long = "group")]
        groups: Vec<String>,
        /// Ad hoc tickers instead of the configured groups.
        #[arg(long = "ticker")]
        tickers: Vec<String>,
        #[arg(long)]
        no_cache: bool,
        #[arg(long)]
        telegram: bool,
        #[arg(long)]
        upcoming_limit: Option<usize>,
    },
    /// Overnight US market summary.
    Market {
        #[arg(long)]
        telegram: bool,
        /// Add a model-written overview.
        #[arg(long)]
        summarize: bool,
    },
    /// Summarize an earnings-call transcript.
    CallSummary {
        /// .txt or .docx transcript.
        #[arg(long, required_unless_present = "text")]
        file: Option<PathBuf>,
        /// Inline transcript text; `-` reads it from stdin.
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,
        #[arg(long)]
        telegram: bool,
    },
    /// Run `prelim --telegram --only-new` on an interval during active hours.
    Monitor,
    /// Serve the dashboard.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8000")]
        addr: SocketAddr,
        #[arg(long, default_value = api::DEFAULT_UI_DIR)]
        ui_dir: PathBuf,
    },
    /// Delete cache files past the retention period.
    SweepCache,
}

fn init_tracing(json: bool, verbose: u8) {
    let default = match verbose {
        0 => "fin_briefing=info,warn",
        1 => "fin_briefing=debug,info",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = ?e, "ctrl-c handler failed");
    }
}

/// `--text -` takes the transcript from stdin.
fn inline_text(text: Option<String>) -> Result<Option<String>> {
    match text.as_deref() {
        Some("-") => std::io::read_to_string(std::io::stdin())
            .map(Some)
            .context("reading transcript from stdin"),
        _ => Ok(text),
    }
}

fn request(command: Command) -> Result<Option<RunRequest>> {
    Ok(Some(match command {
        Command::News {
            keywords,
            max_results,
            press,
            date,
            telegram,
            summarize,
        } => RunRequest::News(NewsOptions {
            keywords: (!keywords.is_empty()).then_some(keywords),
            max_results,
            press_filter: (!press.is_empty()).then_some(press),
            date,
            telegram,
            summarize,
        }),
        Command::Prelim {
            date,
            telegram,
            only_new,
        } => RunRequest::Prelim(PrelimOptions {
            date,
            telegram,
            only_new,
        }),
        Command::Earnings {
            groups,
            tickers,
            no_cache,
            telegram,
            upcoming_limit,
        } => RunRequest::Earnings(EarningsOptions {
            groups: (!groups.is_empty()).then_some(groups),
            tickers: (!tickers.is_empty()).then_some(tickers),
            no_cache,
            telegram,
            upcoming_limit,
        }),
        Command::Market { telegram, summarize } => RunRequest::Market(MarketOptions { telegram, summarize }),
        Command::CallSummary { file, text, telegram } => RunRequest::CallSummary(CallSummaryOptions {
            file,
            text: inline_text(text)?,
            telegram,
        }),
        Command::Monitor | Command::Serve { .. } | Command::SweepCache => return Ok(None),
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs, cli.verbose);

    let mut cfg = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;
    cfg.llm.mode = match cli.llm.as_deref() {
        Some("openai") => LlmMode::Openai,
        Some("mock") => LlmMode::Mock,
        Some("disabled") => LlmMode::Disabled,
        _ => cfg.llm.mode,
    };
    tracing::info!(
        output = %cfg.output_dir.display(),
        llm = ?cfg.llm.mode,
        credentials = ?cfg.credentials.present(),
        "configuration loaded"
    );

    match cli.command {
        Command::Monitor => {
            cfg.credentials
                .telegram()
                .context("monitor sends every new filing to Telegram")?;
            monitor::run(&cfg, shutdown_signal()).await;
        }
        Command::Serve { addr, ui_dir } => {
            let metrics = Metrics::init(&cfg)?;
            let state = api::AppState::new(cfg)
                .with_metrics(metrics.handle.clone())
                .with_ui_dir(ui_dir);
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            tracing::info!(%addr, "dashboard listening");
            axum::serve(listener, api::router(state))
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("dashboard server")?;
        }
        Command::SweepCache => {
            let removed = cache::sweep(&cfg.cache.dir, cfg.cache.retention_days)
                .with_context(|| format!("sweeping {}", cfg.cache.dir.display()))?;
            let removed: Vec<String> = removed.iter().map(|p| p.display().to_string()).collect();
            println!("{}", serde_json::json!({ "removed": removed }));
        }
        command => {
            if let Some(req) = request(command)? {
                let name = req.kind().name();
                let report = req
                    .execute(&cfg)
                    .await
                    .with_context(|| format!("{name} pipeline"))?;
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
    }
    Ok(())
}
