// src/pipeline/monitor.rs
//! Repeats the prelim pipeline (Telegram, only new filings) on an interval
//! during active hours until shut down.

use chrono::{Local, NaiveDate, NaiveTime, Timelike};
use metrics::counter;
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

use super::prelim::{self, PrelimOptions};
use crate::cache::{SentLog, SENT_LOG_FILE};
use crate::config::AppConfig;

/// `[start, end)` in local hours.
pub fn within_active_hours(now: NaiveTime, active_hours: [u32; 2]) -> bool {
    let h = now.hour();
    h >= active_hours[0] && h < active_hours[1]
}

fn prune_sent_log(cfg: &AppConfig, today: NaiveDate) {
    let mut log = SentLog::load(cfg.cache.dir.join(SENT_LOG_FILE));
    match log.retain_day(today) {
        Ok(dropped) => tracing::info!(dropped, kept = log.len(), "sent log pruned"),
        Err(e) => tracing::warn!(error = ?e, "sent log prune failed"),
    }
}

pub async fn run(cfg: &AppConfig, shutdown: impl Future<Output = ()>) {
    super::ensure_metrics_described();
    let ticks = counter!("monitor_ticks_total");
    let mins = cfg.prelim.monitor_interval_mins.max(1);
    let mut day = Local::now().date_naive();
    if let Err(e) = crate::cache::sweep(&cfg.cache.dir, cfg.cache.retention_days) {
        tracing::warn!(error = ?e, "cache sweep failed");
    }
    prune_sent_log(cfg, day);

    let mut ticker = tokio::time::interval(Duration::from_secs(mins * 60));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    tracing::info!(
        interval_mins = mins,
        start = cfg.prelim.active_hours[0],
        end = cfg.prelim.active_hours[1],
        "monitor started"
    );
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("monitor stopped");
                return;
            }
            _ = ticker.tick() => {}
        }

        let now = Local::now();
        if now.date_naive() != day {
            day = now.date_naive();
            prune_sent_log(cfg, day);
        }
        if !within_active_hours(now.time(), cfg.prelim.active_hours) {
            tracing::debug!(time = %now.format("%H:%M"), "outside active hours");
            continue;
        }

        ticks.increment(1);
        let opts = PrelimOptions {
            date: None,
            telegram: true,
            only_new: true,
        };
        match prelim::run(cfg, opts).await {
            Ok(report) => tracing::info!(
                fetched = report.fetched,
                delivered = report.delivered,
                failed = report.failed(),
                "monitor tick"
            ),
            Err(e) => tracing::warn!(error = ?e, stage = e.stage(), "monitor run failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn active_window_is_half_open() {
        assert!(!within_active_hours(t(7, 59), [8, 18]));
        assert!(within_active_hours(t(8, 0), [8, 18]));
        assert!(within_active_hours(t(17, 59), [8, 18]));
        assert!(!within_active_hours(t(18, 0), [8, 18]));
    }

    #[tokio::test]
    async fn stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = AppConfig::default();
        cfg.cache.dir = dir.path().to_path_buf();
        // outside any hour, so the first tick does no network work
        cfg.prelim.active_hours = [0, 0];
        tokio::time::timeout(Duration::from_secs(5), run(&cfg, async {}))
            .await
            .expect("monitor should return once shutdown resolves");
    }
}
