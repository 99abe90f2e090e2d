// src/cache.rs
//! Files under the cache directory: the per-ticker earnings cache, the prelim
//! sent log, and the retention sweep that keeps the directory bounded.

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::fetch::yahoo::EarningsData;

pub const EARNINGS_CACHE_FILE: &str = "earnings_cache.json";
pub const SENT_LOG_FILE: &str = "sent_log.json";

/// Write via a temp file + rename so readers never see a half-written file.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(tmp, path)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    fetched_at: DateTime<Utc>,
    data: EarningsData,
}

/// `ticker → {fetched_at, data}`; entries older than the TTL are ignored.
#[derive(Debug)]
pub struct EarningsCache {
    path: PathBuf,
    ttl: Duration,
    entries: BTreeMap<String, CacheEntry>,
}

impl EarningsCache {
    /// Load from disk; a missing or unreadable file yields an empty cache.
    pub fn load(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        let path = path.into();
        let entries = fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        Self { path, ttl, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, ticker: &str) -> Option<EarningsData> {
        self.get_at(ticker, Utc::now())
    }

    fn get_at(&self, ticker: &str, now: DateTime<Utc>) -> Option<EarningsData> {
        let entry = self.entries.get(ticker)?;
        let age = now.signed_duration_since(entry.fetched_at).to_std().ok()?;
        (age < self.ttl).then(|| entry.data.clone())
    }

    pub fn put(&mut self, ticker: &str, data: EarningsData) {
        self.put_at(ticker, data, Utc::now());
    }

    fn put_at(&mut self, ticker: &str, data: EarningsData, fetched_at: DateTime<Utc>) {
        self.entries
            .insert(ticker.to_string(), CacheEntry { fetched_at, data });
    }

    pub fn save(&self) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(&self.entries)?;
        write_atomic(&self.path, &json)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SentLogFile {
    updated: Option<String>,
    sent_acptno: BTreeSet<String>,
}

/// Acceptance numbers of preliminary filings already delivered.
/// The first eight digits of an acceptance number are its filing date.
#[derive(Debug)]
pub struct SentLog {
    path: PathBuf,
    sent: BTreeSet<String>,
}

impl SentLog {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let sent = fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str::<SentLogFile>(&s).ok())
            .map(|f| f.sent_acptno)
            .unwrap_or_default();
        Self { path, sent }
    }

    pub fn contains(&self, acptno: &str) -> bool {
        self.sent.contains(acptno)
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn entries(&self) -> &BTreeSet<String> {
        &self.sent
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }

    /// Record and persist immediately, so a crash mid-run does not resend.
    pub fn insert(&mut self, acptno: &str) -> io::Result<()> {
        if self.sent.insert(acptno.to_string()) {
            self.save()?;
        }
        Ok(())
    }

    /// Keep only acceptance numbers filed on `today`. Returns how many were dropped.
    pub fn retain_day(&mut self, today: NaiveDate) -> io::Result<usize> {
        let prefix = today.format("%Y%m%d").to_string();
        let before = self.sent.len();
        self.sent.retain(|a| a.starts_with(&prefix));
        let dropped = before - self.sent.len();
        self.save()?;
        Ok(dropped)
    }

    pub fn save(&self) -> io::Result<()> {
        let file = SentLogFile {
            updated: Some(Local::now().format("%Y-%m-%d %H:%M:%S").to_string()),
            sent_acptno: self.sent.clone(),
        };
        write_atomic(&self.path, &serde_json::to_vec_pretty(&file)?)
    }
}

/// Delete regular files in `dir` whose modification time is older than
/// `retention_days`. Returns the deleted paths. A missing directory is not an error.
pub fn sweep(dir: &Path, retention_days: u64) -> io::Result<Vec<PathBuf>> {
    sweep_at(dir, retention_days, SystemTime::now())
}

fn sweep_at(dir: &Path, retention_days: u64, now: SystemTime) -> io::Result<Vec<PathBuf>> {
    let max_age = Duration::from_secs(retention_days * 86_400);
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut removed = Vec::new();
    for entry in entries {
        let entry = entry?;
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified()?;
        let age = now.duration_since(modified).unwrap_or_default();
        if age > max_age {
            fs::remove_file(entry.path())?;
            removed.push(entry.path());
        }
    }
    if !removed.is_empty() {
        tracing::info!(dir = %dir.display(), removed = removed.len(), "cache sweep");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> EarningsData {
        EarningsData {
            name: Some("Apple Inc.".into()),
            eps: Some(2.84),
            ..Default::default()
        }
    }

    #[test]
    fn earnings_cache_honours_ttl_and_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EARNINGS_CACHE_FILE);
        let t0 = Utc.with_ymd_and_hms(2026, 2, 9, 0, 0, 0).unwrap();

        let mut c = EarningsCache::load(&path, Duration::from_secs(24 * 3600));
        assert!(c.is_empty());
        c.put_at("AAPL", sample(), t0);
        c.save().unwrap();

        let c = EarningsCache::load(&path, Duration::from_secs(24 * 3600));
        assert_eq!(c.len(), 1);
        let fresh = t0 + chrono::Duration::hours(23);
        let stale = t0 + chrono::Duration::hours(25);
        assert_eq!(c.get_at("AAPL", fresh), Some(sample()));
        assert_eq!(c.get_at("AAPL", stale), None);
        assert_eq!(c.get_at("MSFT", fresh), None);
    }

    #[test]
    fn sent_log_keeps_today_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SENT_LOG_FILE);
        let mut log = SentLog::load(&path);
        log.insert("20260208000001").unwrap();
        log.insert("20260209000002").unwrap();
        log.insert("20260209000002").unwrap();
        assert_eq!(log.len(), 2);

        let today = NaiveDate::from_ymd_opt(2026, 2, 9).unwrap();
        assert_eq!(log.retain_day(today).unwrap(), 1);

        let reloaded = SentLog::load(&path);
        assert!(reloaded.contains("20260209000002"));
        assert!(!reloaded.contains("20260208000001"));
    }

    #[test]
    fn sweep_removes_files_past_retention() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("earnings_cache.json");
        let log = dir.path().join("sent_log.json");
        fs::write(&cache, "{}").unwrap();
        fs::write(&log, "{}").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        // both files are 8 days old as seen from `later`
        let later = SystemTime::now() + Duration::from_secs(8 * 86_400);
        assert!(sweep_at(dir.path(), 10, later).unwrap().is_empty());
        assert!(sweep_at(dir.path(), 7, SystemTime::now()).unwrap().is_empty());
        let removed = sweep_at(dir.path(), 7, later).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!cache.exists() && !log.exists());
        assert!(dir.path().join("nested").exists());
    }

    #[test]
    fn sweep_of_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(sweep(&dir.path().join("nope"), 7).unwrap().is_empty());
    }
}
