// src/text.rs
//! Text helpers shared by normalizers and sinks.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));
static RE_NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("non-word regex"));

/// Decode entities, strip tags, fold typographic quotes and collapse whitespace.
pub fn clean_html(s: &str) -> String {
    // 1) Strip HTML tags (before decoding, so &lt;x&gt; survives as text)
    let out = RE_TAGS.replace_all(s, "");

    // 2) HTML entity decode
    let out = html_escape::decode_html_entities(&out);

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    let out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (includes NBSP)
    RE_WS.replace_all(&out, " ").trim().to_string()
}

/// Key used to detect duplicate headlines: lower-cased, punctuation removed,
/// whitespace collapsed.
pub fn title_key(title: &str) -> String {
    let lower = title.to_lowercase();
    let stripped = RE_NON_WORD.replace_all(&lower, "");
    RE_WS.replace_all(&stripped, " ").trim().to_string()
}

/// Cut to at most `max` chars, appending `suffix` when something was removed.
pub fn truncate_chars(s: &str, max: usize, suffix: &str) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str(suffix);
    out
}

/// Short, stable digest for logging message bodies without their content.
pub fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Make a string safe to use as a file name component.
pub fn file_stem(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}
