// src/normalize/news.rs
use chrono::{NaiveDate, NaiveDateTime};
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use super::{required, Normalizer};
use crate::error::ValidationError;
use crate::fetch::naver::NaverItem;
use crate::record::{Record, SourceId};
use crate::text::clean_html;

pub const OTHER_PRESS: &str = "기타";

const DOMAIN_PRESS: &[(&str, &str)] = &[
    ("chosun.com", "조선일보"),
    ("joongang.co.kr", "중앙일보"),
    ("donga.com", "동아일보"),
    ("hankyung.com", "한국경제"),
    ("mk.co.kr", "매일경제"),
    ("sedaily.com", "서울경제"),
    ("fnnews.com", "파이낸셜뉴스"),
    ("mt.co.kr", "머니투데이"),
    ("edaily.co.kr", "이데일리"),
    ("yna.co.kr", "연합뉴스"),
    ("ytn.co.kr", "YTN"),
    ("sbs.co.kr", "SBS"),
    ("kbs.co.kr", "KBS"),
    ("mbc.co.kr", "MBC"),
    ("news1.kr", "뉴스1"),
    ("newsis.com", "뉴시스"),
    ("etnews.com", "전자신문"),
    ("zdnet.co.kr", "ZDNet"),
    ("bloter.net", "블로터"),
];

/// Press name from the article's domain.
pub fn press_from_url(url: &str) -> &'static str {
    DOMAIN_PRESS
        .iter()
        .find(|(domain, _)| url.contains(domain))
        .map(|(_, press)| *press)
        .unwrap_or(OTHER_PRESS)
}

/// RFC 2822 timestamp in the publisher's own offset.
pub fn parse_pub_date(s: &str) -> Option<NaiveDateTime> {
    let odt = OffsetDateTime::parse(s.trim(), &Rfc2822).ok()?;
    NaiveDate::from_ymd_opt(odt.year(), odt.month() as u32, odt.day() as u32)?.and_hms_opt(
        odt.hour() as u32,
        odt.minute() as u32,
        odt.second() as u32,
    )
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NewsNormalizer;

impl Normalizer for NewsNormalizer {
    type Item = NaverItem;

    fn normalize(&self, item: &NaverItem) -> Result<Record, ValidationError> {
        let label = self.label(item);
        let title = clean_html(&item.title);
        let title = required(&title, "title", &label)?;
        let raw_date = required(&item.pub_date, "pubDate", &label)?;
        let ts = parse_pub_date(raw_date).ok_or_else(|| ValidationError::invalid("pubDate", raw_date))?;

        let url = if item.originallink.trim().is_empty() {
            item.link.trim()
        } else {
            item.originallink.trim()
        };
        let summary = clean_html(&item.description);

        Ok(Record::builder(SourceId::NaverNews, ts, title)
            .field("keyword", item.keyword.as_str())
            .field("press", press_from_url(url))
            .field("summary", summary.clone())
            .text(summary)
            .url(url)
            .build())
    }

    fn label(&self, item: &NaverItem) -> String {
        let t = clean_html(&item.title);
        if t.is_empty() {
            format!("[{}] (untitled)", item.keyword)
        } else {
            format!("[{}] {}", item.keyword, crate::text::truncate_chars(&t, 40, "…"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, date: &str) -> NaverItem {
        NaverItem {
            title: title.into(),
            originallink: "https://www.hankyung.com/article/2026020912345".into(),
            link: "https://n.news.naver.com/mnews/article/015/0005012345".into(),
            description: "<b>HBM</b> 수요 &quot;견조&quot;".into(),
            pub_date: date.into(),
            keyword: "반도체".into(),
        }
    }

    #[test]
    fn valid_item_has_all_fields() {
        let r = NewsNormalizer
            .normalize(&item("<b>삼성전자</b> 반도체 호황", "Mon, 09 Feb 2026 09:30:00 +0900"))
            .unwrap();
        assert_eq!(r.title(), "삼성전자 반도체 호황");
        assert_eq!(r.timestamp().format("%Y-%m-%d %H:%M").to_string(), "2026-02-09 09:30");
        assert_eq!(r.text_field("press"), Some("한국경제"));
        assert_eq!(r.text_field("keyword"), Some("반도체"));
        assert_eq!(r.text_field("summary"), Some(r#"HBM 수요 "견조""#));
        assert_eq!(r.url(), Some("https://www.hankyung.com/article/2026020912345"));
    }

    #[test]
    fn missing_title_or_date_fails() {
        let err = NewsNormalizer
            .normalize(&item("  <b></b> ", "Mon, 09 Feb 2026 09:30:00 +0900"))
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { field: "title", .. }));

        let err = NewsNormalizer.normalize(&item("제목", "")).unwrap_err();
        assert!(matches!(err, ValidationError::MissingField { field: "pubDate", .. }));

        let err = NewsNormalizer.normalize(&item("제목", "yesterday")).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { field: "pubDate", .. }));
    }

    #[test]
    fn link_fallback_and_unknown_press() {
        let mut it = item("제목", "Mon, 09 Feb 2026 09:30:00 +0900");
        it.originallink = String::new();
        let r = NewsNormalizer.normalize(&it).unwrap();
        assert_eq!(r.url(), Some("https://n.news.naver.com/mnews/article/015/0005012345"));
        assert_eq!(r.text_field("press"), Some(OTHER_PRESS));
    }
}
