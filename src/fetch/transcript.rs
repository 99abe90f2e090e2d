// src/fetch/transcript.rs
//! Earnings-call transcripts from a local `.txt`/`.docx` file or inline text.

use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use super::SourceFetcher;
use crate::error::FetchError;

const NAME: &str = "transcript";

static RE_PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:p(?:\s[^>]*)?>(.*?)</w:p>").expect("w:p regex"));
static RE_RUN_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>").expect("w:t regex"));

#[derive(Debug, Clone)]
pub enum TranscriptSource {
    File(PathBuf),
    Inline { origin: String, text: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptItem {
    /// File path or a caller-supplied label.
    pub origin: String,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct TranscriptFetcher;

#[async_trait::async_trait]
impl SourceFetcher for TranscriptFetcher {
    type Query = TranscriptSource;
    type Item = TranscriptItem;

    async fn fetch(&self, query: &TranscriptSource) -> Result<Vec<TranscriptItem>, FetchError> {
        let item = match query {
            TranscriptSource::Inline { origin, text } => TranscriptItem {
                origin: origin.clone(),
                text: text.clone(),
            },
            TranscriptSource::File(path) => TranscriptItem {
                origin: path.display().to_string(),
                text: read_transcript(path).await?,
            },
        };
        Ok(vec![item])
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

pub async fn read_transcript(path: &Path) -> Result<String, FetchError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if ext != "txt" && ext != "docx" {
        return Err(FetchError::Unsupported(format!(
            "{} (expected .txt or .docx)",
            path.display()
        )));
    }

    let bytes = tokio::fs::read(path).await.map_err(|source| FetchError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if ext == "txt" {
        decode_text(&bytes)
            .ok_or_else(|| FetchError::malformed(NAME, format!("unknown text encoding in {}", path.display())))
    } else {
        docx_text(&bytes)
    }
}

/// BOM-marked UTF-16, then UTF-8, then EUC-KR/CP949.
pub fn decode_text(bytes: &[u8]) -> Option<String> {
    if let Some((enc, bom_len)) = encoding_rs::Encoding::for_bom(bytes) {
        if enc == encoding_rs::UTF_16LE || enc == encoding_rs::UTF_16BE {
            let (text, had_errors) = enc.decode_without_bom_handling(&bytes[bom_len..]);
            return (!had_errors).then(|| text.into_owned());
        }
    }
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Some(s.to_string());
    }
    encoding_rs::EUC_KR
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(|c| c.into_owned())
}

/// Paragraph texts of `word/document.xml`, blank paragraphs dropped.
pub fn docx_text(bytes: &[u8]) -> Result<String, FetchError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| FetchError::malformed(NAME, format!("not a docx archive: {e}")))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| FetchError::malformed(NAME, format!("word/document.xml: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| FetchError::malformed(NAME, e.to_string()))?;

    let paragraphs: Vec<String> = RE_PARAGRAPH
        .captures_iter(&xml)
        .map(|p| {
            RE_RUN_TEXT
                .captures_iter(&p[1])
                .map(|t| html_escape::decode_html_entities(&t[1]).into_owned())
                .collect::<String>()
        })
        .filter(|p| !p.trim().is_empty())
        .collect();
    Ok(paragraphs.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx(xml: &str) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut w = zip::ZipWriter::new(&mut buf);
            w.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            w.write_all(xml.as_bytes()).unwrap();
            w.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn docx_paragraphs_join_runs() {
        let xml = r#"<w:document><w:body>
            <w:p w:rsidR="1"><w:pPr><w:jc w:val="left"/></w:pPr><w:r><w:t>ACME </w:t></w:r><w:r><w:t xml:space="preserve">4Q25 call</w:t></w:r></w:p>
            <w:p><w:r><w:t></w:t></w:r></w:p>
            <w:p><w:r><w:tab/><w:t>Revenue &amp; margin</w:t></w:r></w:p>
        </w:body></w:document>"#;
        assert_eq!(docx_text(&docx(xml)).unwrap(), "ACME 4Q25 call\nRevenue & margin");
    }

    #[test]
    fn docx_garbage_is_malformed() {
        assert!(matches!(
            docx_text(b"not a zip"),
            Err(FetchError::Malformed { .. })
        ));
    }

    #[test]
    fn text_encodings() {
        assert_eq!(decode_text("넷마블 4Q25".as_bytes()).as_deref(), Some("넷마블 4Q25"));

        let (euc, _, _) = encoding_rs::EUC_KR.encode("넷마블 2025년 4분기");
        assert_eq!(decode_text(&euc).as_deref(), Some("넷마블 2025년 4분기"));

        let mut utf16 = vec![0xFF, 0xFE];
        for u in "call".encode_utf16() {
            utf16.extend_from_slice(&u.to_le_bytes());
        }
        assert_eq!(decode_text(&utf16).as_deref(), Some("call"));
    }

    #[tokio::test]
    async fn unsupported_extension_is_a_fetch_error() {
        let err = read_transcript(Path::new("call.pdf")).await.unwrap_err();
        assert!(matches!(err, FetchError::Unsupported(_)));
    }

    #[tokio::test]
    async fn missing_file_is_io() {
        let err = read_transcript(Path::new("/definitely/not/here.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }
}
