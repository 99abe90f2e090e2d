// src/deliver/document.rs
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{Message, Sink};
use crate::error::DeliveryError;

#[derive(Debug, Clone)]
enum Target {
    File(PathBuf),
    /// One file per message, named by `Message::file_name`.
    Dir(PathBuf),
}

/// Appends messages to plain-text documents.
#[derive(Debug, Clone)]
pub struct DocumentSink {
    target: Target,
}

impl DocumentSink {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::File(path.into()),
        }
    }

    pub fn dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            target: Target::Dir(dir.into()),
        }
    }

    fn path_for(&self, msg: &Message) -> Result<PathBuf, DeliveryError> {
        match &self.target {
            Target::File(p) => Ok(p.clone()),
            Target::Dir(d) => msg
                .file_name
                .as_deref()
                .map(|n| d.join(n))
                .ok_or(DeliveryError::MissingFileName),
        }
    }
}

fn append(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    f.write_all(text.as_bytes())?;
    f.flush()
}

#[async_trait::async_trait]
impl Sink for DocumentSink {
    fn name(&self) -> &'static str {
        "document"
    }

    fn target(&self) -> String {
        match &self.target {
            Target::File(p) | Target::Dir(p) => p.display().to_string(),
        }
    }

    async fn deliver(&self, msg: &Message) -> Result<(), DeliveryError> {
        let path = self.path_for(msg)?;
        let mut text = String::new();
        if !msg.subject.is_empty() {
            text.push_str(&msg.subject);
            text.push_str("\n\n");
        }
        text.push_str(msg.body.trim_end());
        text.push_str("\n\n");
        append(&path, &text).map_err(|source| DeliveryError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), body_hash = %crate::text::anon_hash(&msg.body), "document appended");
        Ok(())
    }
}
