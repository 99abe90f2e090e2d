// src/deliver/sheet.rs
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use super::{Message, Sink};
use crate::error::DeliveryError;
use crate::record::Row;

/// Appends one CSV row per message. The header row is written when the file
/// is new or empty; an existing header must match the row's columns.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn append_row(path: &Path, row: &Row) -> Result<(), DeliveryError> {
    let io_err = |source| DeliveryError::Io {
        path: path.to_path_buf(),
        source,
    };
    let csv_err = |source| DeliveryError::Csv {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(io_err)?;
    }
    let fresh = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    if !fresh {
        let existing = existing_header(path).map_err(csv_err)?;
        if !existing.iter().map(String::as_str).eq(row.columns()) {
            return Err(DeliveryError::HeaderMismatch {
                path: path.to_path_buf(),
                existing,
                row: row.columns().map(String::from).collect(),
            });
        }
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;

    let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if fresh {
        w.write_record(row.columns()).map_err(csv_err)?;
    }
    w.write_record(row.cells()).map_err(csv_err)?;
    w.flush().map_err(io_err)?;
    Ok(())
}

fn existing_header(path: &Path) -> Result<Vec<String>, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    Ok(rdr.headers()?.iter().map(String::from).collect())
}

#[async_trait::async_trait]
impl Sink for CsvSink {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn target(&self) -> String {
        self.path.display().to_string()
    }

    async fn deliver(&self, msg: &Message) -> Result<(), DeliveryError> {
        let row = msg.row.as_ref().ok_or(DeliveryError::MissingRow)?;
        append_row(&self.path, row)
    }
}
