//! CSV file sink.
//!
//! One row per record under a fixed header:
//!
//! ```text
//! Article Title,Article URL,Categories,Author,Updated On
//! Why ADHD Brains Crave Stimulation,https://www.additudemag.com/...,"['ADHD', 'Symptoms']",Jane Doe,"March 1, 2024"
//! ```
//!
//! Missing values are empty cells. The file is overwritten on every run.

use super::{RecordSink, SinkError};
use crate::models::ArticleRecord;
use crate::utils::python_list_repr;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument};

pub const HEADERS: [&str; 5] = ["Article Title", "Article URL", "Categories", "Author", "Updated On"];

#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    title: &'a str,
    url: &'a str,
    categories: String,
    author: Option<&'a str>,
    updated_on: Option<&'a str>,
}

impl<'a> From<&'a ArticleRecord> for CsvRow<'a> {
    fn from(record: &'a ArticleRecord) -> Self {
        Self {
            title: &record.title,
            url: &record.url,
            categories: python_list_repr(&record.categories),
            author: record.author.as_deref(),
            updated_on: record.updated_on.as_deref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Write `records` to `path`, truncating any existing file.
pub fn write_csv(path: &Path, records: &[ArticleRecord]) -> Result<(), SinkError> {
    let mut writer = ::csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(HEADERS)?;
    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }
    writer.flush()?;
    Ok(())
}

impl RecordSink for CsvSink {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    #[instrument(level = "info", skip_all, fields(path = %self.path.display(), count = records.len()))]
    async fn write(&self, records: &[ArticleRecord]) -> Result<(), SinkError> {
        let path = self.path.clone();
        let records = records.to_vec();
        let result = tokio::task::spawn_blocking(move || write_csv(&path, &records)).await?;
        match &result {
            Ok(()) => info!("Data saved to CSV file"),
            Err(e) => error!(error = %e, "Error saving data to CSV file"),
        }
        result
    }
}
