//! Sinks for harvested records.
//!
//! # Submodules
//!
//! - [`file`]: overwrites a local CSV file with the run's records
//! - [`table`]: appends the run's records to a BigQuery table
//!
//! Both write the whole batch at once; a failed write is reported and the
//! batch is not retried or saved anywhere else.

pub mod file;
pub mod table;

use crate::config::{Config, SinkKind};
use crate::models::ArticleRecord;
use crate::warehouse::{TableRef, WarehouseClient, WarehouseError};
use thiserror::Error;

pub use file::CsvSink;
pub use table::WarehouseSink;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("sink not configured: {0}")]
    Unconfigured(String),
}

/// Destination for a run's records.
pub trait RecordSink {
    /// Human-readable destination, for logs.
    fn describe(&self) -> String;

    async fn write(&self, records: &[ArticleRecord]) -> Result<(), SinkError>;
}

/// The sink selected by [`Config::sink_kind`].
#[derive(Debug)]
pub enum Sink {
    File(CsvSink),
    Warehouse(WarehouseSink),
}

impl Sink {
    /// Build the configured sink. The warehouse sink needs `client`.
    pub fn from_config(config: &Config, client: Option<&WarehouseClient>) -> Result<Self, SinkError> {
        match config.sink_kind {
            SinkKind::File => Ok(Self::File(CsvSink::new(config.destination()))),
            SinkKind::Warehouse => {
                let table: TableRef = config.destination().parse()?;
                let client = client
                    .cloned()
                    .ok_or_else(|| SinkError::Unconfigured("warehouse sink needs a client".to_string()))?;
                Ok(Self::Warehouse(WarehouseSink::new(client, table)))
            }
        }
    }
}

impl RecordSink for Sink {
    fn describe(&self) -> String {
        match self {
            Self::File(s) => s.describe(),
            Self::Warehouse(s) => s.describe(),
        }
    }

    async fn write(&self, records: &[ArticleRecord]) -> Result<(), SinkError> {
        match self {
            Self::File(s) => s.write(records).await,
            Self::Warehouse(s) => s.write(records).await,
        }
    }
}
