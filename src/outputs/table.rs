//! BigQuery table sink.
//!
//! Rows are appended, never updated. Every row of a write carries the same
//! `scraped_at` timestamp, taken when the write starts. If the table does
//! not exist yet it is created with [`schema`] and the append is retried once.

use super::{RecordSink, SinkError};
use crate::models::ArticleRecord;
use crate::warehouse::{FieldSchema, TableRef, WarehouseClient};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

pub const SCRAPED_AT_COLUMN: &str = "scraped_at";

#[derive(Debug, Serialize)]
pub struct WarehouseRow<'a> {
    #[serde(flatten)]
    pub record: &'a ArticleRecord,
    pub scraped_at: DateTime<Utc>,
}

/// Rows for one write, all stamped with `scraped_at`.
pub fn stamp_rows(records: &[ArticleRecord], scraped_at: DateTime<Utc>) -> Vec<WarehouseRow<'_>> {
    records
        .iter()
        .map(|record| WarehouseRow { record, scraped_at })
        .collect()
}

/// Columns of the streaming table.
pub fn schema() -> Vec<FieldSchema> {
    vec![
        FieldSchema { name: "Article Title", field_type: "STRING", mode: "NULLABLE" },
        FieldSchema { name: "Article URL", field_type: "STRING", mode: "NULLABLE" },
        FieldSchema { name: "Categories", field_type: "STRING", mode: "REPEATED" },
        FieldSchema { name: "Author", field_type: "STRING", mode: "NULLABLE" },
        FieldSchema { name: "Updated On", field_type: "STRING", mode: "NULLABLE" },
        FieldSchema { name: SCRAPED_AT_COLUMN, field_type: "TIMESTAMP", mode: "NULLABLE" },
    ]
}

#[derive(Debug, Clone)]
pub struct WarehouseSink {
    client: WarehouseClient,
    table: TableRef,
}

impl WarehouseSink {
    pub fn new(client: WarehouseClient, table: TableRef) -> Self {
        Self { client, table }
    }

    async fn append(&self, rows: &[WarehouseRow<'_>]) -> Result<(), SinkError> {
        match self.client.insert_rows(&self.table, rows).await {
            Err(e) if e.is_not_found() => {
                warn!(table = %self.table, "Destination table missing; creating it");
                self.client.create_table(&self.table, &schema()).await?;
                self.client.insert_rows(&self.table, rows).await?;
                Ok(())
            }
            other => Ok(other?),
        }
    }
}

impl RecordSink for WarehouseSink {
    fn describe(&self) -> String {
        self.table.to_string()
    }

    #[instrument(level = "info", skip_all, fields(table = %self.table, count = records.len()))]
    async fn write(&self, records: &[ArticleRecord]) -> Result<(), SinkError> {
        let scraped_at = Utc::now();
        let rows = stamp_rows(records, scraped_at);
        let result = self.append(&rows).await;
        match &result {
            Ok(()) => info!(%scraped_at, "Data saved to warehouse table"),
            Err(e) => error!(error = %e, "Error saving data to warehouse table"),
        }
        result
    }
}
