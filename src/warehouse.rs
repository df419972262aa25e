//! Minimal BigQuery v2 REST client.
//!
//! Only what the harvester needs:
//! - [`WarehouseClient::query_strings`]: run a standard-SQL query and read
//!   its first column, following result pages until the job is done
//! - [`WarehouseClient::insert_rows`]: streaming append (`tabledata.insertAll`)
//! - [`WarehouseClient::create_table`]: create a table from a field list
//!
//! Authentication is an optional bearer token supplied by the caller.

use crate::utils::truncate_for_log;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// How long BigQuery may hold a query request open before answering.
const QUERY_TIMEOUT_MS: u64 = 10_000;

pub type Result<T> = std::result::Result<T, WarehouseError>;

#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("{rows} row(s) rejected: {message}")]
    Rejected { rows: usize, message: String },

    #[error("invalid table reference {0:?}: expected project.dataset.table")]
    InvalidTable(String),
}

impl From<reqwest::Error> for WarehouseError {
    fn from(err: reqwest::Error) -> Self {
        WarehouseError::Network(err.to_string())
    }
}

impl WarehouseError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, WarehouseError::Api { status, .. } if *status == StatusCode::NOT_FOUND.as_u16())
    }
}

/// A fully-qualified `project.dataset.table` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl FromStr for TableRef {
    type Err = WarehouseError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().trim_matches('`').split('.').collect();
        match parts.as_slice() {
            [project, dataset, table]
                if !project.is_empty() && !dataset.is_empty() && !table.is_empty() =>
            {
                Ok(Self {
                    project: project.to_string(),
                    dataset: dataset.to_string(),
                    table: table.to_string(),
                })
            }
            _ => Err(WarehouseError::InvalidTable(s.to_string())),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// A column in a table schema.
#[derive(Debug, Clone, Serialize)]
pub struct FieldSchema {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub field_type: &'static str,
    pub mode: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    job_reference: Option<JobReference>,
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    rows: Vec<TableRow>,
    page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    v: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<InsertError>,
}

#[derive(Debug, Deserialize)]
struct InsertError {
    index: usize,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    reason: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Debug, Clone)]
pub struct WarehouseClient {
    client: Client,
    base_url: String,
    project_id: String,
    token: Option<String>,
}

impl WarehouseClient {
    pub fn new(base_url: &str, project_id: &str, token: Option<&str>) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            token: token.map(String::from),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WarehouseError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }
        Ok(response.json().await?)
    }

    /// Run `sql` in the client's project and collect the first column as strings.
    /// NULL cells are skipped.
    #[instrument(level = "info", skip(self))]
    pub async fn query_strings(&self, sql: &str) -> Result<Vec<String>> {
        let path = format!("/projects/{}/queries", encode(&self.project_id));
        let body = json!({
            "query": sql,
            "useLegacySql": false,
            "timeoutMs": QUERY_TIMEOUT_MS,
        });
        let mut page: QueryResponse = self.send(self.request(Method::POST, &path).json(&body)).await?;

        let mut values = Vec::new();
        loop {
            values.extend(first_column(&page.rows));
            if page.job_complete && page.page_token.is_none() {
                break;
            }
            let Some(job) = page.job_reference.clone() else {
                break;
            };
            let page_token = page.page_token.clone();
            debug!(job_id = %job.job_id, fetched = values.len(), "Fetching more query results");
            page = self.query_results(&job, page_token.as_deref()).await?;
        }

        info!(count = values.len(), "Query finished");
        Ok(values)
    }

    async fn query_results(&self, job: &JobReference, page_token: Option<&str>) -> Result<QueryResponse> {
        let path = format!(
            "/projects/{}/queries/{}",
            encode(&self.project_id),
            encode(&job.job_id)
        );
        let mut params = vec![("timeoutMs", QUERY_TIMEOUT_MS.to_string())];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        if let Some(location) = &job.location {
            params.push(("location", location.clone()));
        }
        self.send(self.request(Method::GET, &path).query(&params)).await
    }

    /// Append `rows` with a streaming insert. Any row-level error fails the call.
    #[instrument(level = "info", skip_all, fields(table = %table, count = rows.len()))]
    pub async fn insert_rows<T: Serialize>(&self, table: &TableRef, rows: &[T]) -> Result<()> {
        let path = format!("{}/insertAll", table_path(table));
        let body = json!({
            "rows": rows.iter().map(|row| json!({ "json": row })).collect::<Vec<_>>(),
        });
        let response: InsertAllResponse = self.send(self.request(Method::POST, &path).json(&body)).await?;
        check_insert_errors(response)
    }

    /// Create `table` with the given columns.
    #[instrument(level = "info", skip_all, fields(table = %table))]
    pub async fn create_table(&self, table: &TableRef, columns: &[FieldSchema]) -> Result<()> {
        let path = format!(
            "/projects/{}/datasets/{}/tables",
            encode(&table.project),
            encode(&table.dataset)
        );
        let body = json!({
            "tableReference": {
                "projectId": table.project,
                "datasetId": table.dataset,
                "tableId": table.table,
            },
            "schema": { "fields": columns },
        });
        let _: Value = self.send(self.request(Method::POST, &path).json(&body)).await?;
        info!("Created table");
        Ok(())
    }
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

fn table_path(table: &TableRef) -> String {
    format!(
        "/projects/{}/datasets/{}/tables/{}",
        encode(&table.project),
        encode(&table.dataset),
        encode(&table.table)
    )
}

fn first_column(rows: &[TableRow]) -> impl Iterator<Item = String> + '_ {
    rows.iter()
        .filter_map(|row| row.f.first())
        .filter_map(|cell| match &cell.v {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
}

fn check_insert_errors(response: InsertAllResponse) -> Result<()> {
    let Some(first) = response.insert_errors.first() else {
        return Ok(());
    };
    let detail = first
        .errors
        .iter()
        .map(|e| {
            format!(
                "{}: {}",
                e.reason.as_deref().unwrap_or("unknown"),
                e.message.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("; ");
    Err(WarehouseError::Rejected {
        rows: response.insert_errors.len(),
        message: format!("row {}: {}", first.index, detail),
    })
}

/// The `error.message` of a Google API error body, or the raw body.
fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => parsed.error.message,
        Err(_) => truncate_for_log(body.trim(), 300),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_ref_parsing() {
        let table: TableRef = "data-444203.addtitude.historical".parse().unwrap();
        assert_eq!(table.project, "data-444203");
        assert_eq!(table.dataset, "addtitude");
        assert_eq!(table.table, "historical");
        assert_eq!(table.to_string(), "data-444203.addtitude.historical");

        let quoted: TableRef = "`p.d.t`".parse().unwrap();
        assert_eq!(quoted.to_string(), "p.d.t");
    }

    #[test]
    fn test_table_ref_rejects_partial_references() {
        for bad in ["addtitude.historical", "historical", "p..t", "a.b.c.d", ""] {
            assert!(
                matches!(bad.parse::<TableRef>(), Err(WarehouseError::InvalidTable(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_table_path_encodes_segments() {
        let table: TableRef = "data-444203.addtitude.streaming".parse().unwrap();
        assert_eq!(
            table_path(&table),
            "/projects/data-444203/datasets/addtitude/tables/streaming"
        );
    }

    #[test]
    fn test_query_response_first_column() {
        let page: QueryResponse = serde_json::from_str(
            r#"{
                "kind": "bigquery#queryResponse",
                "jobReference": {"projectId": "data-444203", "jobId": "job_1", "location": "US"},
                "jobComplete": true,
                "totalRows": "3",
                "rows": [
                    {"f": [{"v": "https://www.additudemag.com/a/"}]},
                    {"f": [{"v": null}]},
                    {"f": [{"v": "https://www.additudemag.com/b/"}]}
                ]
            }"#,
        )
        .unwrap();

        assert!(page.job_complete);
        assert!(page.page_token.is_none());
        assert_eq!(page.job_reference.unwrap().location.as_deref(), Some("US"));
        let urls: Vec<String> = first_column(&page.rows).collect();
        assert_eq!(urls, vec!["https://www.additudemag.com/a/", "https://www.additudemag.com/b/"]);
    }

    #[test]
    fn test_incomplete_query_response_has_no_rows() {
        let page: QueryResponse = serde_json::from_str(
            r#"{"jobReference": {"projectId": "p", "jobId": "job_2"}, "jobComplete": false}"#,
        )
        .unwrap();
        assert!(!page.job_complete);
        assert!(page.rows.is_empty());
    }

    #[test]
    fn test_insert_errors_become_rejection() {
        let ok: InsertAllResponse = serde_json::from_str(r#"{"kind": "bigquery#tableDataInsertAllResponse"}"#).unwrap();
        assert!(check_insert_errors(ok).is_ok());

        let rejected: InsertAllResponse = serde_json::from_str(
            r#"{"insertErrors": [
                {"index": 1, "errors": [{"reason": "invalid", "message": "no such field: Foo"}]},
                {"index": 2, "errors": [{"reason": "stopped", "message": ""}]}
            ]}"#,
        )
        .unwrap();
        match check_insert_errors(rejected) {
            Err(WarehouseError::Rejected { rows, message }) => {
                assert_eq!(rows, 2);
                assert!(message.contains("row 1"));
                assert!(message.contains("no such field: Foo"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_api_error_message() {
        let body = r#"{"error": {"code": 404, "message": "Not found: Table data-444203:addtitude.streaming", "status": "NOT_FOUND"}}"#;
        assert_eq!(
            api_error_message(body),
            "Not found: Table data-444203:addtitude.streaming"
        );
        assert_eq!(api_error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_not_found_detection() {
        let err = WarehouseError::Api { status: 404, message: "Not found".to_string() };
        assert!(err.is_not_found());
        let err = WarehouseError::Api { status: 403, message: "Denied".to_string() };
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_query_follows_job_and_page_tokens() {
        let server = crate::test_server::StubServer::start(vec![
            (200, r#"{"jobReference": {"projectId": "p", "jobId": "job_1", "location": "US"}, "jobComplete": false}"#),
            (200, r#"{"jobReference": {"projectId": "p", "jobId": "job_1", "location": "US"}, "jobComplete": true,
                      "pageToken": "page-2", "rows": [{"f": [{"v": "https://www.additudemag.com/a/"}]}]}"#),
            (200, r#"{"jobReference": {"projectId": "p", "jobId": "job_1", "location": "US"}, "jobComplete": true,
                      "rows": [{"f": [{"v": null}]}, {"f": [{"v": "https://www.additudemag.com/b/"}]}]}"#),
        ])
        .await;
        let client = WarehouseClient::new(&server.base_url, "p", Some("token")).unwrap();

        let urls = client.query_strings("SELECT `Article URL` FROM `p.d.t`").await.unwrap();

        assert_eq!(urls, vec!["https://www.additudemag.com/a/", "https://www.additudemag.com/b/"]);
        let requests = server.requests().await;
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0], "POST /projects/p/queries");
        assert!(requests[1].starts_with("GET /projects/p/queries/job_1?"));
        assert!(!requests[1].contains("pageToken"));
        assert!(requests[2].starts_with("GET /projects/p/queries/job_1?"));
        assert!(requests[2].contains("pageToken=page-2"));
        assert!(requests[2].contains("location=US"));
    }

    #[tokio::test]
    async fn test_query_error_status_is_reported() {
        let server = crate::test_server::StubServer::start(vec![(
            403,
            r#"{"error": {"code": 403, "message": "Access Denied: Table p:d.t", "status": "PERMISSION_DENIED"}}"#,
        )])
        .await;
        let client = WarehouseClient::new(&server.base_url, "p", None).unwrap();

        match client.query_strings("SELECT 1").await {
            Err(WarehouseError::Api { status, message }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "Access Denied: Table p:d.t");
            }
            other => panic!("expected API error, got {other:?}"),
        }
        assert_eq!(server.requests().await, vec!["POST /projects/p/queries"]);
    }
}
