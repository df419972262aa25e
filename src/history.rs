//! Deduplication against previously ingested articles.
//!
//! The historical table is read once per run and never written. If it
//! cannot be read, the run carries on as if nothing had been ingested yet:
//! collecting an article twice is preferred over silently skipping it.

use crate::models::{ArticleLink, URL_COLUMN};
use crate::warehouse::{self, TableRef, WarehouseClient};
use std::collections::HashSet;
use tracing::{error, info, instrument};

/// A read-only source of already ingested article URLs.
pub trait HistorySource {
    fn describe(&self) -> String;

    async fn known_urls(&self) -> warehouse::Result<Vec<String>>;
}

/// URLs stored in a BigQuery table.
#[derive(Debug, Clone)]
pub struct WarehouseHistory {
    client: WarehouseClient,
    table: TableRef,
}

impl WarehouseHistory {
    pub fn new(client: WarehouseClient, table: TableRef) -> Self {
        Self { client, table }
    }

    pub fn query(&self) -> String {
        format!("SELECT `{URL_COLUMN}` FROM `{}`", self.table)
    }
}

impl HistorySource for WarehouseHistory {
    fn describe(&self) -> String {
        self.table.to_string()
    }

    async fn known_urls(&self) -> warehouse::Result<Vec<String>> {
        self.client.query_strings(&self.query()).await
    }
}

/// Load the known URL set, or an empty set when there is no source or it fails.
#[instrument(level = "info", skip_all)]
pub async fn load_known_urls<H: HistorySource>(source: Option<&H>) -> HashSet<String> {
    let Some(source) = source else {
        return HashSet::new();
    };
    match source.known_urls().await {
        Ok(urls) => {
            let known: HashSet<String> = urls.into_iter().collect();
            info!(count = known.len(), table = %source.describe(), "Found existing articles in historical table");
            known
        }
        Err(e) => {
            error!(table = %source.describe(), error = %e, "Error fetching existing articles; treating every article as new");
            HashSet::new()
        }
    }
}

/// Keep the links whose URL is not already known. Comparison is exact.
pub fn filter_new(batch: Vec<ArticleLink>, known: &HashSet<String>) -> Vec<ArticleLink> {
    batch.into_iter().filter(|link| !known.contains(&link.url)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::WarehouseError;

    fn link(path: &str) -> ArticleLink {
        ArticleLink {
            title: path.to_string(),
            url: format!("https://www.additudemag.com/{path}"),
        }
    }

    fn known(urls: &[&str]) -> HashSet<String> {
        urls.iter().map(|u| format!("https://www.additudemag.com/{u}")).collect()
    }

    enum FakeHistory {
        Rows(Vec<String>),
        Down,
    }

    impl HistorySource for FakeHistory {
        fn describe(&self) -> String {
            "test.history.table".to_string()
        }

        async fn known_urls(&self) -> warehouse::Result<Vec<String>> {
            match self {
                Self::Rows(rows) => Ok(rows.clone()),
                Self::Down => Err(WarehouseError::Network("connection refused".to_string())),
            }
        }
    }

    #[test]
    fn test_filter_removes_known_urls_in_order() {
        let batch = vec![link("a/"), link("b/"), link("c/")];
        let fresh = filter_new(batch, &known(&["b/"]));
        assert_eq!(fresh, vec![link("a/"), link("c/")]);
    }

    #[test]
    fn test_filter_with_empty_history_is_identity() {
        let batch = vec![link("a/"), link("b/")];
        assert_eq!(filter_new(batch.clone(), &HashSet::new()), batch);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let history = known(&["a/", "z/"]);
        let once = filter_new(vec![link("a/"), link("b/"), link("c/")], &history);
        let twice = filter_new(once.clone(), &history);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_filter_compares_urls_exactly() {
        let batch = vec![link("a/"), link("b")];
        // Neither trailing-slash nor case differences are normalised.
        let history: HashSet<String> = [
            "https://www.additudemag.com/a".to_string(),
            "https://www.additudemag.com/B".to_string(),
            "http://www.additudemag.com/a/".to_string(),
        ]
        .into();
        assert_eq!(filter_new(batch.clone(), &history), batch);
    }

    #[test]
    fn test_filter_keeps_duplicates_within_batch() {
        let batch = vec![link("a/"), link("a/")];
        assert_eq!(filter_new(batch, &HashSet::new()).len(), 2);
    }

    #[test]
    fn test_history_query() {
        let client = WarehouseClient::new("http://localhost:9050", "data-444203", None).unwrap();
        let history = WarehouseHistory::new(client, "data-444203.addtitude.historical".parse().unwrap());
        assert_eq!(
            history.query(),
            "SELECT `Article URL` FROM `data-444203.addtitude.historical`"
        );
        assert_eq!(history.describe(), "data-444203.addtitude.historical");
    }

    #[tokio::test]
    async fn test_load_known_urls() {
        let source = FakeHistory::Rows(vec!["u1".to_string(), "u2".to_string(), "u1".to_string()]);
        let urls = load_known_urls(Some(&source)).await;
        assert_eq!(urls.len(), 2);
        assert!(urls.contains("u1"));
    }

    #[tokio::test]
    async fn test_unreachable_history_fails_open() {
        let urls = load_known_urls(Some(&FakeHistory::Down)).await;
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn test_no_history_source() {
        let urls = load_known_urls::<FakeHistory>(None).await;
        assert!(urls.is_empty());
    }
}
