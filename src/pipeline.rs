//! The harvest run, end to end.
//!
//! 1. **Indexing**: collect article links from the listing page
//! 2. **Deduplication**: drop links already in the historical table (optional)
//! 3. **Fetching**: read categories, author and update date from each article
//! 4. **Output**: hand the records to the configured sink
//!
//! Each stage absorbs its own failures. The only early exit is having no
//! article left to process, in which case the sink is not called.

use crate::config::Config;
use crate::fetchers::{Fetcher, PageFetcher};
use crate::history::{self, HistorySource, WarehouseHistory};
use crate::outputs::{RecordSink, Sink};
use crate::scrapers::additude;
use crate::warehouse::WarehouseClient;
use std::error::Error;
use std::time::Duration;
use tracing::{info, instrument};

/// Outcome of the sink stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Nothing to write; the sink was not called.
    Skipped,
    Written,
    Failed,
}

/// Counts from one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Links found on the listing page.
    pub collected: usize,
    /// URLs loaded from the historical table.
    pub known: usize,
    /// Links left after deduplication, i.e. articles visited.
    pub fresh: usize,
    /// Articles written without any categories, author or update date,
    /// whether the page failed to load or matched none of the selectors.
    pub degraded: usize,
    pub written: WriteOutcome,
}

/// Listing parameters for [`run`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub listing_url: String,
    pub result_limit: usize,
    pub ready_timeout: Duration,
}

impl From<&Config> for RunOptions {
    fn from(config: &Config) -> Self {
        Self {
            listing_url: config.listing_url.clone(),
            result_limit: config.result_limit,
            ready_timeout: config.ready_timeout(),
        }
    }
}

/// Wire up clients from `config`, run the pipeline, and release the fetcher.
///
/// Errors only come from setting things up; once the run starts, failures
/// are absorbed and reported.
pub async fn harvest(config: &Config, access_token: Option<&str>) -> Result<RunSummary, Box<dyn Error>> {
    let client = if config.uses_warehouse() {
        let client = WarehouseClient::new(&config.warehouse_endpoint, &config.project_id, access_token)?;
        info!(
            project = client.project_id(),
            endpoint = %config.warehouse_endpoint,
            authenticated = access_token.is_some(),
            "Warehouse client ready"
        );
        Some(client)
    } else {
        None
    };

    let history = match (&config.historical_source, &client) {
        (Some(table), Some(client)) => Some(WarehouseHistory::new(client.clone(), table.parse()?)),
        _ => None,
    };
    let sink = Sink::from_config(config, client.as_ref())?;
    info!(sink = %sink.describe(), fetcher = ?config.fetcher, "Pipeline configured");

    let fetcher = Fetcher::launch(config).await?;
    Ok(run_and_release(&RunOptions::from(config), fetcher, history.as_ref(), &sink).await)
}

/// [`run`], then close `fetcher` however the run went.
pub async fn run_and_release<F, H, S>(options: &RunOptions, fetcher: F, history: Option<&H>, sink: &S) -> RunSummary
where
    F: PageFetcher,
    H: HistorySource,
    S: RecordSink,
{
    let summary = run(options, &fetcher, history, sink).await;
    fetcher.close().await;
    summary
}

/// Run every stage once with the given collaborators.
#[instrument(level = "info", skip_all, fields(listing_url = %options.listing_url))]
pub async fn run<F, H, S>(options: &RunOptions, fetcher: &F, history: Option<&H>, sink: &S) -> RunSummary
where
    F: PageFetcher,
    H: HistorySource,
    S: RecordSink,
{
    let links = additude::index_articles(
        fetcher,
        &options.listing_url,
        options.result_limit,
        options.ready_timeout,
    )
    .await;
    let collected = links.len();

    if links.is_empty() {
        info!("No articles to scrape");
        return RunSummary {
            collected,
            known: 0,
            fresh: 0,
            degraded: 0,
            written: WriteOutcome::Skipped,
        };
    }

    let known = history::load_known_urls(history).await;
    let fresh_links = history::filter_new(links, &known);
    let fresh = fresh_links.len();
    info!(count = fresh, "New articles to scrape");

    if fresh_links.is_empty() {
        info!("No new articles to scrape");
        return RunSummary {
            collected,
            known: known.len(),
            fresh,
            degraded: 0,
            written: WriteOutcome::Skipped,
        };
    }

    let records = additude::fetch_articles(fetcher, fresh_links).await;
    let degraded = records.iter().filter(|r| r.is_degraded()).count();

    let written = match sink.write(&records).await {
        Ok(()) => WriteOutcome::Written,
        Err(_) => WriteOutcome::Failed,
    };

    RunSummary {
        collected,
        known: known.len(),
        fresh,
        degraded,
        written,
    }
}
