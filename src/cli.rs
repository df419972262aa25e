//! Command-line interface definitions for the ADDitude harvester.
//!
//! Every flag is optional: with no arguments the harvester runs with its
//! built-in configuration (see [`crate::config`]). Flags override values from
//! the `--config` YAML file.

use crate::config::{DEFAULT_HISTORICAL_TABLE, FetcherKind, SinkKind};
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the ADDitude harvester.
///
/// # Examples
///
/// ```sh
/// # Front page to CSV with the built-in defaults
/// additude_harvest
///
/// # Deduplicate against the historical table and append to BigQuery
/// additude_harvest --historical-source --sink-kind warehouse
///
/// # Render pages with headless Chromium
/// additude_harvest --fetcher chrome --chrome-binary /usr/bin/chromium
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Listing page to collect article links from
    #[arg(long)]
    pub listing_url: Option<String>,

    /// Maximum number of article links to collect
    #[arg(short = 'n', long)]
    pub result_limit: Option<usize>,

    /// Fully-qualified table of already ingested URLs (bare flag uses the default table)
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_HISTORICAL_TABLE)]
    pub historical_source: Option<String>,

    /// Skip deduplication even if the config file names a historical table
    #[arg(long, conflicts_with = "historical_source")]
    pub no_history: bool,

    /// Where to write the harvested records
    #[arg(long, value_enum)]
    pub sink_kind: Option<SinkKind>,

    /// Output file path, or `project.dataset.table` for the warehouse sink
    #[arg(short, long)]
    pub sink_destination: Option<String>,

    /// Google Cloud project that runs warehouse queries
    #[arg(long, env = "BIGQUERY_PROJECT_ID")]
    pub project_id: Option<String>,

    /// How pages are retrieved
    #[arg(long, value_enum)]
    pub fetcher: Option<FetcherKind>,

    /// Chromium executable used by the chrome fetcher
    #[arg(long, env = "CHROME_BIN")]
    pub chrome_binary: Option<String>,

    /// Seconds to pause after every browser page load
    #[arg(long)]
    pub page_delay_secs: Option<u64>,

    /// BigQuery REST endpoint
    #[arg(long, env = "BIGQUERY_ENDPOINT")]
    pub warehouse_endpoint: Option<String>,

    /// OAuth bearer token for BigQuery
    #[arg(long, env = "BIGQUERY_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,
}
