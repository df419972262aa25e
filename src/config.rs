//! Runtime configuration.
//!
//! Values are layered: built-in defaults (the values the harvester has always
//! used), then an optional YAML file, then command-line flags. Running with
//! no arguments harvests the ADDitude front page into a local CSV file.
//!
//! # YAML example
//!
//! ```yaml
//! listing_url: https://www.additudemag.com/
//! result_limit: 20
//! project_id: data-444203
//! historical_source: data-444203.addtitude.historical
//! sink_kind: warehouse
//! sink_destination: data-444203.addtitude.streaming
//! fetcher: chrome
//! ```

use crate::cli::Cli;
use crate::warehouse::TableRef;
use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_LISTING_URL: &str = "https://www.additudemag.com/";
pub const DEFAULT_RESULT_LIMIT: usize = 20;
pub const DEFAULT_PROJECT_ID: &str = "data-444203";
pub const DEFAULT_HISTORICAL_TABLE: &str = "data-444203.addtitude.historical";
pub const DEFAULT_STREAMING_TABLE: &str = "data-444203.addtitude.streaming";
pub const DEFAULT_OUTPUT_FILE: &str = "additude_articles_detailed.csv";
pub const DEFAULT_WAREHOUSE_ENDPOINT: &str = "https://bigquery.googleapis.com/bigquery/v2";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Where the harvested records go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Overwrite a local CSV file.
    File,
    /// Append to a BigQuery table.
    Warehouse,
}

/// How pages are retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FetcherKind {
    /// Plain HTTP GET.
    Http,
    /// Headless Chromium, for pages that render client-side.
    Chrome,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub listing_url: String,
    pub result_limit: usize,
    /// Fully-qualified table holding previously ingested URLs.
    pub historical_source: Option<String>,
    pub sink_kind: SinkKind,
    /// File path for [`SinkKind::File`], `project.dataset.table` for [`SinkKind::Warehouse`].
    /// Unset means the default destination for the sink kind.
    pub sink_destination: Option<String>,
    pub project_id: String,
    pub fetcher: FetcherKind,
    pub chrome_binary: String,
    /// Pause after every browser page load.
    pub page_delay_secs: u64,
    /// Bound on waiting for the listing page's article links to appear.
    pub ready_timeout_secs: u64,
    /// Bound on a single browser page load.
    pub load_timeout_secs: u64,
    pub warehouse_endpoint: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_LISTING_URL.to_string(),
            result_limit: DEFAULT_RESULT_LIMIT,
            historical_source: None,
            sink_kind: SinkKind::File,
            sink_destination: None,
            project_id: DEFAULT_PROJECT_ID.to_string(),
            fetcher: FetcherKind::Http,
            chrome_binary: "chromium".to_string(),
            page_delay_secs: 3,
            ready_timeout_secs: 10,
            load_timeout_secs: 30,
            warehouse_endpoint: DEFAULT_WAREHOUSE_ENDPOINT.to_string(),
        }
    }
}

impl Config {
    /// Defaults, overlaid with the YAML file at `path` when one is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&raw)?;
        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Build the effective configuration from CLI arguments.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = Self::load(cli.config.as_deref())?;
        config.apply_overrides(cli);
        config.validate()?;
        debug!(?config, "Resolved configuration");
        Ok(config)
    }

    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(url) = &cli.listing_url {
            self.listing_url = url.clone();
        }
        if let Some(limit) = cli.result_limit {
            self.result_limit = limit;
        }
        if let Some(table) = &cli.historical_source {
            self.historical_source = Some(table.clone());
        }
        if cli.no_history {
            self.historical_source = None;
        }
        if let Some(kind) = cli.sink_kind {
            self.sink_kind = kind;
        }
        if let Some(destination) = &cli.sink_destination {
            self.sink_destination = Some(destination.clone());
        }
        if let Some(project) = &cli.project_id {
            self.project_id = project.clone();
        }
        if let Some(fetcher) = cli.fetcher {
            self.fetcher = fetcher;
        }
        if let Some(binary) = &cli.chrome_binary {
            self.chrome_binary = binary.clone();
        }
        if let Some(secs) = cli.page_delay_secs {
            self.page_delay_secs = secs;
        }
        if let Some(endpoint) = &cli.warehouse_endpoint {
            self.warehouse_endpoint = endpoint.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let listing = url::Url::parse(&self.listing_url)
            .map_err(|e| ConfigError::Invalid(format!("listing_url {:?}: {e}", self.listing_url)))?;
        if !matches!(listing.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "listing_url must be http(s), got {}",
                listing.scheme()
            )));
        }

        let destination = self.destination();
        if destination.trim().is_empty() {
            return Err(ConfigError::Invalid("sink_destination is empty".to_string()));
        }
        if self.sink_kind == SinkKind::Warehouse {
            destination
                .parse::<TableRef>()
                .map_err(|e| ConfigError::Invalid(format!("sink_destination: {e}")))?;
        }
        if let Some(table) = &self.historical_source {
            table
                .parse::<TableRef>()
                .map_err(|e| ConfigError::Invalid(format!("historical_source: {e}")))?;
        }
        if self.uses_warehouse() && self.project_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "project_id is required when a warehouse table is used".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured destination, or the default one for the sink kind.
    pub fn destination(&self) -> &str {
        match (&self.sink_destination, self.sink_kind) {
            (Some(destination), _) => destination,
            (None, SinkKind::File) => DEFAULT_OUTPUT_FILE,
            (None, SinkKind::Warehouse) => DEFAULT_STREAMING_TABLE,
        }
    }

    pub fn uses_warehouse(&self) -> bool {
        self.sink_kind == SinkKind::Warehouse || self.historical_source.is_some()
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_secs(self.page_delay_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }
}
