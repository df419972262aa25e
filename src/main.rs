//! # ADDitude Harvest
//!
//! Collects recent articles from ADDitude Magazine's front page, skips the
//! ones already ingested, reads each new article's categories, author and
//! update date, and writes the batch to a CSV file or a BigQuery table.
//!
//! ## Features
//!
//! - Plain HTTP or headless Chromium page fetching
//! - Optional deduplication against a historical BigQuery table
//! - CSV output, or streaming inserts with a shared `scraped_at` timestamp
//! - YAML config file with CLI and environment overrides
//!
//! ## Usage
//!
//! ```sh
//! additude_harvest -n 20 --historical-source --sink-kind warehouse
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Indexing**: Collect article links from the listing page
//! 2. **Deduplication**: Drop links already in the historical table
//! 3. **Fetching**: Read metadata from each new article, one page at a time
//! 4. **Output**: Write the records to the configured sink
//!
//! Stage failures are logged and absorbed; the process exits non-zero only
//! when it cannot be configured.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod fetchers;
mod history;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
#[cfg(test)]
mod test_server;
mod utils;
mod warehouse;

use cli::Cli;
use config::Config;
use pipeline::WriteOutcome;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("additude_harvest starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.config, ?args.sink_kind, ?args.fetcher, "Parsed CLI arguments");

    let config = match Config::resolve(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    info!(
        listing_url = %config.listing_url,
        result_limit = config.result_limit,
        historical_source = ?config.historical_source,
        sink_kind = ?config.sink_kind,
        destination = %config.destination(),
        "Configuration resolved"
    );

    let summary = match pipeline::harvest(&config, args.access_token.as_deref()).await {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "Could not start the harvest");
            return Err(e);
        }
    };

    let elapsed = start_time.elapsed();
    match summary.written {
        WriteOutcome::Failed => warn!("Articles were collected but could not be written"),
        WriteOutcome::Skipped => info!("Nothing written this run"),
        WriteOutcome::Written => {}
    }
    info!(
        collected = summary.collected,
        known = summary.known,
        fresh = summary.fresh,
        degraded = summary.degraded,
        written = ?summary.written,
        elapsed_secs = elapsed.as_secs_f64(),
        "Scraping process completed"
    );

    Ok(())
}
