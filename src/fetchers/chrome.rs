//! Headless Chromium fetcher.
//!
//! Each page load runs `chromium --headless --dump-dom` against a browser
//! profile directory created once at [`ChromeFetcher::launch`]. Scripts get a
//! virtual time budget equal to the page delay, and the fetcher sleeps for
//! the same delay after every load so pages rendered client-side have
//! settled and the site is not hammered.
//!
//! The profile directory is the session: [`PageFetcher::close`] removes it,
//! and dropping the fetcher removes it too.

use super::{FetchError, PageFetcher, contains_marker};
use scraper::Selector;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Pause between attempts while waiting for a marker element.
const MARKER_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct ChromeFetcher {
    binary: String,
    profile: TempDir,
    page_delay: Duration,
    load_timeout: Duration,
}

impl ChromeFetcher {
    /// Check that `binary` runs and create the session's profile directory.
    #[instrument(level = "info", skip(page_delay, load_timeout))]
    pub async fn launch(
        binary: &str,
        page_delay: Duration,
        load_timeout: Duration,
    ) -> Result<Self, FetchError> {
        let output = Command::new(binary)
            .arg("--version")
            .output()
            .await
            .map_err(|e| FetchError::Browser(format!("failed to run {binary}: {e}")))?;
        if !output.status.success() {
            return Err(FetchError::Browser(format!(
                "{binary} --version exited with {}",
                output.status
            )));
        }

        let profile = tempfile::Builder::new().prefix("additude-chrome-").tempdir()?;
        info!(
            version = %String::from_utf8_lossy(&output.stdout).trim(),
            profile = %profile.path().display(),
            "Browser session started"
        );

        Ok(Self {
            binary: binary.to_string(),
            profile,
            page_delay,
            load_timeout,
        })
    }

    fn args(&self, url: &str) -> Vec<String> {
        vec![
            "--headless".to_string(),
            "--no-sandbox".to_string(),
            "--disable-gpu".to_string(),
            "--disable-dev-shm-usage".to_string(),
            format!("--user-data-dir={}", self.profile.path().display()),
            format!("--virtual-time-budget={}", self.page_delay.as_millis()),
            "--dump-dom".to_string(),
            url.to_string(),
        ]
    }

    async fn dump_dom(&self, url: &str) -> Result<String, FetchError> {
        let run = Command::new(&self.binary)
            .args(self.args(url))
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.load_timeout, run)
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                secs: self.load_timeout.as_secs(),
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::Browser(format!(
                "exited with {} loading {url}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl PageFetcher for ChromeFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let html = self.dump_dom(url).await?;
        tokio::time::sleep(self.page_delay).await;
        debug!(bytes = html.len(), "Rendered page");
        Ok(html)
    }

    /// Reload until `marker` shows up or `wait` has elapsed.
    #[instrument(level = "debug", skip(self, marker))]
    async fn fetch_until(
        &self,
        url: &str,
        marker: &Selector,
        wait: Duration,
    ) -> Result<String, FetchError> {
        let deadline = Instant::now() + wait;
        loop {
            let html = self.fetch(url).await?;
            if contains_marker(&html, marker) {
                return Ok(html);
            }
            if Instant::now() + MARKER_POLL_INTERVAL >= deadline {
                return Err(FetchError::MarkerMissing { url: url.to_string() });
            }
            debug!("Marker not rendered yet; reloading");
            tokio::time::sleep(MARKER_POLL_INTERVAL).await;
        }
    }

    async fn close(self) {
        let path = self.profile.path().display().to_string();
        match self.profile.close() {
            Ok(()) => info!(profile = %path, "Browser session closed"),
            Err(e) => warn!(profile = %path, error = %e, "Failed to remove browser profile"),
        }
    }
}
