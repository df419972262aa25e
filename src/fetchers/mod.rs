//! Page fetchers: how listing and article pages are retrieved.
//!
//! The scrapers only see HTML strings; where that HTML comes from is a
//! [`PageFetcher`] chosen at configuration time.
//!
//! | Fetcher | Module | Notes |
//! |---------|--------|-------|
//! | Plain HTTP | [`http`] | One GET per page, non-2xx is an error |
//! | Headless Chromium | [`chrome`] | Renders scripts, pauses after each load |

pub mod chrome;
pub mod http;

use crate::config::{Config, FetcherKind};
use scraper::{Html, Selector};
use std::time::Duration;
use thiserror::Error;

pub use chrome::ChromeFetcher;
pub use http::HttpFetcher;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("browser failed: {0}")]
    Browser(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {secs}s loading {url}")]
    Timeout { url: String, secs: u64 },

    #[error("expected elements never appeared on {url}")]
    MarkerMissing { url: String },
}

/// Retrieves the HTML of a page.
pub trait PageFetcher {
    /// Fetch `url` and return its HTML.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;

    /// Fetch `url`, waiting at most `wait` for an element matching `marker`.
    ///
    /// The default fetches once: static HTML either has the marker or never will.
    async fn fetch_until(
        &self,
        url: &str,
        marker: &Selector,
        _wait: Duration,
    ) -> Result<String, FetchError> {
        let html = self.fetch(url).await?;
        if contains_marker(&html, marker) {
            Ok(html)
        } else {
            Err(FetchError::MarkerMissing { url: url.to_string() })
        }
    }

    /// Release whatever the fetcher acquired.
    async fn close(self)
    where
        Self: Sized,
    {
    }
}

pub(crate) fn contains_marker(html: &str, marker: &Selector) -> bool {
    Html::parse_document(html).select(marker).next().is_some()
}

/// The fetcher selected by [`Config::fetcher`].
#[derive(Debug)]
pub enum Fetcher {
    Http(HttpFetcher),
    Chrome(ChromeFetcher),
}

impl Fetcher {
    /// Build the configured fetcher, starting a browser session if needed.
    pub async fn launch(config: &Config) -> Result<Self, FetchError> {
        match config.fetcher {
            FetcherKind::Http => Ok(Self::Http(HttpFetcher::new()?)),
            FetcherKind::Chrome => Ok(Self::Chrome(
                ChromeFetcher::launch(
                    &config.chrome_binary,
                    config.page_delay(),
                    config.load_timeout(),
                )
                .await?,
            )),
        }
    }
}

impl PageFetcher for Fetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        match self {
            Self::Http(f) => f.fetch(url).await,
            Self::Chrome(f) => f.fetch(url).await,
        }
    }

    async fn fetch_until(
        &self,
        url: &str,
        marker: &Selector,
        wait: Duration,
    ) -> Result<String, FetchError> {
        match self {
            Self::Http(f) => f.fetch_until(url, marker, wait).await,
            Self::Chrome(f) => f.fetch_until(url, marker, wait).await,
        }
    }

    async fn close(self) {
        match self {
            Self::Http(f) => f.close().await,
            Self::Chrome(f) => f.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticPage(&'static str);

    impl PageFetcher for StaticPage {
        async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_contains_marker() {
        let marker = Selector::parse(r#"a[rel~="bookmark"]"#).unwrap();
        assert!(contains_marker(r#"<a rel="bookmark" href="/a">A</a>"#, &marker));
        assert!(!contains_marker(r#"<a href="/a">A</a>"#, &marker));
    }

    #[tokio::test]
    async fn test_default_fetch_until_reports_missing_marker() {
        let marker = Selector::parse("article").unwrap();
        let fetcher = StaticPage("<html><body><p>maintenance</p></body></html>");

        let err = fetcher
            .fetch_until("https://www.additudemag.com/", &marker, Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::MarkerMissing { .. }));
    }

    #[tokio::test]
    async fn test_default_fetch_until_returns_page_with_marker() {
        let marker = Selector::parse("article").unwrap();
        let fetcher = StaticPage("<article>hi</article>");

        let html = fetcher
            .fetch_until("https://www.additudemag.com/", &marker, Duration::ZERO)
            .await
            .unwrap();
        assert!(html.contains("hi"));
    }

    #[tokio::test]
    async fn test_launch_http_fetcher_from_default_config() {
        let fetcher = Fetcher::launch(&Config::default()).await.unwrap();
        assert!(matches!(fetcher, Fetcher::Http(_)));
        fetcher.close().await;
    }
}
