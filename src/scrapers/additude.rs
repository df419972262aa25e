//! ADDitude Magazine scraper.
//!
//! The front page of [ADDitude](https://www.additudemag.com/) links every
//! article with a `rel="bookmark"` permalink. Article pages carry:
//!
//! | Field | Selector |
//! |-------|----------|
//! | Categories | `.article-breadcrumbs a` (all, in document order) |
//! | Author | `.entry-authors .author a` (first) |
//! | Updated on | `.entry-header__updated-on` (first, `"Updated on "` prefix removed) |
//!
//! Every field is read independently: a missing element leaves only that
//! field empty.

use crate::fetchers::PageFetcher;
use crate::models::{ArticleDetails, ArticleLink, ArticleRecord};
use crate::utils::element_text;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const UPDATED_ON_PREFIX: &str = "Updated on ";

pub static BOOKMARK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[rel~="bookmark"]"#).unwrap());
static CATEGORY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".article-breadcrumbs a").unwrap());
static AUTHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".entry-authors .author a").unwrap());
static UPDATED_ON_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".entry-header__updated-on").unwrap());

/// Collect at most `limit` article links from the listing page.
///
/// Waits up to `ready_timeout` for the permalinks to appear. A page that
/// cannot be fetched, or never shows any permalink, yields an empty list:
/// the caller treats that as "no new articles".
#[instrument(level = "info", skip(fetcher))]
pub async fn index_articles<F: PageFetcher>(
    fetcher: &F,
    listing_url: &str,
    limit: usize,
    ready_timeout: Duration,
) -> Vec<ArticleLink> {
    let base = match Url::parse(listing_url) {
        Ok(base) => base,
        Err(e) => {
            warn!(error = %e, "Listing URL does not parse");
            return Vec::new();
        }
    };

    let html = match fetcher
        .fetch_until(listing_url, &BOOKMARK_SELECTOR, ready_timeout)
        .await
    {
        Ok(html) => html,
        Err(e) => {
            warn!(error = %e, "Error fetching article links");
            return Vec::new();
        }
    };

    let links = extract_links(&Html::parse_document(&html), &base, limit);
    info!(count = links.len(), "Articles found on the listing page");
    let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
    debug!(?urls, "Article URLs");
    links
}

/// The first `limit` permalinks on the page, in page order.
///
/// Anchors without an `href` are not article links and do not count
/// towards the limit. Relative addresses are resolved against `base`.
pub fn extract_links(document: &Html, base: &Url, limit: usize) -> Vec<ArticleLink> {
    document
        .select(&BOOKMARK_SELECTOR)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let url = base.join(href.trim()).ok()?;
            Some(ArticleLink {
                title: element_text(anchor),
                url: url.to_string(),
            })
        })
        .take(limit)
        .collect()
}

/// Visit every link in order and attach its metadata.
///
/// Always returns one record per link: a page that cannot be fetched
/// gets empty details rather than being dropped.
#[instrument(level = "info", skip_all, fields(count = links.len()))]
pub async fn fetch_articles<F: PageFetcher>(fetcher: &F, links: Vec<ArticleLink>) -> Vec<ArticleRecord> {
    let records: Vec<ArticleRecord> = stream::iter(links)
        .then(|link| fetch_article(fetcher, link))
        .collect()
        .await;

    let degraded = records.iter().filter(|r| r.is_degraded()).count();
    info!(count = records.len(), degraded, "Fetched article details");
    records
}

/// Fetch a single article page and read its metadata.
#[instrument(level = "info", skip_all, fields(url = %link.url))]
pub async fn fetch_article<F: PageFetcher>(fetcher: &F, link: ArticleLink) -> ArticleRecord {
    info!(title = %link.title, "Scraping article");
    match fetcher.fetch(&link.url).await {
        Ok(html) => {
            let details = extract_details(&Html::parse_document(&html));
            info!(title = %link.title, "Article scraped successfully");
            ArticleRecord::new(link, details)
        }
        Err(e) => {
            warn!(title = %link.title, error = %e, "Error fetching article details");
            ArticleRecord::new(link, ArticleDetails::default())
        }
    }
}

/// Read categories, author and update date from an article page.
pub fn extract_details(document: &Html) -> ArticleDetails {
    ArticleDetails {
        categories: extract_categories(document),
        author: extract_author(document),
        updated_on: extract_updated_on(document),
    }
}

fn extract_categories(document: &Html) -> Vec<String> {
    document.select(&CATEGORY_SELECTOR).map(element_text).collect()
}

fn extract_author(document: &Html) -> Option<String> {
    document.select(&AUTHOR_SELECTOR).next().map(element_text)
}

fn extract_updated_on(document: &Html) -> Option<String> {
    document
        .select(&UPDATED_ON_SELECTOR)
        .next()
        .map(|el| strip_updated_prefix(&element_text(el)).to_string())
}

/// Remove a leading `"Updated on "`; anything else passes through.
pub fn strip_updated_prefix(text: &str) -> &str {
    text.strip_prefix(UPDATED_ON_PREFIX).unwrap_or(text)
}
