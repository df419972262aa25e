//! Site scrapers.
//!
//! Each scraper follows the same two-phase pattern:
//!
//! 1. **Indexing**: collect article links from the site's listing page
//! 2. **Fetching**: visit every link and read the article's metadata
//!
//! # Supported Sources
//!
//! | Source | Module | Notes |
//! |--------|--------|-------|
//! | ADDitude Magazine | [`additude`] | WordPress front page, `rel="bookmark"` permalinks |
//!
//! Selector logic lives in pure `extract_*` functions over parsed HTML;
//! the async wrappers add fetching, fault absorption and logging.

pub mod additude;
