//! Data models for harvested articles.
//!
//! An article moves through the pipeline in two shapes:
//! - [`ArticleLink`]: what the listing page gives us (title and URL)
//! - [`ArticleRecord`]: the link plus the metadata read from the article page
//!
//! Column names follow the tabular outputs (`Article Title`, `Article URL`, ...)
//! so the same serde representation feeds the warehouse rows.

use serde::{Deserialize, Serialize};

/// Column holding the article URL, shared by the sinks and the history query.
pub const URL_COLUMN: &str = "Article URL";

/// A link discovered on the listing page, before its article page is visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleLink {
    /// Anchor text; may be empty.
    pub title: String,
    /// Absolute article address, the natural key for deduplication.
    pub url: String,
}

/// Metadata read from a single article page.
///
/// `Default` is the degraded value used when the page could not be fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleDetails {
    pub categories: Vec<String>,
    pub author: Option<String>,
    pub updated_on: Option<String>,
}

/// A fully harvested article, handed to the sink as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(rename = "Article Title")]
    pub title: String,
    #[serde(rename = "Article URL")]
    pub url: String,
    #[serde(rename = "Categories")]
    pub categories: Vec<String>,
    #[serde(rename = "Author")]
    pub author: Option<String>,
    #[serde(rename = "Updated On")]
    pub updated_on: Option<String>,
}

impl ArticleRecord {
    pub fn new(link: ArticleLink, details: ArticleDetails) -> Self {
        Self {
            title: link.title,
            url: link.url,
            categories: details.categories,
            author: details.author,
            updated_on: details.updated_on,
        }
    }

    /// True when none of the detail fields carry a value.
    pub fn is_degraded(&self) -> bool {
        self.categories.is_empty() && self.author.is_none() && self.updated_on.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link() -> ArticleLink {
        ArticleLink {
            title: "Why ADHD Brains Crave Stimulation".to_string(),
            url: "https://www.additudemag.com/adhd-brain-stimulation/".to_string(),
        }
    }

    #[test]
    fn test_record_keeps_link_fields() {
        let record = ArticleRecord::new(
            link(),
            ArticleDetails {
                categories: vec!["ADHD".to_string(), "Symptoms".to_string()],
                author: Some("Jane Doe".to_string()),
                updated_on: Some("March 1, 2024".to_string()),
            },
        );

        assert_eq!(record.title, "Why ADHD Brains Crave Stimulation");
        assert_eq!(record.url, "https://www.additudemag.com/adhd-brain-stimulation/");
        assert_eq!(record.categories, vec!["ADHD", "Symptoms"]);
        assert!(!record.is_degraded());
    }

    #[test]
    fn test_default_details_are_degraded() {
        let record = ArticleRecord::new(link(), ArticleDetails::default());
        assert!(record.categories.is_empty());
        assert_eq!(record.author, None);
        assert_eq!(record.updated_on, None);
        assert!(record.is_degraded());
    }

    #[test]
    fn test_record_serializes_with_column_names() {
        let record = ArticleRecord::new(link(), ArticleDetails::default());
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json[URL_COLUMN], "https://www.additudemag.com/adhd-brain-stimulation/");
        assert_eq!(json["Article Title"], "Why ADHD Brains Crave Stimulation");
        assert!(json["Author"].is_null());
        assert_eq!(json["Categories"], serde_json::json!([]));
    }
}
