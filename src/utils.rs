//! Utility functions for text cleanup and log formatting.
//!
//! This module provides helpers used throughout the application:
//! - Whitespace normalisation for text pulled out of HTML
//! - String truncation for logging remote error bodies
//! - Python-style list rendering for the CSV `Categories` column

use itertools::Itertools;
use scraper::ElementRef;

/// Collapse every run of whitespace into a single space and trim both ends.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(collapse_whitespace("  ADHD \n\t News "), "ADHD News");
/// ```
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().join(" ")
}

/// Visible text of an element, whitespace-normalised.
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (never inside a UTF-8
/// character) and an ellipsis with the dropped byte count is appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Render labels the way a Python list of strings prints.
///
/// Values are single-quoted unless they contain a single quote and no
/// double quote, in which case they are double-quoted. An empty list
/// renders as `[]`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(python_list_repr(&["ADHD".into(), "Kids".into()]), "['ADHD', 'Kids']");
/// ```
pub fn python_list_repr(items: &[String]) -> String {
    let inner = items
        .iter()
        .map(|item| {
            if item.contains('\'') && !item.contains('"') {
                format!("\"{}\"", item.replace('\\', "\\\\"))
            } else {
                format!("'{}'", item.replace('\\', "\\\\").replace('\'', "\\'"))
            }
        })
        .join(", ");
    format!("[{inner}]")
}
