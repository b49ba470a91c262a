//! Utility functions for text normalization, truncation and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - Identity normalization for the deduplicator
//! - Character-safe truncation for descriptions and log previews
//! - HTML-to-text flattening for feed descriptions
//! - JSON error detection for handling truncated LLM responses
//! - File system validation for output directories

use scraper::{Html, Node};
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Normalize a URL for identity comparison: trimmed and lowercased.
pub fn normalize_url(url: &str) -> String {
    url.trim().to_lowercase()
}

/// Normalize a title for identity comparison.
///
/// Runs of whitespace collapse to a single space, leading and trailing
/// whitespace is dropped, and the result is lowercased.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_title("  Foo \n  Bar "), "foo bar");
/// ```
pub fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Truncate `s` to at most `max` characters, appending `...` when cut.
///
/// Works on `char` boundaries so multi-byte text never panics.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}...", &s[..idx]),
    }
}

/// Take the first `max` characters of `s` without any marker.
pub fn take_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a byte
/// count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}…(+{} bytes)", &s[..idx], s.len() - idx),
    }
}

/// Elements whose boundaries separate words.
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption", "figure",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "img", "li", "ol", "p", "pre",
    "section", "table", "td", "th", "tr", "ul",
];

fn is_block(node: &Node) -> bool {
    matches!(node, Node::Element(e) if BLOCK_TAGS.contains(&e.name()))
}

/// Flatten an HTML fragment to plain text.
///
/// Feed descriptions frequently carry markup (`<p>`, `<a>`, images). Text
/// inside inline elements is joined as-is, so punctuation stays attached;
/// block elements separate words. Entities are decoded and whitespace
/// collapsed.
pub fn html_to_text(fragment: &str) -> String {
    if !fragment.contains('<') && !fragment.contains('&') {
        return fragment.split_whitespace().collect::<Vec<_>>().join(" ");
    }
    let doc = Html::parse_fragment(fragment);
    let mut text = String::new();
    for node in doc.root_element().descendants() {
        match node.value() {
            Node::Text(t) => {
                if node.prev_sibling().is_some_and(|prev| is_block(prev.value())) {
                    text.push(' ');
                }
                text.push_str(t);
            }
            other if is_block(other) => text.push(' '),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Detect if a serde_json error indicates truncated/incomplete JSON.
///
/// When the model's response is cut off (e.g., due to token limits), the
/// resulting JSON fails to parse with an EOF error.
pub fn looks_truncated(e: &serde_json::Error) -> bool {
    use serde_json::error::Category;
    matches!(e.classify(), Category::Eof)
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a probe file.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Output directory is writable");
    Ok(())
}
