//! Interfaces to the collaborators that turn binary documents and web pages
//! into plain text.

use async_trait::async_trait;

use crate::document::Document;
use crate::error::Result;

/// Extracts the text of a binary document (e.g. a PDF), one [`Document`] per page.
#[async_trait]
pub trait DocumentTextExtractor: Send + Sync {
    /// Extract the pages of `bytes`, tagging each with `source_id`.
    async fn extract(&self, bytes: &[u8], source_id: &str) -> Result<Vec<Document>>;
}

/// Fetches a web page and returns its visible text, already stripped of markup.
#[async_trait]
pub trait WebTextExtractor: Send + Sync {
    /// Fetch `url`; the returned document's source is the URL.
    async fn fetch(&self, url: &str) -> Result<Document>;
}

/// Collapse the whitespace left over from markup stripping.
///
/// Each line is trimmed, runs of two or more spaces split a line into
/// phrases, empty phrases are dropped, and the rest are joined with single
/// spaces.
pub fn normalize_page_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .flat_map(|line| line.split("  "))
        .map(str::trim)
        .filter(|phrase| !phrase.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
