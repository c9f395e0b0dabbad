//! Audiobook listing data structures.

use serde::{Deserialize, Serialize};

/// Sentinel for any field the page did not provide.
pub const UNKNOWN: &str = "Unknown";

/// Description used when a details page has no description block.
pub const NO_DESCRIPTION: &str = "No description available.";

/// Rewrite "?", empty and whitespace-only values to [`UNKNOWN`].
pub fn normalize_field(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "?" {
        UNKNOWN.to_string()
    } else {
        trimmed.to_string()
    }
}

/// True when a field holds the missing-data sentinel.
pub fn is_unknown(value: &str) -> bool {
    value == UNKNOWN
}

/// Metadata shared by listing and details pages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookMetadata {
    pub language: String,
    pub categories: Vec<String>,
    pub post_date: String,
    pub format: String,
    pub bitrate: String,
    pub file_size: String,
    pub author: String,
    pub narrator: String,
}

impl Default for BookMetadata {
    fn default() -> Self {
        Self {
            language: UNKNOWN.into(),
            categories: vec![UNKNOWN.into()],
            post_date: UNKNOWN.into(),
            format: UNKNOWN.into(),
            bitrate: UNKNOWN.into(),
            file_size: UNKNOWN.into(),
            author: UNKNOWN.into(),
            narrator: UNKNOWN.into(),
        }
    }
}

impl BookMetadata {
    /// Apply the missing-data rule to every field.
    ///
    /// Both summary and details parsing finish through here, so the two
    /// paths cannot disagree on what "missing" means.
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.language,
            &mut self.post_date,
            &mut self.format,
            &mut self.bitrate,
            &mut self.file_size,
            &mut self.author,
            &mut self.narrator,
        ] {
            *field = normalize_field(field);
        }

        self.categories = self
            .categories
            .iter()
            .map(|c| normalize_field(c))
            .filter(|c| !is_unknown(c))
            .collect();
        if self.categories.is_empty() {
            self.categories.push(UNKNOWN.into());
        }
        self
    }
}

/// One search-result listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookSummary {
    pub title: String,
    /// Canonical absolute URL of the details page
    pub link: String,
    /// Absolute cover URL, `None` when the site shows its placeholder
    pub cover: Option<String>,
    pub language: String,
    pub categories: Vec<String>,
    pub post_date: String,
    pub format: String,
    pub bitrate: String,
    pub file_size: String,
}

impl BookSummary {
    pub fn new(title: &str, link: String, cover: Option<String>, meta: BookMetadata) -> Self {
        let meta = meta.normalized();
        Self {
            title: normalize_field(title),
            link,
            cover,
            language: meta.language,
            categories: meta.categories,
            post_date: meta.post_date,
            format: meta.format,
            bitrate: meta.bitrate,
            file_size: meta.file_size,
        }
    }
}

/// Everything known about a single details page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookDetails {
    pub title: String,
    pub link: String,
    pub cover: Option<String>,
    pub language: String,
    pub categories: Vec<String>,
    pub post_date: String,
    pub format: String,
    pub bitrate: String,
    pub file_size: String,
    pub author: String,
    pub narrator: String,
    /// Sanitized HTML
    pub description: String,
    pub trackers: Vec<String>,
    pub info_hash: String,
}

impl BookDetails {
    /// Whether a magnet link can be built from this page.
    pub fn has_info_hash(&self) -> bool {
        !is_unknown(&self.info_hash)
    }

    /// The listing-level view of these details.
    pub fn summary(&self) -> BookSummary {
        BookSummary {
            title: self.title.clone(),
            link: self.link.clone(),
            cover: self.cover.clone(),
            language: self.language.clone(),
            categories: self.categories.clone(),
            post_date: self.post_date.clone(),
            format: self.format.clone(),
            bitrate: self.bitrate.clone(),
            file_size: self.file_size.clone(),
        }
    }
}
