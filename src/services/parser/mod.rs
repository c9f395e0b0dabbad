// src/services/parser/mod.rs

//! Resilient HTML parser.
//!
//! Turns listing pages and details pages into [`BookSummary`] and
//! [`BookDetails`]. Every field falls back to the `Unknown` sentinel; the
//! description is passed through an allow-list sanitizer.

mod hash;
mod labels;
mod sanitize;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{
    BookDetails, BookMetadata, BookSummary, NO_DESCRIPTION, is_unknown, normalize_field,
};
use crate::utils::{resolve_url, truncate};

pub use hash::{HashExtractor, TorrentTable};
pub use labels::{joined_text, text_after_label};
pub use sanitize::sanitize_html;

/// Cover image the site shows when a book has none.
pub const DEFAULT_COVER_FILENAME: &str = "default_cover.jpg";

const SNIPPET_LEN: usize = 500;

/// One parsed search-results page.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ListingPage {
    /// Number of `.post` blocks found
    pub post_count: usize,
    pub books: Vec<BookSummary>,
}

impl ListingPage {
    /// No posts at all: the result set is exhausted.
    pub fn is_exhausted(&self) -> bool {
        self.post_count == 0
    }

    /// Posts were present but none could be parsed.
    pub fn is_malformed(&self) -> bool {
        self.post_count > 0 && self.books.is_empty()
    }
}

struct LabelPatterns {
    language: Regex,
    category: Regex,
    posted: Regex,
    format: Regex,
    bitrate: Regex,
    file_size: Regex,
}

/// Compiled selectors and patterns for both page kinds.
pub struct ResilientParser {
    post: Selector,
    post_title_link: Selector,
    post_cover: Selector,
    post_info: Selector,
    post_content: Selector,
    paragraph: Selector,
    detail_title: Selector,
    detail_cover: Selector,
    author: Selector,
    narrator: Selector,
    description: Selector,
    labels: LabelPatterns,
    hashes: HashExtractor,
}

impl ResilientParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            post: parse_selector(".post")?,
            post_title_link: parse_selector(".postTitle > h2 > a")?,
            post_cover: parse_selector(".postContent img")?,
            post_info: parse_selector(".postInfo")?,
            post_content: parse_selector(".postContent")?,
            paragraph: parse_selector("p")?,
            detail_title: parse_selector(".postTitle h1")?,
            detail_cover: parse_selector(r#".postContent img[itemprop="image"]"#)?,
            author: parse_selector(r#"span.author[itemprop="author"]"#)?,
            narrator: parse_selector(r#"span.narrator[itemprop="author"]"#)?,
            description: parse_selector("div.desc")?,
            labels: LabelPatterns {
                language: Regex::new(r"(?i)Language:\s*(\S+)")?,
                category: Regex::new(r"Category:\s*(.+?)(?:\s+Language:|$)")?,
                posted: Regex::new(r"(?i)Posted:")?,
                format: Regex::new(r"(?i)Format:")?,
                bitrate: Regex::new(r"(?i)Bitrate:")?,
                file_size: Regex::new(r"(?i)File\s*Size:")?,
            },
            hashes: HashExtractor::new()?,
        })
    }

    /// Parse a search-results page fetched from `page_url`.
    ///
    /// A post that cannot be parsed is logged and skipped.
    pub fn parse_listing(&self, html: &str, page_url: &Url) -> ListingPage {
        let document = Html::parse_document(html);
        let mut page = ListingPage::default();

        for post in document.select(&self.post) {
            page.post_count += 1;
            match self.parse_post(post, page_url) {
                Ok(book) => page.books.push(book),
                Err(e) => {
                    let snippet = post.html().replace('\n', " ");
                    log::error!(
                        "Could not process post: {}. Snippet: {}",
                        e,
                        truncate(&snippet, SNIPPET_LEN)
                    );
                }
            }
        }
        page
    }

    fn parse_post(&self, post: ElementRef<'_>, page_url: &Url) -> Result<BookSummary> {
        let title_link = post
            .select(&self.post_title_link)
            .next()
            .ok_or_else(|| AppError::Parse("post has no title link".into()))?;
        let href = title_link
            .value()
            .attr("href")
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .ok_or_else(|| AppError::Parse("title link has no href".into()))?;

        let title = title_link.text().collect::<String>();
        let link = resolve_url(page_url, href);
        let cover = post
            .select(&self.post_cover)
            .next()
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| normalize_cover(page_url, src));

        let meta = self.metadata(
            post.select(&self.post_content).next(),
            post.select(&self.post_info).next(),
        );
        Ok(BookSummary::new(&title, link, cover, meta))
    }

    /// Parse a details page fetched from `page_url`.
    pub fn parse_details(&self, html: &str, page_url: &Url) -> BookDetails {
        let document = Html::parse_document(html);

        let title = document
            .select(&self.detail_title)
            .next()
            .map(|h1| h1.text().collect::<String>())
            .unwrap_or_default();
        let cover = document
            .select(&self.detail_cover)
            .next()
            .and_then(|img| img.value().attr("src"))
            .and_then(|src| normalize_cover(page_url, src));

        let mut meta = self.metadata(
            document.select(&self.post_content).next(),
            document.select(&self.post_info).next(),
        );
        if let Some(author) = document.select(&self.author).next() {
            meta.author = author.text().collect();
        }
        if let Some(narrator) = document.select(&self.narrator).next() {
            meta.narrator = narrator.text().collect();
        }
        let mut meta = meta.normalized();

        let description = document
            .select(&self.description)
            .next()
            .map(sanitize_html)
            .filter(|html| !html.is_empty())
            .unwrap_or_else(|| NO_DESCRIPTION.to_string());

        let table = self.hashes.torrent_table(&document);
        if is_unknown(&meta.file_size) {
            if let Some(size) = &table.file_size {
                meta.file_size = normalize_field(size);
            }
        }
        let info_hash = self.hashes.info_hash(&document, html, &table);

        BookDetails {
            title: normalize_field(&title),
            link: page_url.to_string(),
            cover,
            language: meta.language,
            categories: meta.categories,
            post_date: meta.post_date,
            format: meta.format,
            bitrate: meta.bitrate,
            file_size: meta.file_size,
            author: meta.author,
            narrator: meta.narrator,
            description,
            trackers: table.trackers,
            info_hash,
        }
    }

    /// Language and categories from the info header, the rest from the
    /// content paragraphs.
    fn metadata(&self, content: Option<ElementRef<'_>>, info: Option<ElementRef<'_>>) -> BookMetadata {
        let mut meta = BookMetadata::default();

        if let Some(info) = info {
            let text = joined_text(info);
            if let Some(lang) = self.labels.language.captures(&text).and_then(|c| c.get(1)) {
                meta.language = lang.as_str().to_string();
            }
            if let Some(cat) = self.labels.category.captures(&text).and_then(|c| c.get(1)) {
                let categories: Vec<String> = cat
                    .as_str()
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect();
                if !categories.is_empty() {
                    meta.categories = categories;
                }
            }
        }

        if let Some(content) = content {
            for p in content.select(&self.paragraph) {
                let text = p.text().collect::<String>();
                if self.labels.posted.is_match(&text) {
                    meta.post_date = text_after_label(p, &self.labels.posted, false);
                }
                if self.labels.format.is_match(&text) {
                    meta.format = text_after_label(p, &self.labels.format, false);
                }
                if self.labels.bitrate.is_match(&text) {
                    meta.bitrate = text_after_label(p, &self.labels.bitrate, false);
                }
                if self.labels.file_size.is_match(&text) {
                    meta.file_size = text_after_label(p, &self.labels.file_size, true);
                }
            }
        }

        meta.normalized()
    }
}

/// Resolve a cover `src`; the site placeholder counts as no cover.
pub fn normalize_cover(page_url: &Url, src: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    let cover = resolve_url(page_url, src);
    if cover.ends_with(DEFAULT_COVER_FILENAME) {
        None
    } else {
        Some(cover)
    }
}

pub(crate) fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
