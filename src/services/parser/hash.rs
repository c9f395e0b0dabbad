//! Info-hash and tracker extraction from details pages.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::Result;
use crate::models::{UNKNOWN, normalize_field};

/// Rows of the torrent info table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TorrentTable {
    pub trackers: Vec<String>,
    pub file_size: Option<String>,
    pub info_hash: Option<String>,
}

/// Escalating info-hash lookup.
pub struct HashExtractor {
    table: Selector,
    row: Selector,
    cell: Selector,
    label: Regex,
    token: Regex,
}

impl HashExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            table: super::parse_selector("table.torrent_info")?,
            row: super::parse_selector("tr")?,
            cell: super::parse_selector("td")?,
            label: Regex::new(r"(?i)Info Hash")?,
            token: Regex::new(r"\b([a-fA-F0-9]{40}|[a-fA-F0-9]{64})\b")?,
        })
    }

    /// Read the dedicated torrent info table, if the page has one.
    pub fn torrent_table(&self, document: &Html) -> TorrentTable {
        let mut table = TorrentTable::default();
        let Some(element) = document.select(&self.table).next() else {
            return table;
        };

        for row in element.select(&self.row) {
            let cells: Vec<ElementRef<'_>> = row.select(&self.cell).collect();
            if cells.len() < 2 {
                continue;
            }
            let label = cells[0].text().collect::<String>();
            let value = normalize_field(&cells[1].text().collect::<String>());

            if label.contains("Tracker:") || label.contains("Announce URL:") {
                if value != UNKNOWN {
                    table.trackers.push(value);
                }
            } else if label.contains("File Size:") {
                if table.file_size.is_none() {
                    table.file_size = Some(value);
                }
            } else if label.contains("Info Hash:") && value != UNKNOWN && table.info_hash.is_none() {
                table.info_hash = Some(value);
            }
        }
        table
    }

    /// Resolve the info hash: table row, then any "Info Hash" cell, then a
    /// raw scan of the document for a 40 or 64 hex token.
    pub fn info_hash(&self, document: &Html, raw_html: &str, table: &TorrentTable) -> String {
        if let Some(hash) = &table.info_hash {
            return hash.clone();
        }
        if let Some(hash) = self.labelled_cell(document) {
            log::debug!("Info hash found by cell label");
            return hash;
        }
        if let Some(hash) = self.scan(raw_html) {
            log::debug!("Info hash found by body scan");
            return hash;
        }
        UNKNOWN.to_string()
    }

    fn labelled_cell(&self, document: &Html) -> Option<String> {
        let cell = document
            .select(&self.cell)
            .find(|td| self.label.is_match(&td.text().collect::<String>()))?;
        let value = cell
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "td")?
            .text()
            .collect::<String>()
            .trim()
            .to_string();
        (!value.is_empty() && value != "?").then_some(value)
    }

    fn scan(&self, raw_html: &str) -> Option<String> {
        self.token
            .captures(raw_html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const HASH40: &str = "0123456789abcdef0123456789abcdef01234567";

    fn run(html: &str) -> (TorrentTable, String) {
        let extractor = HashExtractor::new().unwrap();
        let doc = Html::parse_document(html);
        let table = extractor.torrent_table(&doc);
        let hash = extractor.info_hash(&doc, html, &table);
        (table, hash)
    }

    #[test]
    fn table_rows_supply_hash_and_trackers() {
        let html = format!(
            r#"<table class="torrent_info">
                <tr><td>Tracker:</td><td>udp://a:80</td></tr>
                <tr><td>Announce URL:</td><td>udp://b:80</td></tr>
                <tr><td>Tracker:</td><td>?</td></tr>
                <tr><td>File Size:</td><td>300 MBs</td></tr>
                <tr><td>Info Hash:</td><td>{HASH40}</td></tr>
            </table>"#
        );
        let (table, hash) = run(&html);
        assert_eq!(table.trackers, vec!["udp://a:80", "udp://b:80"]);
        assert_eq!(table.file_size.as_deref(), Some("300 MBs"));
        assert_eq!(hash, HASH40);
    }

    #[test]
    fn labelled_cell_outside_table() {
        let html = r#"<table><tr><td><b>INFO HASH:</b></td><td> ABCDEF0123456789ABCDEF0123456789ABCDEF01 </td></tr></table>"#;
        let (_, hash) = run(html);
        assert_eq!(hash, "ABCDEF0123456789ABCDEF0123456789ABCDEF01");
    }

    #[test]
    fn body_scan_finds_bare_token() {
        let html = format!("<html><body><p>magnet hash is {HASH40} enjoy</p></body></html>");
        let (table, hash) = run(&html);
        assert_eq!(table, TorrentTable::default());
        assert_eq!(hash, HASH40);
    }

    #[test]
    fn body_scan_prefers_full_v2_token() {
        let v2 = "a".repeat(64);
        let (_, hash) = run(&format!("<p>{v2}</p>"));
        assert_eq!(hash, v2);
    }

    #[test]
    fn no_hash_is_unknown() {
        let (_, hash) = run("<p>nothing to see, deadbeef</p>");
        assert_eq!(hash, UNKNOWN);
    }
}
