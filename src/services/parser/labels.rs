//! "Label: value" extraction.

use regex::Regex;
use scraper::{ElementRef, Node};

use crate::models::UNKNOWN;

/// Find the value that follows a label inside `container`.
///
/// Tried in order:
/// 1. the first text node matching `label`;
/// 2. its next sibling element, when that is a `<span>` (for file sizes the
///    unit in the text node after the span is appended);
/// 3. the label text itself, split on the first colon;
/// 4. [`UNKNOWN`].
pub fn text_after_label(container: ElementRef<'_>, label: &Regex, is_file_size: bool) -> String {
    let Some(label_node) = container
        .descendants()
        .find(|node| matches!(node.value(), Node::Text(text) if label.is_match(text)))
    else {
        return UNKNOWN.to_string();
    };

    if let Some(span) = label_node
        .next_siblings()
        .find_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "span")
    {
        let mut value = span.text().collect::<String>().trim().to_string();
        if is_file_size {
            if let Some(Node::Text(unit)) = span.next_sibling().map(|n| n.value()) {
                let unit = unit.trim();
                if !unit.is_empty() {
                    value = format!("{value} {unit}");
                }
            }
        }
        return value;
    }

    if let Node::Text(text) = label_node.value() {
        if let Some((_, rest)) = text.split_once(':') {
            let rest = rest.trim();
            if !rest.is_empty() {
                return rest.to_string();
            }
        }
    }

    UNKNOWN.to_string()
}

/// Element text with whitespace-only pieces dropped, joined by spaces.
pub fn joined_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
