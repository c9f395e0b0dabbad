//! Allow-list HTML sanitizer for description blocks.

use scraper::{ElementRef, Node};

/// Tags that survive, with every attribute removed.
const ALLOWED_TAGS: &[&str] = &["p", "br", "b", "i", "em", "strong", "ul", "li"];

/// Tags removed together with their content.
const DROPPED_TAGS: &[&str] = &[
    "script", "style", "iframe", "noscript", "object", "embed", "template",
];

/// Serialize the children of `root`, keeping only allow-listed markup.
///
/// Any other element is unwrapped: a space is emitted, then its children.
/// Text is re-escaped and comments are discarded.
pub fn sanitize_html(root: ElementRef<'_>) -> String {
    let mut out = String::new();
    write_children(root, &mut out);
    out.trim().to_string()
}

fn write_children(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => escape_into(text, out),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    write_element(child, out);
                }
            }
            _ => {}
        }
    }
}

fn write_element(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if DROPPED_TAGS.contains(&name) {
        return;
    }

    if !ALLOWED_TAGS.contains(&name) {
        out.push(' ');
        write_children(element, out);
        return;
    }

    if name == "br" {
        out.push_str("<br>");
        return;
    }

    out.push('<');
    out.push_str(name);
    out.push('>');
    write_children(element, out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}
