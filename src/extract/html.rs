//! HTML extraction
//!
//! Text is gathered by walking the tree and skipping `script`, `style`,
//! `noscript` and `template` subtrees, one trimmed text node per line.

use crate::extract::{ExtractedTable, Extraction};
use crate::url::resolve_url;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashMap, HashSet};
use url::Url;

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];
const HEADING_LEVELS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

/// Minimum length for a main-content candidate to beat whole-document text
const MIN_MAIN_CONTENT_CHARS: usize = 250;

/// Paragraphs shorter than this do not score their container
const MIN_PARAGRAPH_CHARS: usize = 25;

/// Parses HTML and extracts title, description, headings, text, tables and links
///
/// # Example
///
/// ```
/// use sumi_harvest::extract::extract_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base = Url::parse("https://example.com/").unwrap();
/// let page = extract_html(html, &base);
/// assert_eq!(page.title, "Test");
/// assert_eq!(page.links[0].as_str(), "https://example.com/page");
/// ```
pub fn extract_html(html: &str, base: &Url) -> Extraction {
    let document = Html::parse_document(html);

    Extraction {
        title: extract_title(&document),
        meta_description: extract_meta_description(&document),
        headings: extract_headings(&document),
        text: extract_readable_text(&document),
        tables: extract_tables(&document),
        links: extract_links(&document, base),
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn extract_title(document: &Html) -> String {
    selector("title")
        .and_then(|s| {
            document
                .select(&s)
                .next()
                .map(|e| e.text().collect::<String>().trim().to_string())
        })
        .unwrap_or_default()
}

fn extract_meta_description(document: &Html) -> Option<String> {
    let meta = selector("meta")?;
    let mut og_description = None;

    for element in document.select(&meta) {
        let attrs = element.value();
        let Some(content) = attrs.attr("content").map(str::trim).filter(|c| !c.is_empty()) else {
            continue;
        };

        if attrs
            .attr("name")
            .is_some_and(|n| n.eq_ignore_ascii_case("description"))
        {
            return Some(content.to_string());
        }

        if og_description.is_none()
            && attrs
                .attr("property")
                .is_some_and(|p| p.eq_ignore_ascii_case("og:description"))
        {
            og_description = Some(content.to_string());
        }
    }

    og_description
}

fn extract_headings(document: &Html) -> BTreeMap<String, Vec<String>> {
    let mut headings = BTreeMap::new();

    for level in HEADING_LEVELS {
        let Some(sel) = selector(level) else { continue };
        let texts: Vec<String> = document
            .select(&sel)
            .map(|e| joined_text(e, " "))
            .filter(|t| !t.is_empty())
            .collect();

        if !texts.is_empty() {
            headings.insert(level.to_string(), texts);
        }
    }

    headings
}

/// Depth-first text walk on an explicit stack; nesting depth is attacker-controlled
fn collect_text(element: ElementRef<'_>, out: &mut Vec<String>) {
    let mut stack: Vec<_> = element.children().rev().collect();

    while let Some(node) = stack.pop() {
        if let Some(text) = node.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                out.push(trimmed.to_string());
            }
        } else if let Some(child) = ElementRef::wrap(node) {
            if !SKIPPED_ELEMENTS.contains(&child.value().name()) {
                stack.extend(child.children().rev());
            }
        }
    }
}

fn joined_text(element: ElementRef<'_>, separator: &str) -> String {
    let mut parts = Vec::new();
    collect_text(element, &mut parts);
    parts.join(separator)
}

/// Main-content text when a convincing candidate exists, else whole-document text
fn extract_readable_text(document: &Html) -> String {
    main_content(document)
        .map(|e| joined_text(e, "\n"))
        .filter(|t| t.len() >= MIN_MAIN_CONTENT_CHARS)
        .unwrap_or_else(|| joined_text(document.root_element(), "\n"))
}

/// Picks the element most likely to hold the article body
///
/// Semantic containers win outright; otherwise the parent with the most
/// paragraph text does.
fn main_content(document: &Html) -> Option<ElementRef<'_>> {
    if let Some(sel) = selector("article, main, [role=main]") {
        let semantic = document
            .select(&sel)
            .max_by_key(|e| joined_text(*e, "\n").len());
        if let Some(element) = semantic {
            return Some(element);
        }
    }

    let paragraphs = selector("p")?;
    let mut scores: HashMap<_, (ElementRef<'_>, usize)> = HashMap::new();

    for p in document.select(&paragraphs) {
        let length = joined_text(p, " ").len();
        if length < MIN_PARAGRAPH_CHARS {
            continue;
        }

        if let Some(parent) = p.parent().and_then(ElementRef::wrap) {
            scores.entry(parent.id()).or_insert((parent, 0)).1 += length;
        }
    }

    scores
        .into_values()
        .max_by_key(|(_, score)| *score)
        .map(|(element, _)| element)
}

fn extract_tables(document: &Html) -> Vec<ExtractedTable> {
    let (Some(tables), Some(rows)) = (selector("table"), selector("tr")) else {
        return Vec::new();
    };

    let mut extracted = Vec::new();

    for table in document.select(&tables) {
        let caption = table
            .children()
            .filter_map(ElementRef::wrap)
            .find(|c| c.value().name() == "caption")
            .map(|c| joined_text(c, " "))
            .filter(|c| !c.is_empty());

        let cells: Vec<Vec<String>> = table
            .select(&rows)
            .filter(|tr| owning_table(*tr).is_some_and(|t| t.id() == table.id()))
            .map(|tr| {
                tr.children()
                    .filter_map(ElementRef::wrap)
                    .filter(|c| matches!(c.value().name(), "td" | "th"))
                    .map(|c| joined_text(c, " "))
                    .collect::<Vec<_>>()
            })
            .filter(|row| !row.is_empty())
            .collect();

        if !cells.is_empty() {
            extracted.push(ExtractedTable::from_rows(caption, cells));
        }
    }

    extracted
}

/// Nearest enclosing `<table>`, so rows of nested tables are not counted twice
fn owning_table(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "table")
}

fn extract_links(document: &Html, base: &Url) -> Vec<Url> {
    let Some(anchors) = selector("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in document.select(&anchors) {
        let Some(href) = anchor.value().attr("href") else { continue };
        if href.trim().is_empty() {
            continue;
        }

        if let Ok(url) = resolve_url(base, href) {
            if seen.insert(url.as_str().to_string()) {
                links.push(url);
            }
        }
    }

    links
}
