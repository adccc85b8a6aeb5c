//! PDF extraction
//!
//! Text comes page by page from lopdf. Tables are a best-effort guess over
//! each page's text: consecutive lines that split into two or more columns
//! on runs of spaces or tabs. A page that fails contributes nothing.

use crate::extract::{ExtractedTable, Extraction};
use lopdf::Document;
use regex::Regex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Extracts per-page text (blank-line separated) and best-effort tables
pub fn extract_pdf(bytes: &[u8]) -> Extraction {
    let document = match catch_unwind(|| Document::load_mem(bytes)) {
        Ok(Ok(document)) => document,
        Ok(Err(e)) => {
            debug!("Unreadable PDF: {}", e);
            return Extraction::default();
        }
        Err(_) => {
            warn!("PDF parser panicked, returning empty extraction");
            return Extraction::default();
        }
    };

    let mut pages_text = Vec::new();
    let mut tables = Vec::new();

    for page_number in document.get_pages().keys().copied() {
        let text = match catch_unwind(AssertUnwindSafe(|| document.extract_text(&[page_number]))) {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                debug!("Skipping PDF page {}: {}", page_number, e);
                continue;
            }
            Err(_) => {
                warn!("PDF page {} could not be read, skipping", page_number);
                continue;
            }
        };

        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        tables.extend(text_tables(text));
        pages_text.push(text.to_string());
    }

    Extraction {
        text: pages_text.join("\n\n"),
        tables,
        ..Extraction::default()
    }
}

fn column_gap() -> Option<&'static Regex> {
    static GAP: OnceLock<Option<Regex>> = OnceLock::new();
    GAP.get_or_init(|| Regex::new(r"\t+|\s{2,}").ok()).as_ref()
}

/// Finds column-aligned blocks in plain text
///
/// A block of at least two consecutive lines with two or more cells each is
/// reported as one table.
pub fn text_tables(text: &str) -> Vec<ExtractedTable> {
    let Some(gap) = column_gap() else {
        return Vec::new();
    };

    let mut tables = Vec::new();
    let mut block: Vec<Vec<String>> = Vec::new();

    let mut flush = |block: &mut Vec<Vec<String>>| {
        if block.len() >= 2 {
            tables.push(ExtractedTable::from_rows(None, std::mem::take(block)));
        } else {
            block.clear();
        }
    };

    for line in text.lines() {
        let cells: Vec<String> = gap
            .split(line.trim())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        if cells.len() >= 2 {
            block.push(cells);
        } else {
            flush(&mut block);
        }
    }
    flush(&mut block);

    tables
}
