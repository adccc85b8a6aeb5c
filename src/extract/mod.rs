//! Content extraction
//!
//! Turns a response body into title, description, headings, readable text,
//! tables and links. HTML goes through `scraper`, PDF through `lopdf`.
//! Neither path fails: unreadable input gives an empty [`Extraction`].

mod html;
mod pdf;

pub use html::extract_html;
pub use pdf::{extract_pdf, text_tables};

use crate::crawler::ContentKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// A table with every row padded to the same width
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedTable {
    pub caption: Option<String>,
    pub rows: Vec<Vec<String>>,
    pub num_rows: usize,
    pub num_cols: usize,
}

impl ExtractedTable {
    /// Builds a rectangular table, padding short rows with empty cells
    pub fn from_rows(caption: Option<String>, mut rows: Vec<Vec<String>>) -> Self {
        let num_cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(num_cols, String::new());
        }

        Self {
            caption,
            num_rows: rows.len(),
            num_cols,
            rows,
        }
    }
}

/// Everything pulled out of one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub title: String,
    pub meta_description: Option<String>,
    /// Heading texts by level (`h1`..`h6`), document order within a level
    pub headings: BTreeMap<String, Vec<String>>,
    pub text: String,
    pub tables: Vec<ExtractedTable>,
    /// Resolved, normalized and de-duplicated in first-seen order
    pub links: Vec<Url>,
}

/// Dispatches on content kind; non-HTML, non-PDF content yields nothing
pub fn extract(kind: ContentKind, body: &[u8], base: &Url) -> Extraction {
    match kind {
        ContentKind::Html => extract_html(&String::from_utf8_lossy(body), base),
        ContentKind::Pdf => extract_pdf(body),
        ContentKind::Other => Extraction::default(),
    }
}
