//! Turns one crawled record into a document ready for the index builder.

use crate::tokenizer::tokenize;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref TITLE: Selector = Selector::parse("title").expect("valid selector");
}

/// Elements whose text never reaches the index.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript"];

/// A crawled page as stored by the crawler: `{"url": ..., "content": ..., "encoding": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: Option<String>,
}

impl RawRecord {
    pub fn new(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self { url: url.into(), content: content.into(), encoding: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub url: String,
    pub title: Option<String>,
    pub stems: Vec<String>,
}

impl ExtractedDocument {
    pub fn is_empty(&self) -> bool { self.stems.is_empty() }
}

/// Extract text from a record and tokenize it.
///
/// Every record goes through the HTML parser; plain text comes out as a
/// single text node, and markup anywhere in the content is stripped.
/// Never fails: a record with no usable text becomes a document with zero
/// stems, which still takes a document ID downstream.
pub fn extract_document(record: &RawRecord) -> ExtractedDocument {
    let html = Html::parse_document(record.content.trim_start_matches('\u{feff}'));
    let text = visible_text(&html);
    let title = page_title(&html);

    let stems = tokenize(&text);
    if stems.is_empty() {
        tracing::warn!(url = %record.url, "record has no indexable text");
    }
    ExtractedDocument { url: record.url.clone(), title, stems }
}

fn visible_text(html: &Html) -> String {
    let mut out = String::new();
    for node in html.tree.root().descendants() {
        let Some(text) = node.value().as_text() else { continue };
        let hidden = node.ancestors().any(|a| {
            a.value().as_element().is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if hidden { continue; }
        let text: &str = text;
        if text.trim().is_empty() { continue; }
        if !out.is_empty() { out.push(' '); }
        out.push_str(text.trim());
    }
    out
}

fn page_title(html: &Html) -> Option<String> {
    let title = html.select(&TITLE).next()?.text().collect::<String>();
    let title = title.trim();
    if title.is_empty() { None } else { Some(title.to_string()) }
}
