//! Row extraction
//!
//! Turns a [`RawRow`] read from the results table into a [`ScrapedRow`]:
//! normalized positional text per column, a positional fallback URL per
//! column, and the classified link fields.

use crate::classify::{LinkCategory, classify_url};
use crate::model::{
    LIST_SEPARATOR, RawCell, RawRow, ScrapedRow, column_text_field, column_url_field,
};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};

lazy_static! {
    static ref URL_IN_TEXT: Regex = Regex::new(r"https?://[^\s,]+").unwrap();
}

/// Collapse whitespace runs, drop control and zero-width characters, trim.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control() && !is_invisible(*c))
        .collect::<String>()
        .trim()
        .to_string()
}

fn is_invisible(c: char) -> bool {
    matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}')
}

/// Every http(s) URL in a cell: anchor hrefs first, then URLs written in the text.
/// Duplicates within the cell are dropped.
pub fn url_candidates(cell: &RawCell) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    let from_anchors = cell.hrefs.iter().map(|href| href.trim());
    let from_text = URL_IN_TEXT.find_iter(&cell.text).map(|m| m.as_str().trim());

    for url in from_anchors.chain(from_text) {
        if !is_http(url) {
            continue;
        }
        if seen.insert(url.to_string()) {
            urls.push(url.to_string());
        }
    }

    urls
}

fn is_http(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Build the field map for one row.
///
/// Pure function of its input: the same row always yields the same map.
pub fn extract_row(row: &RawRow) -> ScrapedRow {
    let mut out = ScrapedRow::new();

    let mut single: HashMap<LinkCategory, String> = HashMap::new();
    let mut social: Vec<String> = Vec::new();
    let mut websites: Vec<String> = Vec::new();
    let mut recorded: HashSet<String> = HashSet::new();
    let mut any_link = false;

    for (i, cell) in row.cells.iter().enumerate() {
        let column = i + 1;
        let mut fallback = String::new();

        for url in url_candidates(cell) {
            any_link = true;
            let category = classify_url(&url);

            match category {
                LinkCategory::Social => {
                    if !social.contains(&url) {
                        social.push(url.clone());
                    }
                }
                LinkCategory::Website => {
                    if fallback.is_empty() && !recorded.contains(&url) {
                        fallback = url.clone();
                    }
                    if !websites.contains(&url) {
                        websites.push(url.clone());
                    }
                }
                _ => {
                    single.entry(category).or_insert_with(|| url.clone());
                }
            }

            recorded.insert(url);
        }

        out.insert(column_text_field(column), normalize_text(&cell.text));
        out.insert(column_url_field(column), fallback);
    }

    if any_link {
        for category in LinkCategory::ALL {
            let value = match category {
                LinkCategory::Social => social.join(LIST_SEPARATOR),
                LinkCategory::Website => websites.join(LIST_SEPARATOR),
                _ => single.remove(&category).unwrap_or_default(),
            };
            out.insert(category.field(), value);
        }
    }

    out
}
