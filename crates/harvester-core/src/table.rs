//! Results table for save mode
//!
//! Collects rows in arrival order, keeps the first row's fields as the
//! header, applies user column names and exports CSV.

use crate::Result;
use crate::model::ScrapedRow;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use std::io::Write;

#[derive(Debug, Default)]
pub struct ResultsTable {
    keys: Vec<String>,
    rows: Vec<Vec<String>>,
    seen: HashSet<String>,
    column_names: BTreeMap<String, String>,
}

impl ResultsTable {
    pub fn new(column_names: BTreeMap<String, String>) -> Self {
        Self {
            column_names,
            ..Self::default()
        }
    }

    /// Add a row. Returns false for an exact repeat or an empty row.
    pub fn push(&mut self, row: &ScrapedRow) -> bool {
        if row.is_empty() {
            return false;
        }

        let identifier = row.values().collect::<Vec<_>>().join("|");
        if !self.seen.insert(identifier) {
            tracing::debug!("Skipping duplicate table row");
            return false;
        }

        if self.keys.is_empty() {
            self.keys = row.keys().map(str::to_string).collect();
        } else if !row.keys().eq(self.keys.iter().map(String::as_str)) {
            tracing::warn!("Incoming row structure differs from header; missing fields are left empty");
        }

        let cells = self
            .keys
            .iter()
            .map(|key| row.get(key).unwrap_or_default().to_string())
            .collect();
        self.rows.push(cells);
        true
    }

    /// Field names backing each column
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Column headers with user overrides applied
    pub fn headers(&self) -> Vec<String> {
        self.keys
            .iter()
            .map(|key| self.column_names.get(key).unwrap_or(key).clone())
            .collect()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn rename_column(&mut self, key: &str, name: &str) {
        self.column_names.insert(key.to_string(), name.to_string());
    }

    /// Drop a column and its cells. Returns false if no such column.
    pub fn remove_column(&mut self, key: &str) -> bool {
        let Some(position) = self.keys.iter().position(|k| k == key) else {
            return false;
        };
        self.keys.remove(position);
        for row in &mut self.rows {
            if position < row.len() {
                row.remove(position);
            }
        }
        self.column_names.remove(key);
        true
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.rows.clear();
        self.seen.clear();
    }

    /// Write the table as CSV with every field quoted.
    ///
    /// Invisible characters are removed and rows whose cells are all empty are
    /// skipped. Returns the number of data rows written.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let mut csv = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Always)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(writer);

        let headers: Vec<String> = self.headers().iter().map(|h| remove_invisibles(h)).collect();
        csv.write_record(&headers)?;

        let mut written = 0;
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(|c| remove_invisibles(c)).collect();
            if cells.iter().all(String::is_empty) {
                continue;
            }
            csv.write_record(&cells)?;
            written += 1;
        }

        csv.flush()?;
        Ok(written)
    }
}

/// Replace non-breaking spaces, drop zero-width characters, trim
pub fn remove_invisibles(text: &str) -> String {
    text.replace('\u{00A0}', " ")
        .chars()
        .filter(|c| !matches!(c, '\u{200B}'..='\u{200D}' | '\u{FEFF}'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Keep `[A-Za-z0-9_-]`, replace everything else with `_`
pub fn sanitize_cid(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Export file name: `<cid>_<YYYYMMDD>.csv`, `scrape` when the cid is empty
pub fn csv_file_name(cid: &str, date: NaiveDate) -> String {
    let safe = sanitize_cid(cid);
    let stem = if safe.is_empty() { "scrape" } else { &safe };
    format!("{}_{}.csv", stem, date.format("%Y%m%d"))
}
