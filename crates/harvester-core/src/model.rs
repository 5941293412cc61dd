use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Classified field holding the Apollo person link
pub const APOLLO_LINK: &str = "Apollo Link";
/// Classified field holding the LinkedIn profile URL
pub const LINKEDIN_URL: &str = "LinkedIn URL";
/// Classified field holding the LinkedIn company page
pub const LINKEDIN_COMPANY: &str = "LinkedIn Company";
/// Classified field holding the Apollo organization link
pub const APOLLO_COMPANY_URL: &str = "Apollo_Company_URL";
/// Classified field holding social profiles, joined with `", "`
pub const SOCIAL_URLS: &str = "Social_URLs";
/// Classified field holding company websites, joined with `", "`
pub const WEBSITE: &str = "Website";

/// Separator used by the multi-valued classified fields
pub const LIST_SEPARATOR: &str = ", ";

/// Order in which classified fields are appended to a row
pub const CLASSIFIED_FIELDS: [&str; 6] = [
    APOLLO_LINK,
    LINKEDIN_URL,
    LINKEDIN_COMPANY,
    APOLLO_COMPANY_URL,
    SOCIAL_URLS,
    WEBSITE,
];

/// Field name of the normalized text of a 1-based column
pub fn column_text_field(column: usize) -> String {
    format!("Column_{}_Text", column)
}

/// Field name of the positional fallback URL of a 1-based column
pub fn column_url_field(column: usize) -> String {
    format!("Column_{}_URL", column)
}

/// One data cell as read from the page, before any normalization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCell {
    /// `textContent` of the cell
    pub text: String,
    /// Resolved `href` of every anchor inside the cell, in document order
    #[serde(default)]
    pub hrefs: Vec<String>,
}

impl RawCell {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            hrefs: Vec::new(),
        }
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.hrefs.push(href.into());
        self
    }
}

/// One table row as read from the page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    pub cells: Vec<RawCell>,
}

impl RawRow {
    pub fn new(cells: Vec<RawCell>) -> Self {
        Self { cells }
    }

    /// Trimmed cell texts joined with `|`, the basis for identity and stability checks
    pub fn signature(&self) -> String {
        self.cells
            .iter()
            .map(|cell| cell.text.trim())
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Field-name-to-value record extracted from a row.
///
/// Insertion order is preserved, both in memory and in the JSON form, so that
/// exported tables keep the column order the row was built with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapedRow {
    fields: Vec<(String, String)>,
}

impl ScrapedRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a field, replacing the value in place if the key already exists
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Split a multi-valued field (`Website`, `Social_URLs`) into its entries
    pub fn list(&self, key: &str) -> Vec<&str> {
        self.get(key)
            .map(|value| {
                value
                    .split(LIST_SEPARATOR)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ScrapedRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = ScrapedRow::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

impl Serialize for ScrapedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ScrapedRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = ScrapedRow;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of string fields")
            }

            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<ScrapedRow, M::Error> {
                let mut row = ScrapedRow::new();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    row.insert(k, v);
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

/// How accepted rows leave the scrape loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Stream rows to the local receiver over HTTP
    #[default]
    Realtime,
    /// Emit page batches to the rendering surface for later export
    Save,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::Realtime => "realtime",
            DeliveryMode::Save => "save",
        }
    }
}

/// Rows bound for the receiver, tagged with the session's correlation id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundBatch {
    pub correlation_id: String,
    pub rows: Vec<ScrapedRow>,
}

impl OutboundBatch {
    pub fn new(correlation_id: impl Into<String>, rows: Vec<ScrapedRow>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            rows,
        }
    }
}
