use crate::dedup::{Deduplicator, RowIdentity};
use crate::events::StartOptions;
use crate::extract::extract_row;
use crate::model::{DeliveryMode, RawRow, ScrapedRow, WEBSITE};
use crate::page::BlockReason;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    User,
    AccessDenied,
    SecurityChallenge,
    NextControlMissing,
    NextRowsMissing,
    ExcludeFailed,
    Failed(String),
}

impl StopReason {
    pub fn message(&self) -> String {
        match self {
            StopReason::User => "Scraping stopped by user".to_string(),
            StopReason::AccessDenied => "Access Denied detected on page. Scraping has been stopped \
                to prevent further actions. Please resolve the block before retrying."
                .to_string(),
            StopReason::SecurityChallenge => "Security challenge detected on page. Scraping has \
                been stopped. Complete the challenge before retrying."
                .to_string(),
            StopReason::NextControlMissing => {
                "Next button not found after waiting, scraping stopped".to_string()
            }
            StopReason::NextRowsMissing => {
                "No rows appeared after moving to the next page, scraping stopped".to_string()
            }
            StopReason::ExcludeFailed => {
                "Exclude list could not be saved (text area or save button missing), scraping stopped"
                    .to_string()
            }
            StopReason::Failed(detail) => format!("Error during scraping: {}", detail),
        }
    }

    /// Whether the user should get an error notification for this stop
    pub fn is_error(&self) -> bool {
        !matches!(self, StopReason::User)
    }

    /// Whether the host page is blocking automation
    pub fn is_block(&self) -> bool {
        matches!(self, StopReason::AccessDenied | StopReason::SecurityChallenge)
    }
}

impl From<BlockReason> for StopReason {
    fn from(reason: BlockReason) -> Self {
        match reason {
            BlockReason::AccessDenied => StopReason::AccessDenied,
            BlockReason::SecurityChallenge => StopReason::SecurityChallenge,
        }
    }
}

/// State of one scraping session, owned by the control loop
#[derive(Debug)]
pub struct SessionState {
    pub active: bool,
    pub current_page: u32,
    pub max_pages: u32,
    pub iteration: u32,
    pub mode: DeliveryMode,
    pub correlation_id: String,
    /// Pages extracted since the session started, across passes
    pub pages_processed: u32,
    /// Set after an exclude save until the host is back on its first page
    pub awaiting_first_page: bool,
    seen: Deduplicator,
    cache: Vec<ScrapedRow>,
}

impl SessionState {
    pub fn new(options: &StartOptions) -> Self {
        Self {
            active: true,
            current_page: 1,
            max_pages: options.max_pages.max(1),
            iteration: 1,
            mode: options.mode,
            correlation_id: options.correlation_id.clone(),
            pages_processed: 0,
            awaiting_first_page: false,
            seen: Deduplicator::new(),
            cache: Vec::new(),
        }
    }

    /// Extract a row and keep it if its identity is new this pass
    pub fn admit(&mut self, raw: &RawRow) -> Option<ScrapedRow> {
        let identity = RowIdentity::of(raw);
        if !self.seen.accept(identity.clone()) {
            tracing::debug!("Skipping duplicate row {}", identity);
            return None;
        }
        let row = extract_row(raw);
        self.cache.push(row.clone());
        Some(row)
    }

    pub fn is_last_page(&self) -> bool {
        self.current_page >= self.max_pages
    }

    /// Rows accepted since the last reset
    pub fn cached_rows(&self) -> &[ScrapedRow] {
        &self.cache
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Distinct website URLs across cached rows, in first-seen order
    pub fn websites(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.cache
            .iter()
            .flat_map(|row| row.list(WEBSITE))
            .filter(|url| seen.insert(url.to_string()))
            .map(str::to_string)
            .collect()
    }

    /// Begin the next pass over the requested pages
    pub fn complete_pass(&mut self) {
        self.clear_cache();
        self.iteration += 1;
        self.current_page = 1;
        self.awaiting_first_page = true;
    }

    pub fn clear_cache(&mut self) {
        self.seen.reset();
        self.cache.clear();
    }
}
