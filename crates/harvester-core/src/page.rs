use crate::Result;
use crate::model::RawRow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Condition under which the host page refuses further automation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    /// "Access denied" marker shown by the host
    AccessDenied,
    /// Visible security-challenge widget
    SecurityChallenge,
}

/// Everything the scrape loop needs from the host page.
///
/// The loop only ever sees this trait, so the site-specific selectors live in
/// a single implementation.
#[async_trait]
pub trait PageAdapter: Send {
    /// Rows of the results table, in document order
    async fn rows(&mut self) -> Result<Vec<RawRow>>;

    /// Page number shown by the host, if it can be read
    async fn current_page_number(&mut self) -> Result<Option<u32>>;

    /// Whether the "next page" control is present
    async fn next_control_present(&mut self) -> Result<bool>;

    /// Click the "next page" control. Returns false if it disappeared.
    async fn click_next_control(&mut self) -> Result<bool>;

    /// Check for access-denied or security-challenge conditions
    async fn block_status(&mut self) -> Result<Option<BlockReason>>;

    /// Start or stop watching the page for challenge widgets between polls
    async fn watch_for_challenge(&mut self, enabled: bool) -> Result<()>;

    /// Whether the exclude-list input is open on the page
    async fn exclude_input_present(&mut self) -> Result<bool>;

    /// Append lines to the exclude-list input and notify the host of the
    /// change. Returns false if the input is missing.
    async fn append_exclude_entries(&mut self, entries: &[String]) -> Result<bool>;

    /// Click the host's save control for the exclude list. Returns false if
    /// the control is missing.
    async fn click_exclude_save(&mut self) -> Result<bool>;

    /// Show a blocking "scraping stopped" notice to the user
    async fn show_stopped_notice(&mut self, message: &str) -> Result<()>;

    /// Let the user point at the "next page" control and return a selector for it
    async fn pick_next_control(&mut self) -> Result<Option<String>>;
}
