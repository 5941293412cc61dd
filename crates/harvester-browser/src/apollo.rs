use crate::js_scripts::{
    DEFAULT_NEXT_SELECTOR, EXCLUDE_READ_SCRIPT, EXCLUDE_SAVE_SCRIPT, EXCLUDE_WRITE_SCRIPT,
    NEXT_CLICK_SCRIPT, NEXT_PRESENT_SCRIPT, NOTICE_SCRIPT, PAGE_NUMBER_SCRIPT,
    PICK_CANCEL_SCRIPT, PICK_POLL_SCRIPT, PICK_START_SCRIPT, ROWS_SCRIPT, block_status_script,
    call, watch_challenge_script,
};
use crate::{Error, Result};
use async_trait::async_trait;
use chromiumoxide::Page;
use harvester_core::exclude::merge_exclude_text;
use harvester_core::{BlockReason, PageAdapter, RawRow};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct TextResult {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockResult {
    access_denied: bool,
    challenge: bool,
}

#[derive(Debug, Deserialize)]
struct ExcludeResult {
    present: bool,
    value: String,
}

#[derive(Debug, Deserialize)]
struct PickResult {
    selector: String,
}

/// Parse the digits out of the page indicator text
pub fn parse_page_number(text: &str) -> Option<u32> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok().filter(|n| *n > 0)
}

/// Apollo people search page driven over CDP
pub struct ApolloPage {
    page: Page,
    next_selector: String,
    pick_timeout: Duration,
    pick_poll: Duration,
}

impl ApolloPage {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            next_selector: DEFAULT_NEXT_SELECTOR.to_string(),
            pick_timeout: Duration::from_secs(120),
            pick_poll: Duration::from_millis(250),
        }
    }

    /// Use a stored selector for the next-page control
    pub fn with_next_selector(mut self, selector: Option<String>) -> Self {
        if let Some(selector) = selector.filter(|s| !s.trim().is_empty()) {
            self.next_selector = selector;
        }
        self
    }

    pub fn with_pick_timeout(mut self, timeout: Duration) -> Self {
        self.pick_timeout = timeout;
        self
    }

    pub fn next_selector(&self) -> &str {
        &self.next_selector
    }

    pub fn inner(&self) -> &Page {
        &self.page
    }

    async fn eval<T: DeserializeOwned>(&self, script: impl Into<String>) -> Result<T> {
        let result = self.page.evaluate(script.into()).await?;
        result
            .into_value()
            .map_err(|e| Error::Script(format!("Unexpected script result: {}", e)))
    }
}

#[async_trait]
impl PageAdapter for ApolloPage {
    async fn rows(&mut self) -> harvester_core::Result<Vec<RawRow>> {
        Ok(self.eval(ROWS_SCRIPT).await?)
    }

    async fn current_page_number(&mut self) -> harvester_core::Result<Option<u32>> {
        let result: TextResult = self.eval(PAGE_NUMBER_SCRIPT).await?;
        Ok(parse_page_number(&result.text))
    }

    async fn next_control_present(&mut self) -> harvester_core::Result<bool> {
        let script = call(NEXT_PRESENT_SCRIPT, &[json!(self.next_selector)]);
        Ok(self.eval(script).await?)
    }

    async fn click_next_control(&mut self) -> harvester_core::Result<bool> {
        tracing::debug!("Clicking next control {}", self.next_selector);
        let script = call(NEXT_CLICK_SCRIPT, &[json!(self.next_selector)]);
        Ok(self.eval(script).await?)
    }

    async fn block_status(&mut self) -> harvester_core::Result<Option<BlockReason>> {
        let status: BlockResult = self.eval(block_status_script()).await?;
        Ok(if status.access_denied {
            Some(BlockReason::AccessDenied)
        } else if status.challenge {
            Some(BlockReason::SecurityChallenge)
        } else {
            None
        })
    }

    async fn watch_for_challenge(&mut self, enabled: bool) -> harvester_core::Result<()> {
        let _: bool = self
            .eval(call(&watch_challenge_script(), &[json!(enabled)]))
            .await?;
        Ok(())
    }

    async fn exclude_input_present(&mut self) -> harvester_core::Result<bool> {
        let area: ExcludeResult = self.eval(EXCLUDE_READ_SCRIPT).await?;
        Ok(area.present)
    }

    async fn append_exclude_entries(&mut self, entries: &[String]) -> harvester_core::Result<bool> {
        let area: ExcludeResult = self.eval(EXCLUDE_READ_SCRIPT).await?;
        if !area.present {
            return Ok(false);
        }
        let merged = merge_exclude_text(&area.value, entries);
        Ok(self.eval(call(EXCLUDE_WRITE_SCRIPT, &[json!(merged)])).await?)
    }

    async fn click_exclude_save(&mut self) -> harvester_core::Result<bool> {
        Ok(self.eval(EXCLUDE_SAVE_SCRIPT).await?)
    }

    async fn show_stopped_notice(&mut self, message: &str) -> harvester_core::Result<()> {
        let _: bool = self.eval(call(NOTICE_SCRIPT, &[json!(message)])).await?;
        Ok(())
    }

    async fn pick_next_control(&mut self) -> harvester_core::Result<Option<String>> {
        let _: bool = self.eval(PICK_START_SCRIPT).await?;
        tracing::info!("Click the next-page button in the browser window");

        let deadline = tokio::time::Instant::now() + self.pick_timeout;
        while tokio::time::Instant::now() < deadline {
            tokio::time::sleep(self.pick_poll).await;
            let picked: PickResult = self.eval(PICK_POLL_SCRIPT).await?;
            if !picked.selector.is_empty() {
                self.next_selector = picked.selector.clone();
                return Ok(Some(picked.selector));
            }
        }

        tracing::warn!("No element picked within {:?}", self.pick_timeout);
        let _: bool = self.eval(PICK_CANCEL_SCRIPT).await?;
        Ok(None)
    }
}
