use crate::{Error, Result};
use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;

const CONNECT_ATTEMPTS: u32 = 5;
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Live CDP connection to a Chrome instance
pub struct CdpSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    debugging_port: u16,
}

impl CdpSession {
    /// Connect to Chrome on `debugging_port`, retrying while it starts up
    pub async fn connect(debugging_port: u16) -> Result<Self> {
        let endpoint = format!("http://localhost:{}", debugging_port);
        tracing::info!("Connecting to Chrome on port {}", debugging_port);

        let mut attempts_left = CONNECT_ATTEMPTS;
        let (browser, mut handler) = loop {
            tracing::debug!("Attempting CDP connection to {}...", endpoint);
            match Browser::connect(&endpoint).await {
                Ok(connection) => break connection,
                Err(e) => {
                    attempts_left -= 1;
                    if attempts_left == 0 {
                        return Err(Error::Cdp(format!(
                            "Failed to connect to Chrome after {} attempts: {}",
                            CONNECT_ATTEMPTS, e
                        )));
                    }
                    tracing::debug!(
                        "CDP connection attempt failed, retrying... ({} left)",
                        attempts_left
                    );
                    tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                }
            }
        };
        tracing::info!("CDP connection established");

        // Commands only complete while the handler is polled
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("CDP handler event error (continuing): {}", e);
                }
            }
        });

        Ok(Self {
            browser,
            handler_task,
            debugging_port,
        })
    }

    pub fn debugging_port(&self) -> u16 {
        self.debugging_port
    }

    /// The open tab whose URL contains `url_fragment`, else the first tab,
    /// else a new tab at `fallback_url`
    pub async fn find_page(&self, url_fragment: &str, fallback_url: &str) -> Result<Page> {
        // Give a freshly launched Chrome a moment to open its first tab
        tokio::time::sleep(CONNECT_RETRY_DELAY).await;

        let pages = self.browser.pages().await?;
        for page in &pages {
            if let Ok(Some(url)) = page.url().await
                && url.contains(url_fragment)
            {
                tracing::info!("Using open tab {}", url);
                return Ok(page.clone());
            }
        }

        if let Some(page) = pages.into_iter().next() {
            tracing::warn!("No tab matching '{}', using the first tab", url_fragment);
            return Ok(page);
        }

        tracing::info!("No open tabs, opening {}", fallback_url);
        Ok(self.browser.new_page(fallback_url).await?)
    }
}

impl Drop for CdpSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}
