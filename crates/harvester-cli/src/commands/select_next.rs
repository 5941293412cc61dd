use crate::BrowserArgs;
use crate::commands::browser;
use anyhow::{Result, bail};
use harvester_core::settings::{SettingsStore, harvester_home};
use harvester_core::{Controller, Event};
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Let the user click the next-page control and store its selector
pub fn execute(browser_args: &BrowserArgs, home: Option<PathBuf>) -> Result<()> {
    let home = harvester_home(home)?;
    let store = SettingsStore::in_home(&home);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async {
        let (browser, page) = browser::open(browser_args, &home).await?;
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut controller = Controller::new(page, events_tx).with_settings(store.clone());

        println!("👆 Click the next-page button in the Chrome window...");
        controller.select_next_button().await;
        drop(controller);
        browser.close();

        while let Some(event) = events_rx.recv().await {
            match event {
                Event::NextButtonSelected { selector } => {
                    println!("✅ Next button set to: {}", selector);
                    println!("   Saved to {}", store.path().display());
                    return Ok(());
                }
                Event::Error { message } => bail!(message),
                other => tracing::debug!("Ignoring event {:?}", other),
            }
        }
        bail!("Selection ended without a result")
    });

    runtime.shutdown_timeout(std::time::Duration::from_millis(100));
    result
}
