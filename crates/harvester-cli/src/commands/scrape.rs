use crate::BrowserArgs;
use crate::commands::browser;
use anyhow::{Context, Result};
use console::{Term, style};
use harvester_core::settings::{SettingsStore, harvester_home};
use harvester_core::table::{ResultsTable, csv_file_name};
use harvester_core::wait::TokioClock;
use harvester_core::{
    Command, Controller, DeliveryMode, Event, StartOptions, StopReason, Timing,
};
use harvester_delivery::{DeliveryConfig, DeliveryWorker, HttpTransport};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct ScrapeOptions {
    pub pages: u32,
    pub cid: String,
    pub mode: DeliveryMode,
    pub output: Option<PathBuf>,
    pub receiver: String,
    pub exclude_settle: Duration,
    pub retry_delay: Duration,
}

#[derive(Default)]
struct Progress {
    rows: usize,
    pages: usize,
}

pub fn execute(options: ScrapeOptions, browser_args: &BrowserArgs, home: Option<PathBuf>) -> Result<()> {
    let home = harvester_home(home)?;
    let store = SettingsStore::in_home(&home);
    let settings = store
        .load()
        .with_context(|| format!("Failed to read {}", store.path().display()))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async {
        let (browser, page) = browser::open(browser_args, &home).await?;
        let page = page.with_next_selector(settings.next_button_selector.clone());
        println!("✅ Connected, next control: {}", page.next_selector());

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (commands_tx, mut commands_rx) = mpsc::unbounded_channel();

        let timing = Timing {
            exclude_settle: options.exclude_settle,
            ..Timing::default()
        };
        let mut controller = Controller::new(page, events_tx.clone())
            .with_timing(timing)
            .with_settings(store.clone());

        let mut worker = None;
        if options.mode == DeliveryMode::Realtime {
            let config = DeliveryConfig {
                retry_delay: options.retry_delay,
                ..DeliveryConfig::default()
            };
            let transport = HttpTransport::new(&options.receiver, config.request_timeout)?;
            match transport.health().await {
                Ok(true) => println!("✅ Receiver at {} is healthy", transport.base_url()),
                _ => println!(
                    "{}",
                    style(format!(
                        "⚠️  Receiver at {} is not answering; rows will be retried until it is",
                        transport.base_url()
                    ))
                    .yellow()
                ),
            }
            let (handle, task) =
                DeliveryWorker::spawn(transport, config, Arc::new(TokioClock::new()), events_tx);
            controller = controller.with_sink(Box::new(handle));
            worker = Some(task);
        }

        let start = StartOptions {
            max_pages: options.pages,
            mode: options.mode,
            correlation_id: options.cid.clone(),
        };
        let mut session = tokio::spawn(async move { controller.scrape(start, &mut commands_rx).await });

        println!();
        println!(
            "📄 Scraping {} page(s) per pass in {} mode. Press 'q' or Ctrl+C to stop.",
            options.pages,
            options.mode.as_str()
        );
        println!();

        tokio::spawn(stop_on(
            async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::debug!("Failed to listen for Ctrl+C: {}", e);
                    std::future::pending::<()>().await;
                }
            },
            commands_tx.clone(),
        ));

        // Key reader; blocks on the terminal until 'q' or the runtime shuts down
        tokio::task::spawn_blocking(move || {
            let term = Term::stdout();
            while let Ok(key) = term.read_char() {
                if key.eq_ignore_ascii_case(&'q') {
                    if commands_tx.send(Command::StopScraping).is_err() {
                        tracing::debug!("Session already finished");
                    }
                    break;
                }
            }
        });

        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(120));
        spinner.set_message("Waiting for rows...");

        let mut table = ResultsTable::new(settings.column_names.clone());
        let mut progress = Progress::default();

        let outcome = loop {
            tokio::select! {
                Some(event) = events_rx.recv() => {
                    handle_event(event, &spinner, &mut table, &mut progress);
                }
                joined = &mut session => break joined?,
            }
        };
        while let Ok(event) = events_rx.try_recv() {
            handle_event(event, &spinner, &mut table, &mut progress);
        }
        spinner.finish_and_clear();

        if let Some(task) = worker {
            let _ = tokio::time::timeout(Duration::from_secs(2), task).await;
        }
        browser.close();

        match &outcome {
            None => println!("❌ Scraping did not start"),
            Some(StopReason::User) => println!("⏹️  Scraping stopped"),
            Some(reason) => println!("🛑 {}", reason.message()),
        }
        println!("📊 {}", summary(options.mode, &progress));

        if options.mode == DeliveryMode::Save {
            write_export(&table, &options)?;
        }
        Ok::<_, anyhow::Error>(())
    });

    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

/// Ask the running session to stop once `signal` fires
async fn stop_on<F>(signal: F, commands: mpsc::UnboundedSender<Command>)
where
    F: std::future::Future<Output = ()>,
{
    signal.await;
    tracing::debug!("Interrupt received, stopping session");
    if commands.send(Command::StopScraping).is_err() {
        tracing::debug!("Session already finished");
    }
}

fn summary(mode: DeliveryMode, progress: &Progress) -> String {
    match mode {
        DeliveryMode::Realtime => format!("{} row(s) queued for the receiver", progress.rows),
        DeliveryMode::Save => format!("{} row(s) from {} page(s)", progress.rows, progress.pages),
    }
}

fn handle_event(event: Event, spinner: &ProgressBar, table: &mut ResultsTable, progress: &mut Progress) {
    match event {
        Event::ScrapedData { .. } => {
            progress.rows += 1;
            spinner.set_message(format!("{} row(s) queued for delivery", progress.rows));
        }
        Event::ScrapedDataBatch { rows } => {
            progress.pages += 1;
            progress.rows += rows.len();
            for row in &rows {
                table.push(row);
            }
            spinner.set_message(format!(
                "{} row(s) collected from {} page(s)",
                table.len(),
                progress.pages
            ));
        }
        Event::Error { message } => {
            spinner.println(format!("{}", style(format!("❌ {}", message)).red()));
        }
        Event::ScrapeStopped { reason } => {
            tracing::debug!("Session stopped: {:?}", reason);
        }
        Event::NextButtonSelected { selector } => {
            spinner.println(format!("Next control set to {}", selector));
        }
    }
}

fn write_export(table: &ResultsTable, options: &ScrapeOptions) -> Result<()> {
    if table.is_empty() {
        println!("No rows collected, nothing to export");
        return Ok(());
    }

    let path = options.output.clone().unwrap_or_else(|| {
        PathBuf::from(csv_file_name(
            &options.cid,
            chrono::Local::now().date_naive(),
        ))
    });
    let file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let written = table.write_csv(file)?;

    println!("✅ Wrote {} row(s) to {}", written, path.display());
    Ok(())
}
