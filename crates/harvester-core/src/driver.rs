//! Scrape loop
//!
//! [`Controller`] owns the page adapter and runs one session at a time in
//! response to [`Command`]s, reporting progress as [`Event`]s. A session walks
//! the pagination state machine:
//!
//! ```text
//! Scraping(k) -> AwaitingStabilization -> ExtractingRows -> AwaitingNextPage -> Scraping(k+1)
//!                                                       \-> ExcludeProcessing -> Scraping(1), next pass
//! ```
//!
//! until it is stopped or hits a fatal condition. Every exit goes through
//! [`Controller::teardown`].

use crate::events::{Command, Event, StartOptions};
use crate::exclude::write_exclude_list;
use crate::model::{DeliveryMode, OutboundBatch, RawRow, ScrapedRow};
use crate::page::PageAdapter;
use crate::session::{SessionState, StopReason};
use crate::settings::SettingsStore;
use crate::sink::RowSink;
use crate::wait::{Clock, Stabilization, TokioClock, wait_for_stable, wait_until};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Shown when a session is started without the exclude input open
pub const EXCLUDE_INPUT_REQUIRED: &str =
    "Please open the exclude text area first before starting the scraper";

/// Poll intervals and bounds of the scrape loop
#[derive(Debug, Clone)]
pub struct Timing {
    /// Wait for the table before extracting a page
    pub page_stabilization: Stabilization,
    /// Wait for the table after moving to the next page
    pub navigation_stabilization: Stabilization,
    /// Per-row wait used when the page did not stabilize
    pub row_ready: Stabilization,
    /// Interval of the next-control and next-rows polls
    pub poll_interval: Duration,
    pub next_control_timeout: Duration,
    /// Pause between finding the next control and clicking it
    pub next_control_settle: Duration,
    pub next_rows_timeout: Duration,
    /// Pause after clicking the exclude-list save control
    pub exclude_settle: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            page_stabilization: Stabilization {
                interval: Duration::from_millis(150),
                samples: 2,
                timeout: Duration::from_secs(6),
            },
            navigation_stabilization: Stabilization {
                interval: Duration::from_millis(150),
                samples: 2,
                timeout: Duration::from_secs(5),
            },
            row_ready: Stabilization {
                interval: Duration::from_millis(200),
                samples: 2,
                timeout: Duration::from_millis(1200),
            },
            poll_interval: Duration::from_millis(200),
            next_control_timeout: Duration::from_secs(10),
            next_control_settle: Duration::from_secs(1),
            next_rows_timeout: Duration::from_secs(10),
            exclude_settle: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Scraping,
    AwaitingStabilization,
    ExtractingRows { stable: bool },
    AwaitingNextPage,
    ExcludeProcessing,
}

enum Step {
    Next(Phase),
    Stop(StopReason),
}

/// Runs scraping sessions against one page
pub struct Controller<A: PageAdapter> {
    page: A,
    events: UnboundedSender<Event>,
    clock: Arc<dyn Clock>,
    timing: Timing,
    sink: Option<Box<dyn RowSink>>,
    settings: Option<SettingsStore>,
}

impl<A: PageAdapter> Controller<A> {
    pub fn new(page: A, events: UnboundedSender<Event>) -> Self {
        Self {
            page,
            events,
            clock: Arc::new(TokioClock::new()),
            timing: Timing::default(),
            sink: None,
            settings: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Destination for rows in realtime mode
    pub fn with_sink(mut self, sink: Box<dyn RowSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Where a picked next-button selector is persisted
    pub fn with_settings(mut self, settings: SettingsStore) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn page(&self) -> &A {
        &self.page
    }

    /// Serve commands until the command channel closes
    pub async fn run(mut self, mut commands: UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::SelectNextButton => self.select_next_button().await,
                Command::StartScraping(options) => {
                    self.scrape(options, &mut commands).await;
                }
                Command::StopScraping => {
                    tracing::debug!("Stop command received with no active session");
                }
            }
        }
        tracing::debug!("Command channel closed, controller exiting");
    }

    /// Let the user pick the next-page control and remember it
    pub async fn select_next_button(&mut self) {
        let selector = match self.page.pick_next_control().await {
            Ok(Some(selector)) => selector,
            Ok(None) => {
                self.emit(Event::Error {
                    message: "No next button was selected".to_string(),
                });
                return;
            }
            Err(e) => {
                self.emit(Event::Error {
                    message: format!("Next button selection failed: {}", e),
                });
                return;
            }
        };

        tracing::info!("Stored next button selector: {}", selector);
        if let Some(store) = &self.settings
            && let Err(e) = store.update(|s| s.next_button_selector = Some(selector.clone()))
        {
            tracing::warn!("Failed to persist next button selector: {}", e);
        }

        self.emit(Event::NextButtonSelected { selector });
    }

    /// Run one session to its end.
    ///
    /// Returns `None` if the session could not start, otherwise why it stopped.
    pub async fn scrape(
        &mut self,
        options: StartOptions,
        commands: &mut UnboundedReceiver<Command>,
    ) -> Option<StopReason> {
        if options.mode == DeliveryMode::Realtime && self.sink.is_none() {
            self.emit(Event::Error {
                message: "Realtime delivery is not configured".to_string(),
            });
            return None;
        }

        match self.page.exclude_input_present().await {
            Ok(true) => {}
            Ok(false) => {
                self.emit(Event::Error {
                    message: EXCLUDE_INPUT_REQUIRED.to_string(),
                });
                return None;
            }
            Err(e) => {
                self.emit(Event::Error {
                    message: format!("Could not inspect the page: {}", e),
                });
                return None;
            }
        }

        let mut session = SessionState::new(&options);
        tracing::info!(
            "Starting new scraping session: {} page(s), {} mode, cid {}",
            session.max_pages,
            session.mode.as_str(),
            session.correlation_id
        );

        let reason = match self.run_session(&mut session, commands).await {
            Ok(reason) => reason,
            Err(e) => {
                tracing::error!("Error during scraping: {}", e);
                StopReason::Failed(e.to_string())
            }
        };

        self.teardown(&mut session, reason.clone()).await;
        Some(reason)
    }

    async fn run_session(
        &mut self,
        session: &mut SessionState,
        commands: &mut UnboundedReceiver<Command>,
    ) -> Result<StopReason> {
        if let Some(block) = self.page.block_status().await? {
            return Ok(block.into());
        }
        self.page.watch_for_challenge(true).await?;

        let mut phase = Phase::Scraping;
        loop {
            if self.stop_requested(commands) {
                return Ok(StopReason::User);
            }
            match self.advance(session, phase, commands).await? {
                Step::Next(next) => phase = next,
                Step::Stop(reason) => return Ok(reason),
            }
        }
    }

    async fn advance(
        &mut self,
        session: &mut SessionState,
        phase: Phase,
        commands: &mut UnboundedReceiver<Command>,
    ) -> Result<Step> {
        match phase {
            Phase::Scraping => self.enter_page(session).await,
            Phase::AwaitingStabilization => {
                let stable = self.wait_for_table(self.timing.page_stabilization).await?;
                if !stable {
                    tracing::debug!("Rows did not stabilize, waiting per row");
                }
                Ok(Step::Next(Phase::ExtractingRows { stable }))
            }
            Phase::ExtractingRows { stable } => self.extract_page(session, stable, commands).await,
            Phase::AwaitingNextPage => self.next_page(session, commands).await,
            Phase::ExcludeProcessing => self.process_excludes(session).await,
        }
    }

    async fn enter_page(&mut self, session: &mut SessionState) -> Result<Step> {
        if let Some(block) = self.page.block_status().await? {
            return Ok(Step::Stop(block.into()));
        }

        // The host's page number wins over the local counter
        match self.page.current_page_number().await? {
            Some(page) => session.current_page = page,
            None => tracing::debug!(
                "Page number unreadable, keeping counter at {}",
                session.current_page
            ),
        }

        if session.awaiting_first_page {
            session.awaiting_first_page = false;
            if session.current_page > 1 {
                tracing::info!(
                    "Host still shows page {} after saving excludes, moving on",
                    session.current_page
                );
                return Ok(Step::Next(Phase::AwaitingNextPage));
            }
        }

        tracing::info!(
            "Processing page {}/{} (pass {})",
            session.current_page,
            session.max_pages,
            session.iteration
        );
        Ok(Step::Next(Phase::AwaitingStabilization))
    }

    async fn extract_page(
        &mut self,
        session: &mut SessionState,
        stable: bool,
        commands: &mut UnboundedReceiver<Command>,
    ) -> Result<Step> {
        let rows = self.page.rows().await?;
        let mut accepted = Vec::new();

        for (index, snapshot) in rows.iter().enumerate() {
            if self.stop_requested(commands) {
                tracing::info!("Scraping stopped by user");
                return Ok(Step::Stop(StopReason::User));
            }
            if let Some(block) = self.page.block_status().await? {
                return Ok(Step::Stop(block.into()));
            }

            let raw = if stable {
                snapshot.clone()
            } else {
                self.wait_for_row(index).await?.unwrap_or_else(|| snapshot.clone())
            };

            if let Some(row) = session.admit(&raw) {
                accepted.push(row);
            }
        }

        session.pages_processed += 1;
        tracing::info!(
            "Page {}: {} new row(s), {} duplicate(s)",
            session.current_page,
            accepted.len(),
            rows.len() - accepted.len()
        );
        self.dispatch(session, accepted).await?;

        if session.is_last_page() {
            tracing::info!("Reached last page, processing excludes");
            Ok(Step::Next(Phase::ExcludeProcessing))
        } else {
            Ok(Step::Next(Phase::AwaitingNextPage))
        }
    }

    async fn next_page(
        &mut self,
        session: &mut SessionState,
        commands: &mut UnboundedReceiver<Command>,
    ) -> Result<Step> {
        let clock = Arc::clone(&self.clock);
        let poll = self.timing.poll_interval;

        let found = wait_until(
            clock.as_ref(),
            poll,
            self.timing.next_control_timeout,
            &mut self.page,
            |page| Box::pin(async move { page.next_control_present().await }),
        )
        .await?;
        if !found {
            tracing::warn!("Next button not found after waiting");
            return Ok(Step::Stop(StopReason::NextControlMissing));
        }

        clock.sleep(self.timing.next_control_settle).await;
        if self.stop_requested(commands) {
            return Ok(Step::Stop(StopReason::User));
        }
        if let Some(block) = self.page.block_status().await? {
            return Ok(Step::Stop(block.into()));
        }

        let before = table_signature(&self.page.rows().await?);
        if !self.page.click_next_control().await? {
            return Ok(Step::Stop(StopReason::NextControlMissing));
        }
        // Optimistic; the host's number is read back on the next page entry
        session.current_page += 1;

        let appeared = wait_until(
            clock.as_ref(),
            poll,
            self.timing.next_rows_timeout,
            &mut self.page,
            |page| {
                let before = before.clone();
                Box::pin(async move {
                    let signature = table_signature(&page.rows().await?);
                    Ok(!signature.is_empty() && signature != before)
                })
            },
        )
        .await?;
        if !appeared {
            tracing::warn!("No new rows appeared after clicking next");
            return Ok(Step::Stop(StopReason::NextRowsMissing));
        }

        self.wait_for_table(self.timing.navigation_stabilization)
            .await?;
        Ok(Step::Next(Phase::Scraping))
    }

    async fn process_excludes(&mut self, session: &mut SessionState) -> Result<Step> {
        let websites = session.websites();
        let clock = Arc::clone(&self.clock);

        let saved = write_exclude_list(
            &mut self.page,
            clock.as_ref(),
            &websites,
            self.timing.exclude_settle,
        )
        .await?;
        if !saved {
            return Ok(Step::Stop(StopReason::ExcludeFailed));
        }

        session.complete_pass();
        tracing::info!("Starting iteration {}", session.iteration);
        Ok(Step::Next(Phase::Scraping))
    }

    /// Hand accepted rows to the surface the session's mode selects
    async fn dispatch(&mut self, session: &SessionState, rows: Vec<ScrapedRow>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        match session.mode {
            DeliveryMode::Realtime => {
                for row in &rows {
                    self.emit(Event::ScrapedData { row: row.clone() });
                }
                if let Some(sink) = &mut self.sink {
                    sink.deliver(OutboundBatch::new(session.correlation_id.clone(), rows))
                        .await?;
                }
            }
            DeliveryMode::Save => {
                tracing::debug!("Sending batch of {} rows", rows.len());
                self.emit(Event::ScrapedDataBatch { rows });
            }
        }
        Ok(())
    }

    async fn wait_for_table(&mut self, params: Stabilization) -> Result<bool> {
        let clock = Arc::clone(&self.clock);
        wait_for_stable(clock.as_ref(), params, &mut self.page, |page| {
            Box::pin(async move { Ok(table_signature(&page.rows().await?)) })
        })
        .await
    }

    /// Wait for one row to settle and return its latest content
    async fn wait_for_row(&mut self, index: usize) -> Result<Option<RawRow>> {
        let clock = Arc::clone(&self.clock);
        wait_for_stable(clock.as_ref(), self.timing.row_ready, &mut self.page, |page| {
            Box::pin(async move {
                let rows = page.rows().await?;
                Ok(rows.get(index).map(RawRow::signature).unwrap_or_default())
            })
        })
        .await?;

        let mut rows = self.page.rows().await?;
        Ok((index < rows.len()).then(|| rows.swap_remove(index)))
    }

    /// Drain pending commands; true if the session should stop
    fn stop_requested(&mut self, commands: &mut UnboundedReceiver<Command>) -> bool {
        loop {
            match commands.try_recv() {
                Ok(Command::StopScraping) => {
                    tracing::info!("Stop command received");
                    return true;
                }
                Ok(other) => {
                    tracing::warn!("Ignoring {:?} while a session is active", other);
                }
                Err(TryRecvError::Empty) => return false,
                Err(TryRecvError::Disconnected) => {
                    tracing::info!("Control surface went away, stopping");
                    return true;
                }
            }
        }
    }

    /// Single exit path of a session: clear state, release the delivery
    /// queue, disarm the page watcher and notify once.
    async fn teardown(&mut self, session: &mut SessionState, reason: StopReason) {
        if !session.active {
            return;
        }
        session.active = false;
        session.clear_cache();

        if let Some(sink) = &mut self.sink
            && let Err(e) = sink.reset().await
        {
            tracing::warn!("Failed to reset delivery queue: {}", e);
        }

        if let Err(e) = self.page.watch_for_challenge(false).await {
            tracing::debug!("Failed to disarm challenge watcher: {}", e);
        }

        let message = reason.message();
        if reason.is_block() {
            tracing::warn!("{}", message);
            if let Err(e) = self.page.show_stopped_notice(&message).await {
                tracing::debug!("Failed to show stopped notice: {}", e);
            }
        }
        if reason.is_error() {
            self.emit(Event::Error { message });
        }

        tracing::info!(
            "Scraping stopped after {} page(s), memory cleaned",
            session.pages_processed
        );
        self.emit(Event::ScrapeStopped { reason });
    }

    fn emit(&self, event: Event) {
        if self.events.send(event).is_err() {
            tracing::debug!("Event receiver dropped");
        }
    }
}

/// Signature of the whole table, used to detect changes between samples
fn table_signature(rows: &[RawRow]) -> String {
    rows.iter()
        .map(RawRow::signature)
        .collect::<Vec<_>>()
        .join("||")
}
