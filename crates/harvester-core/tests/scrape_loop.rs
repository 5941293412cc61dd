use async_trait::async_trait;
use harvester_core::driver::EXCLUDE_INPUT_REQUIRED;
use harvester_core::exclude::merge_exclude_text;
use harvester_core::model::WEBSITE;
use harvester_core::settings::SettingsStore;
use harvester_core::wait::VirtualClock;
use harvester_core::{
    BlockReason, Command, Controller, DeliveryMode, Event, OutboundBatch, PageAdapter, RawCell,
    RawRow, Result, RowSink, StartOptions, StopReason,
};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Results page whose content is scripted per page
#[derive(Default)]
struct FakePage {
    pages: Vec<Vec<RawRow>>,
    index: usize,
    exclude_present: bool,
    exclude_text: String,
    save_clicks: usize,
    next_clicks: usize,
    /// The exclude save control is gone when the pass ends
    save_missing: bool,
    /// The exclude text area is closed after the session started
    exclude_closed_mid_session: bool,
    /// Clicking next leaves the table unchanged
    stuck: bool,
    /// Report a block once this many checks have passed
    block_after: Option<(usize, BlockReason)>,
    block_checks: usize,
    watching: Vec<bool>,
    notices: Vec<String>,
    picked: Option<String>,
}

impl FakePage {
    fn new(pages: Vec<Vec<RawRow>>) -> Self {
        Self {
            pages,
            exclude_present: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl PageAdapter for FakePage {
    async fn rows(&mut self) -> Result<Vec<RawRow>> {
        Ok(self.pages.get(self.index).cloned().unwrap_or_default())
    }

    async fn current_page_number(&mut self) -> Result<Option<u32>> {
        Ok(Some(self.index as u32 + 1))
    }

    async fn next_control_present(&mut self) -> Result<bool> {
        Ok(self.index + 1 < self.pages.len())
    }

    async fn click_next_control(&mut self) -> Result<bool> {
        if self.index + 1 >= self.pages.len() {
            return Ok(false);
        }
        self.next_clicks += 1;
        if !self.stuck {
            self.index += 1;
        }
        Ok(true)
    }

    async fn block_status(&mut self) -> Result<Option<BlockReason>> {
        self.block_checks += 1;
        Ok(match self.block_after {
            Some((after, reason)) if self.block_checks > after => Some(reason),
            _ => None,
        })
    }

    async fn watch_for_challenge(&mut self, enabled: bool) -> Result<()> {
        self.watching.push(enabled);
        Ok(())
    }

    async fn exclude_input_present(&mut self) -> Result<bool> {
        Ok(self.exclude_present)
    }

    async fn append_exclude_entries(&mut self, entries: &[String]) -> Result<bool> {
        if !self.exclude_present || self.exclude_closed_mid_session {
            return Ok(false);
        }
        self.exclude_text = merge_exclude_text(&self.exclude_text, entries);
        Ok(true)
    }

    async fn click_exclude_save(&mut self) -> Result<bool> {
        if self.save_missing {
            return Ok(false);
        }
        self.save_clicks += 1;
        Ok(true)
    }

    async fn show_stopped_notice(&mut self, message: &str) -> Result<()> {
        self.notices.push(message.to_string());
        Ok(())
    }

    async fn pick_next_control(&mut self) -> Result<Option<String>> {
        Ok(self.picked.clone())
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    batches: Arc<Mutex<Vec<OutboundBatch>>>,
    resets: Arc<Mutex<usize>>,
}

#[async_trait]
impl RowSink for RecordingSink {
    async fn deliver(&mut self, batch: OutboundBatch) -> Result<()> {
        self.batches.lock().unwrap().push(batch);
        Ok(())
    }

    async fn reset(&mut self) -> Result<()> {
        *self.resets.lock().unwrap() += 1;
        Ok(())
    }
}

fn person(name: &str, site: &str) -> RawRow {
    RawRow::new(vec![
        RawCell::new(name).with_href("https://app.apollo.io/#/people/1"),
        RawCell::new("Acme").with_href(site),
    ])
}

fn three_pages() -> Vec<Vec<RawRow>> {
    vec![
        vec![person("Ann", "https://a.com"), person("Bob", "https://b.com")],
        vec![person("Cid", "https://c.com"), person("Dee", "https://d.com")],
        vec![person("Eve", "https://e.com")],
    ]
}

fn options(max_pages: u32, mode: DeliveryMode) -> StartOptions {
    StartOptions {
        max_pages,
        mode,
        correlation_id: "run-1".to_string(),
    }
}

fn build(page: FakePage) -> (Controller<FakePage>, UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let controller = Controller::new(page, tx).with_clock(Arc::new(VirtualClock::new()));
    (controller, rx)
}

fn drain(rx: &mut UnboundedReceiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn stops(events: &[Event]) -> Vec<StopReason> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::ScrapeStopped { reason } => Some(reason.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_walks_requested_pages_then_saves_excludes_once() {
    let mut page = FakePage::new(three_pages());
    page.exclude_text = "old.com".to_string();
    let (mut controller, mut rx) = build(page);
    let (_tx, mut commands) = mpsc::unbounded_channel();

    let reason = controller
        .scrape(options(3, DeliveryMode::Save), &mut commands)
        .await;

    // Host stays on page 3 with no next control after the save
    assert_eq!(reason, Some(StopReason::NextControlMissing));

    let page = controller.page();
    assert_eq!(page.next_clicks, 2);
    assert_eq!(page.save_clicks, 1);
    assert_eq!(
        page.exclude_text,
        "old.com\nhttps://a.com\nhttps://b.com\nhttps://c.com\nhttps://d.com\nhttps://e.com"
    );
    assert_eq!(page.watching, vec![true, false]);

    let events = drain(&mut rx);
    let batches: Vec<usize> = events
        .iter()
        .filter_map(|e| match e {
            Event::ScrapedDataBatch { rows } => Some(rows.len()),
            _ => None,
        })
        .collect();
    assert_eq!(batches, vec![2, 2, 1]);
    assert_eq!(stops(&events), vec![StopReason::NextControlMissing]);
}

#[tokio::test]
async fn test_rows_repeated_on_later_pages_are_dropped() {
    let pages = vec![
        vec![person("Ann", "https://a.com"), person("Bob", "https://b.com")],
        vec![person("Bob", "https://b.com"), person("Cid", "https://c.com")],
    ];
    let (mut controller, mut rx) = build(FakePage::new(pages));
    let (_tx, mut commands) = mpsc::unbounded_channel();

    controller
        .scrape(options(2, DeliveryMode::Save), &mut commands)
        .await;

    let events = drain(&mut rx);
    let names: Vec<Vec<String>> = events
        .iter()
        .filter_map(|e| match e {
            Event::ScrapedDataBatch { rows } => Some(
                rows.iter()
                    .map(|r| r.get("Column_1_Text").unwrap_or_default().to_string())
                    .collect(),
            ),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec![vec!["Ann", "Bob"], vec!["Cid"]]);
    assert_eq!(
        controller.page().exclude_text,
        "https://a.com\nhttps://b.com\nhttps://c.com"
    );
}

#[tokio::test]
async fn test_challenge_mid_page_stops_once() {
    let mut page = FakePage::new(three_pages());
    // Precheck, page entry and first row pass
    page.block_after = Some((3, BlockReason::SecurityChallenge));
    let (mut controller, mut rx) = build(page);
    let (_tx, mut commands) = mpsc::unbounded_channel();

    let reason = controller
        .scrape(options(3, DeliveryMode::Save), &mut commands)
        .await;

    assert_eq!(reason, Some(StopReason::SecurityChallenge));
    let page = controller.page();
    assert_eq!(page.notices.len(), 1);
    assert!(page.notices[0].starts_with("Security challenge detected"));
    assert_eq!(page.save_clicks, 0);
    assert_eq!(page.watching, vec![true, false]);

    let events = drain(&mut rx);
    assert_eq!(stops(&events), vec![StopReason::SecurityChallenge]);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, Event::Error { .. }))
            .count(),
        1
    );
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, Event::ScrapedDataBatch { .. }))
    );
}

#[tokio::test]
async fn test_access_denied_before_start() {
    let mut page = FakePage::new(three_pages());
    page.block_after = Some((0, BlockReason::AccessDenied));
    let (mut controller, mut rx) = build(page);
    let (_tx, mut commands) = mpsc::unbounded_channel();

    let reason = controller
        .scrape(options(1, DeliveryMode::Save), &mut commands)
        .await;

    assert_eq!(reason, Some(StopReason::AccessDenied));
    assert_eq!(controller.page().notices.len(), 1);
    assert_eq!(stops(&drain(&mut rx)), vec![StopReason::AccessDenied]);
}

#[tokio::test]
async fn test_missing_exclude_input_refuses_to_start() {
    let mut page = FakePage::new(three_pages());
    page.exclude_present = false;
    let (mut controller, mut rx) = build(page);
    let (_tx, mut commands) = mpsc::unbounded_channel();

    let reason = controller
        .scrape(options(1, DeliveryMode::Save), &mut commands)
        .await;

    assert_eq!(reason, None);
    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![Event::Error {
            message: EXCLUDE_INPUT_REQUIRED.to_string()
        }]
    );
    assert!(controller.page().watching.is_empty());
}

async fn assert_exclude_failure_stops(page: FakePage) {
    let (mut controller, mut rx) = build(page);
    let (_tx, mut commands) = mpsc::unbounded_channel();

    let reason = controller
        .scrape(options(2, DeliveryMode::Save), &mut commands)
        .await;

    assert_eq!(reason, Some(StopReason::ExcludeFailed));
    let page = controller.page();
    // One click to reach page 2, none for a second pass
    assert_eq!(page.next_clicks, 1);
    assert_eq!(page.save_clicks, 0);
    assert!(page.notices.is_empty());
    assert_eq!(page.watching, vec![true, false]);

    let events = drain(&mut rx);
    assert_eq!(stops(&events), vec![StopReason::ExcludeFailed]);
    let errors: Vec<&Event> = events
        .iter()
        .filter(|e| matches!(e, Event::Error { .. }))
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, Event::ScrapedDataBatch { .. }))
            .count(),
        2
    );
}

#[tokio::test]
async fn test_missing_exclude_save_stops_without_retry() {
    let mut page = FakePage::new(three_pages());
    page.save_missing = true;
    assert_exclude_failure_stops(page).await;
}

#[tokio::test]
async fn test_exclude_area_closed_mid_session_stops_without_retry() {
    let mut page = FakePage::new(three_pages());
    page.exclude_closed_mid_session = true;
    assert_exclude_failure_stops(page).await;
}

#[tokio::test]
async fn test_block_after_settle_prevents_next_click() {
    let mut page = FakePage::new(three_pages());
    // Precheck, page entry and both rows pass; the check before clicking next fails
    page.block_after = Some((4, BlockReason::AccessDenied));
    let (mut controller, mut rx) = build(page);
    let (_tx, mut commands) = mpsc::unbounded_channel();

    let reason = controller
        .scrape(options(3, DeliveryMode::Save), &mut commands)
        .await;

    assert_eq!(reason, Some(StopReason::AccessDenied));
    let page = controller.page();
    assert_eq!(page.next_clicks, 0);
    assert_eq!(page.notices.len(), 1);
    assert_eq!(stops(&drain(&mut rx)), vec![StopReason::AccessDenied]);
}

#[tokio::test]
async fn test_stuck_table_after_next_stops() {
    let mut page = FakePage::new(three_pages());
    page.stuck = true;
    let (mut controller, mut rx) = build(page);
    let (_tx, mut commands) = mpsc::unbounded_channel();

    let reason = controller
        .scrape(options(3, DeliveryMode::Save), &mut commands)
        .await;

    assert_eq!(reason, Some(StopReason::NextRowsMissing));
    assert_eq!(controller.page().next_clicks, 1);
    assert_eq!(stops(&drain(&mut rx)), vec![StopReason::NextRowsMissing]);
}

#[tokio::test]
async fn test_realtime_rows_go_to_sink() {
    let pages = vec![
        vec![person("Ann", "https://a.com"), person("Bob", "https://b.com")],
        vec![person("Cid", "https://c.com")],
    ];
    let sink = RecordingSink::default();
    let (mut controller, mut rx) = build(FakePage::new(pages));
    controller = controller.with_sink(Box::new(sink.clone()));
    let (_tx, mut commands) = mpsc::unbounded_channel();

    controller
        .scrape(options(2, DeliveryMode::Realtime), &mut commands)
        .await;

    let batches = sink.batches.lock().unwrap();
    assert_eq!(batches.len(), 2);
    assert!(batches.iter().all(|b| b.correlation_id == "run-1"));
    assert_eq!(batches[0].rows.len(), 2);
    assert_eq!(batches[1].rows[0].get(WEBSITE), Some("https://c.com"));
    assert_eq!(*sink.resets.lock().unwrap(), 1);

    let events = drain(&mut rx);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, Event::ScrapedData { .. }))
            .count(),
        3
    );
}

#[tokio::test]
async fn test_realtime_without_sink_is_rejected() {
    let (mut controller, mut rx) = build(FakePage::new(three_pages()));
    let (_tx, mut commands) = mpsc::unbounded_channel();

    let reason = controller
        .scrape(options(1, DeliveryMode::Realtime), &mut commands)
        .await;

    assert_eq!(reason, None);
    assert!(matches!(drain(&mut rx).as_slice(), [Event::Error { .. }]));
}

#[tokio::test]
async fn test_stop_command_ends_session() {
    let (controller, mut rx) = build(FakePage::new(three_pages()));
    let (tx, commands) = mpsc::unbounded_channel();

    tx.send(Command::StartScraping(options(3, DeliveryMode::Save)))
        .unwrap();
    tx.send(Command::StopScraping).unwrap();
    drop(tx);

    controller.run(commands).await;

    let events = drain(&mut rx);
    assert_eq!(stops(&events), vec![StopReason::User]);
    assert!(!events.iter().any(|e| matches!(e, Event::Error { .. })));
}

#[tokio::test]
async fn test_selected_next_button_is_persisted() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = SettingsStore::in_home(temp_dir.path());

    let mut page = FakePage::new(Vec::new());
    page.picked = Some("button[aria-label=\"Next\"]".to_string());
    let (controller, mut rx) = build(page);
    let mut controller = controller.with_settings(store.clone());

    controller.select_next_button().await;

    assert_eq!(
        store.load().unwrap().next_button_selector.as_deref(),
        Some("button[aria-label=\"Next\"]")
    );
    assert_eq!(
        drain(&mut rx),
        vec![Event::NextButtonSelected {
            selector: "button[aria-label=\"Next\"]".to_string()
        }]
    );
}
