use crate::model::{DeliveryMode, ScrapedRow};
use crate::session::StopReason;
use serde::{Deserialize, Serialize};

/// Parameters of a `startScraping` command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOptions {
    pub max_pages: u32,
    #[serde(default)]
    pub mode: DeliveryMode,
    pub correlation_id: String,
}

/// Commands from the control surface to the scrape loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    SelectNextButton,
    StartScraping(StartOptions),
    StopScraping,
}

/// Notifications from the scrape loop to the control surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    /// One accepted row (realtime mode)
    ScrapedData { row: ScrapedRow },
    /// Accepted rows of one page (save mode)
    ScrapedDataBatch { rows: Vec<ScrapedRow> },
    Error { message: String },
    ScrapeStopped { reason: StopReason },
    NextButtonSelected { selector: String },
}
