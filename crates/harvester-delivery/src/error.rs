use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid receiver URL: {0}")]
    InvalidUrl(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Receiver responded with status {0}")]
    Status(http::StatusCode),

    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    #[error("Request failed: {0}")]
    Client(#[from] hyper_util::client::legacy::Error),

    #[error("Connection error: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("Failed to encode rows: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for harvester_core::Error {
    fn from(err: Error) -> Self {
        harvester_core::Error::Delivery(err.to_string())
    }
}
