use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Page error: {0}")]
    Page(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
