// Realtime delivery of scraped rows to a local HTTP receiver

pub mod client;
pub mod error;
pub mod handler;
pub mod queue;
pub mod server;

pub use client::{DEFAULT_RECEIVER_URL, HttpTransport};
pub use error::{Error, Result};
pub use handler::RowStore;
pub use queue::{DeliveryConfig, DeliveryHandle, DeliveryQueue, DeliveryWorker, Transport};
pub use server::ReceiverServer;
