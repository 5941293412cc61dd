pub mod classify;
pub mod dedup;
pub mod driver;
pub mod error;
pub mod events;
pub mod exclude;
pub mod extract;
pub mod model;
pub mod page;
pub mod session;
pub mod settings;
pub mod sink;
pub mod table;
pub mod wait;

pub use driver::{Controller, Timing};
pub use error::{Error, Result};
pub use events::{Command, Event, StartOptions};
pub use model::{DeliveryMode, OutboundBatch, RawCell, RawRow, ScrapedRow};
pub use page::{BlockReason, PageAdapter};
pub use session::StopReason;
pub use sink::RowSink;
