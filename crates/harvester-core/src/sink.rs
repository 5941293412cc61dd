use crate::Result;
use crate::model::OutboundBatch;
use async_trait::async_trait;

/// Destination for accepted rows in realtime mode
#[async_trait]
pub trait RowSink: Send {
    /// Queue a batch for delivery. Must not wait for the network.
    async fn deliver(&mut self, batch: OutboundBatch) -> Result<()>;

    /// Drop everything not yet delivered
    async fn reset(&mut self) -> Result<()>;
}
