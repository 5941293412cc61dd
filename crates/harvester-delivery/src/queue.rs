//! Outbound row queue
//!
//! Rows are queued in arrival order and flushed by a single worker task, one
//! request at a time. A failed flush puts its rows back at the head and is
//! retried after a fixed delay for as long as the worker runs.

use crate::Result;
use async_trait::async_trait;
use harvester_core::wait::Clock;
use harvester_core::{Event, OutboundBatch, RowSink, ScrapedRow};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Sends one batch to the receiver
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_rows(&self, batch: &OutboundBatch) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Most rows sent in one request
    pub max_batch: usize,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_batch: 50,
            retry_delay: Duration::from_secs(3),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// FIFO of rows tagged with their correlation id
#[derive(Debug, Default)]
pub struct DeliveryQueue {
    entries: VecDeque<(String, ScrapedRow)>,
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, batch: OutboundBatch) {
        let cid = batch.correlation_id;
        self.entries
            .extend(batch.rows.into_iter().map(|row| (cid.clone(), row)));
    }

    /// Take up to `max` rows from the head that share the head's correlation id
    pub fn next_batch(&mut self, max: usize) -> Option<OutboundBatch> {
        let cid = self.entries.front()?.0.clone();
        let mut rows = Vec::new();
        while rows.len() < max.max(1) {
            match self.entries.front() {
                Some((next, _)) if *next == cid => {
                    if let Some((_, row)) = self.entries.pop_front() {
                        rows.push(row);
                    }
                }
                _ => break,
            }
        }
        Some(OutboundBatch::new(cid, rows))
    }

    /// Put an unsent batch back at the head, keeping its order
    pub fn restore(&mut self, batch: OutboundBatch) {
        let cid = batch.correlation_id;
        for row in batch.rows.into_iter().rev() {
            self.entries.push_front((cid.clone(), row));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug)]
pub enum DeliveryMsg {
    Enqueue(OutboundBatch),
    Reset,
}

/// Background task that owns the queue and talks to the transport
pub struct DeliveryWorker<T: Transport> {
    queue: DeliveryQueue,
    transport: T,
    config: DeliveryConfig,
    clock: Arc<dyn Clock>,
    messages: UnboundedReceiver<DeliveryMsg>,
    events: UnboundedSender<Event>,
    /// Set while failures are unresolved; only the first one is reported
    failing: bool,
}

impl<T: Transport + 'static> DeliveryWorker<T> {
    /// Start a worker and return the handle the scrape loop feeds
    pub fn spawn(
        transport: T,
        config: DeliveryConfig,
        clock: Arc<dyn Clock>,
        events: UnboundedSender<Event>,
    ) -> (DeliveryHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Self {
            queue: DeliveryQueue::new(),
            transport,
            config,
            clock,
            messages: rx,
            events,
            failing: false,
        };
        let task = tokio::spawn(worker.run());
        (DeliveryHandle { tx }, task)
    }

    /// Flush until every handle is gone and the queue is empty
    pub async fn run(mut self) {
        loop {
            if self.queue.is_empty() {
                match self.messages.recv().await {
                    Some(msg) => self.handle(msg),
                    None => break,
                }
            }
            while let Ok(msg) = self.messages.try_recv() {
                self.handle(msg);
            }

            let Some(batch) = self.queue.next_batch(self.config.max_batch) else {
                continue;
            };
            self.flush(batch).await;
        }
        tracing::debug!("Delivery worker stopped");
    }

    fn handle(&mut self, msg: DeliveryMsg) {
        match msg {
            DeliveryMsg::Enqueue(batch) => {
                tracing::debug!("Queued {} row(s) for delivery", batch.rows.len());
                self.queue.push(batch);
            }
            DeliveryMsg::Reset => {
                if !self.queue.is_empty() {
                    tracing::info!("Dropping {} undelivered row(s)", self.queue.len());
                }
                self.queue.clear();
                self.failing = false;
            }
        }
    }

    async fn flush(&mut self, batch: OutboundBatch) {
        match self.transport.post_rows(&batch).await {
            Ok(()) => {
                tracing::debug!("Delivered {} row(s)", batch.rows.len());
                if self.failing {
                    tracing::info!("Delivery recovered");
                }
                self.failing = false;
            }
            Err(e) => {
                tracing::warn!(
                    "Delivery failed, retrying in {:?}: {}",
                    self.config.retry_delay,
                    e
                );
                self.queue.restore(batch);
                if !self.failing {
                    self.failing = true;
                    let event = Event::Error {
                        message: format!("Failed to deliver rows to the receiver: {}", e),
                    };
                    if self.events.send(event).is_err() {
                        tracing::debug!("Event receiver dropped");
                    }
                }
                self.clock.sleep(self.config.retry_delay).await;
            }
        }
    }
}

/// Sending side of a [`DeliveryWorker`]
#[derive(Debug, Clone)]
pub struct DeliveryHandle {
    tx: UnboundedSender<DeliveryMsg>,
}

impl DeliveryHandle {
    fn send(&self, msg: DeliveryMsg) -> harvester_core::Result<()> {
        self.tx
            .send(msg)
            .map_err(|_| harvester_core::Error::Delivery("Delivery worker is not running".to_string()))
    }
}

#[async_trait]
impl RowSink for DeliveryHandle {
    async fn deliver(&mut self, batch: OutboundBatch) -> harvester_core::Result<()> {
        self.send(DeliveryMsg::Enqueue(batch))
    }

    async fn reset(&mut self) -> harvester_core::Result<()> {
        self.send(DeliveryMsg::Reset)
    }
}
