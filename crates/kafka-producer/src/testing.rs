//! In-memory producer client for exercising the producer without Kafka.

use crate::client::ProducerClient;
use crate::error::{Error, Result};
use kafka_types::{DeliveryReport, OutboundMessage, ProducerEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

/// Records sent messages and lets tests emit delivery events by hand.
///
/// The event source closes when the client is dropped, like a real client.
pub struct MockProducerClient {
    events: mpsc::UnboundedSender<ProducerEvent>,
    sent: StdMutex<Vec<OutboundMessage>>,
    flushes: Arc<AtomicUsize>,
    send_error: Option<String>,
}

impl MockProducerClient {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProducerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Self {
            events: tx,
            sent: StdMutex::new(Vec::new()),
            flushes: Arc::new(AtomicUsize::new(0)),
            send_error: None,
        };
        (client, rx)
    }

    /// Refuse every `send` with `reason`
    pub fn fail_send(mut self, reason: impl Into<String>) -> Self {
        self.send_error = Some(reason.into());
        self
    }

    /// Messages accepted so far, in order.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `flush` calls, readable after the client is gone
    pub fn flush_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.flushes)
    }

    pub fn deliver(&self, report: DeliveryReport) {
        self.emit(ProducerEvent::Delivery(report));
    }

    pub fn emit(&self, event: ProducerEvent) {
        // The receiver lives in the producer's delivery task; if it is gone
        // the producer is being torn down.
        let _ = self.events.send(event);
    }
}

impl ProducerClient for MockProducerClient {
    fn send(&self, message: OutboundMessage) -> Result<()> {
        if let Some(reason) = &self.send_error {
            return Err(Error::Enqueue {
                topic: message.topic,
                reason: reason.clone(),
            });
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
        Ok(())
    }

    fn flush(&self, _timeout: Duration) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
