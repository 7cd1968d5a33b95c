//! In-memory broker client for exercising the consumer without Kafka.
//!
//! ```rust
//! use kafka_extension_consumer::testing::MockConsumerClient;
//! use kafka_extension_consumer::{Consumer, ConsumerConfig};
//!
//! let (client, events) = MockConsumerClient::new();
//! let consumer = Consumer::with_client(ConsumerConfig::default(), client).unwrap();
//! events.assign(&[("test-topic", 0)]);
//! events.message("test-topic", 0, 0, "hello");
//! ```

use crate::client::{wait_closed, ConsumerClient};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use kafka_types::{BrokerError, BrokerEvent, Message, TopicPartition};
use std::sync::{Mutex as StdMutex, PoisonError};
use tokio::sync::{mpsc, watch, Mutex};

/// A call the consumer made on the mock client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    Subscribe(Vec<String>),
    Assign(Vec<TopicPartition>),
    Unassign,
    Close,
}

/// Scripted [`ConsumerClient`]: events come from a [`MockEvents`] handle,
/// calls are recorded, and individual operations can be made to fail.
pub struct MockConsumerClient {
    events: Mutex<mpsc::UnboundedReceiver<BrokerEvent>>,
    closed: watch::Sender<bool>,
    calls: StdMutex<Vec<ClientCall>>,
    subscribe_error: Option<String>,
    assign_error: Option<String>,
    unassign_error: Option<String>,
    close_error: Option<String>,
}

impl MockConsumerClient {
    pub fn new() -> (Self, MockEvents) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Self {
            events: Mutex::new(rx),
            closed: watch::Sender::new(false),
            calls: StdMutex::new(Vec::new()),
            subscribe_error: None,
            assign_error: None,
            unassign_error: None,
            close_error: None,
        };
        (client, MockEvents { tx })
    }

    pub fn fail_subscribe(mut self, reason: impl Into<String>) -> Self {
        self.subscribe_error = Some(reason.into());
        self
    }

    pub fn fail_assign(mut self, reason: impl Into<String>) -> Self {
        self.assign_error = Some(reason.into());
        self
    }

    pub fn fail_unassign(mut self, reason: impl Into<String>) -> Self {
        self.unassign_error = Some(reason.into());
        self
    }

    pub fn fail_close(mut self, reason: impl Into<String>) -> Self {
        self.close_error = Some(reason.into());
        self
    }

    /// Calls recorded so far, in order.
    pub fn calls(&self) -> Vec<ClientCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, call: ClientCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

#[async_trait]
impl ConsumerClient for MockConsumerClient {
    fn subscribe(&self, topics: &[String]) -> Result<()> {
        self.record(ClientCall::Subscribe(topics.to_vec()));
        match &self.subscribe_error {
            Some(reason) => Err(Error::Subscription {
                topics: topics.to_vec(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn next_event(&self) -> Option<BrokerEvent> {
        let closed = self.closed.subscribe();
        let mut events = self.events.lock().await;
        tokio::select! {
            biased;
            _ = wait_closed(closed) => None,
            event = events.recv() => event,
        }
    }

    fn assign(&self, partitions: &[TopicPartition]) -> Result<()> {
        self.record(ClientCall::Assign(partitions.to_vec()));
        match &self.assign_error {
            Some(reason) => Err(Error::Assignment(reason.clone())),
            None => Ok(()),
        }
    }

    fn unassign(&self) -> Result<()> {
        self.record(ClientCall::Unassign);
        match &self.unassign_error {
            Some(reason) => Err(Error::Unassignment(reason.clone())),
            None => Ok(()),
        }
    }

    fn close(&self) -> Result<()> {
        self.record(ClientCall::Close);
        if let Some(reason) = &self.close_error {
            return Err(Error::Close(reason.clone()));
        }
        self.closed.send_replace(true);
        Ok(())
    }
}

/// Sending half of a [`MockConsumerClient`]'s event source.
///
/// Dropping it closes the event source.
#[derive(Clone)]
pub struct MockEvents {
    tx: mpsc::UnboundedSender<BrokerEvent>,
}

impl MockEvents {
    pub fn send(&self, event: BrokerEvent) {
        // The receiver only goes away with the client; tests that drop the
        // client first do not care about the event.
        let _ = self.tx.send(event);
    }

    pub fn assign(&self, partitions: &[(&str, i32)]) {
        self.send(BrokerEvent::AssignedPartitions(to_partitions(partitions)));
    }

    pub fn revoke(&self, partitions: &[(&str, i32)]) {
        self.send(BrokerEvent::RevokedPartitions(to_partitions(partitions)));
    }

    pub fn message(&self, topic: &str, partition: i32, offset: i64, payload: impl Into<Bytes>) {
        self.send(BrokerEvent::Message(Message::new(
            topic,
            partition,
            offset,
            payload.into(),
        )));
    }

    pub fn partition_eof(&self, topic: &str, partition: i32) {
        self.send(BrokerEvent::PartitionEof(TopicPartition::new(topic, partition)));
    }

    pub fn offsets_committed(&self, topic: &str, partition: i32, offset: i64) {
        self.send(BrokerEvent::OffsetsCommitted(vec![TopicPartition::with_offset(
            topic, partition, offset,
        )]));
    }

    pub fn error(&self, message: &str) {
        self.send(BrokerEvent::Error(BrokerError::new(message)));
    }

    pub fn unrecognized(&self, description: &str) {
        self.send(BrokerEvent::Unrecognized(description.to_string()));
    }
}

fn to_partitions(partitions: &[(&str, i32)]) -> Vec<TopicPartition> {
    partitions
        .iter()
        .map(|(topic, partition)| TopicPartition::new(*topic, *partition))
        .collect()
}
