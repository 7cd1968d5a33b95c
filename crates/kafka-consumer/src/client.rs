//! Broker client contract and its rdkafka-backed implementation.
//!
//! The consumer loop only ever talks to a [`ConsumerClient`]. Production code
//! uses [`KafkaConsumerClient`]; tests use
//! [`MockConsumerClient`](crate::testing::MockConsumerClient).

use crate::config::ConsumerConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use kafka_types::{BrokerError, BrokerEvent, Message, TopicPartition};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{
    BaseConsumer, Consumer as RdkafkaConsumer, ConsumerContext, Rebalance,
    StreamConsumer as RdkafkaStreamConsumer,
};
use rdkafka::error::{KafkaError, KafkaResult};
use rdkafka::message::{BorrowedMessage as RdkafkaBorrowedMessage, Message as RdkafkaMessage};
use rdkafka::{ClientContext, Offset, TopicPartitionList};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, warn};

/// Operations the consumer loop needs from a broker client.
#[async_trait]
pub trait ConsumerClient: Send + Sync {
    /// Join the consumer group and subscribe to `topics`
    fn subscribe(&self, topics: &[String]) -> Result<()>;

    /// Wait for the next event. `None` means the event source is closed.
    async fn next_event(&self) -> Option<BrokerEvent>;

    /// Apply a partition assignment
    fn assign(&self, partitions: &[TopicPartition]) -> Result<()>;

    /// Drop the current partition assignment
    fn unassign(&self) -> Result<()>;

    /// Leave the group and close the event source
    fn close(&self) -> Result<()>;
}

/// rdkafka context forwarding rebalances, commits and client errors as
/// [`BrokerEvent`]s.
pub struct EventContext {
    events: mpsc::UnboundedSender<BrokerEvent>,
}

impl EventContext {
    fn forward(&self, event: BrokerEvent) {
        if self.events.send(event).is_err() {
            debug!("Dropping broker event, the client is gone");
        }
    }
}

impl ClientContext for EventContext {
    fn error(&self, error: KafkaError, reason: &str) {
        self.forward(BrokerEvent::Error(broker_error(&error, reason)));
    }
}

impl ConsumerContext for EventContext {
    fn post_rebalance(&self, _base_consumer: &BaseConsumer<Self>, rebalance: &Rebalance<'_>) {
        let event = match rebalance {
            Rebalance::Assign(tpl) => BrokerEvent::AssignedPartitions(topic_partitions(tpl)),
            Rebalance::Revoke(tpl) => BrokerEvent::RevokedPartitions(topic_partitions(tpl)),
            Rebalance::Error(e) => {
                BrokerEvent::Error(BrokerError::new(format!("Rebalance failed: {e}")))
            }
        };
        self.forward(event);
    }

    fn commit_callback(&self, result: KafkaResult<()>, offsets: &TopicPartitionList) {
        match result {
            Ok(()) => self.forward(BrokerEvent::OffsetsCommitted(topic_partitions(offsets))),
            Err(e) => warn!("Offset commit failed: {e}"),
        }
    }
}

/// [`ConsumerClient`] backed by an rdkafka `StreamConsumer`.
///
/// librdkafka serves rebalances from inside `recv()`, so `next_event` drives
/// the consumer and interleaves the forwarded context events with fetched
/// messages. `close` releases the rdkafka consumer, which leaves the group
/// and shuts its broker connections once the last in-flight `next_event`
/// call has returned.
pub struct KafkaConsumerClient {
    consumer: StdMutex<Option<Arc<RdkafkaStreamConsumer<EventContext>>>>,
    events: Mutex<mpsc::UnboundedReceiver<BrokerEvent>>,
    closed: watch::Sender<bool>,
}

impl KafkaConsumerClient {
    /// Create the rdkafka consumer. Nothing is contacted until `subscribe`.
    pub fn new(config: &ConsumerConfig) -> Result<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let consumer: RdkafkaStreamConsumer<EventContext> = client_config(config)
            .create_with_context(EventContext { events: events_tx })
            .map_err(|e| Error::InvalidConfig(format!("Failed to create consumer: {e}")))?;

        Ok(Self {
            consumer: StdMutex::new(Some(Arc::new(consumer))),
            events: Mutex::new(events_rx),
            closed: watch::Sender::new(false),
        })
    }

    /// Get the underlying consumer (for advanced use cases). `None` after `close`.
    pub fn inner(&self) -> Option<Arc<RdkafkaStreamConsumer<EventContext>>> {
        self.consumer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn live(&self) -> Result<Arc<RdkafkaStreamConsumer<EventContext>>> {
        self.inner().ok_or(Error::InvalidState("closed"))
    }
}

#[async_trait]
impl ConsumerClient for KafkaConsumerClient {
    fn subscribe(&self, topics: &[String]) -> Result<()> {
        let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
        self.live()?
            .subscribe(&topic_refs)
            .map_err(|e| Error::Subscription {
                topics: topics.to_vec(),
                reason: e.to_string(),
            })
    }

    async fn next_event(&self) -> Option<BrokerEvent> {
        let consumer = self.inner()?;
        let closed = self.closed.subscribe();
        let mut events = self.events.lock().await;

        tokio::select! {
            biased;
            _ = wait_closed(closed) => None,
            event = events.recv() => event,
            result = consumer.recv() => Some(match result {
                Ok(msg) => BrokerEvent::Message(to_message(&msg)),
                // rdkafka only reports the partition number on EOF
                Err(KafkaError::PartitionEOF(partition)) => {
                    BrokerEvent::PartitionEof(TopicPartition::new("", partition))
                }
                Err(e) => BrokerEvent::Error(broker_error(&e, "error receiving message")),
            }),
        }
    }

    fn assign(&self, partitions: &[TopicPartition]) -> Result<()> {
        let consumer = self.live()?;
        let requested = partition_list(partitions)?;

        // With eager rebalancing librdkafka has usually applied the assignment
        // inside the rebalance callback already. Rebalances queued behind a
        // full message channel are replayed late, so an older assignment can
        // be re-applied briefly until the newer events behind it are handled.
        let current = consumer.assignment()?;
        if partition_keys(&current) == partition_keys(&requested) {
            return Ok(());
        }

        consumer
            .assign(&requested)
            .map_err(|e| Error::Assignment(e.to_string()))
    }

    fn unassign(&self) -> Result<()> {
        let consumer = self.live()?;
        if consumer.assignment()?.count() == 0 {
            return Ok(());
        }
        consumer
            .unassign()
            .map_err(|e| Error::Unassignment(e.to_string()))
    }

    fn close(&self) -> Result<()> {
        if self.closed.send_replace(true) {
            return Ok(());
        }
        let consumer = self
            .consumer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(consumer) = consumer {
            consumer.unsubscribe();
        }
        Ok(())
    }
}

/// Resolve once `closed` holds `true` or its sender is gone.
pub(crate) async fn wait_closed(mut closed: watch::Receiver<bool>) {
    loop {
        let is_closed = *closed.borrow_and_update();
        if is_closed || closed.changed().await.is_err() {
            return;
        }
    }
}

/// Build the librdkafka configuration for a consumer.
pub fn client_config(config: &ConsumerConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.brokers)
        .set("group.id", &config.group_id)
        .set("session.timeout.ms", config.session_timeout_ms.to_string())
        .set("enable.auto.commit", "true")
        .set("auto.offset.reset", config.offset_reset.as_str());
    client_config
}

/// Convert an rdkafka partition list into broker-agnostic partitions.
pub fn topic_partitions(list: &TopicPartitionList) -> Vec<TopicPartition> {
    list.elements()
        .iter()
        .map(|elem| TopicPartition {
            topic: elem.topic().to_string(),
            partition: elem.partition(),
            offset: match elem.offset() {
                Offset::Offset(offset) => Some(offset),
                _ => None,
            },
        })
        .collect()
}

fn partition_list(partitions: &[TopicPartition]) -> Result<TopicPartitionList> {
    let mut tpl = TopicPartitionList::new();
    for tp in partitions {
        match tp.offset {
            Some(offset) => {
                tpl.add_partition_offset(&tp.topic, tp.partition, Offset::Offset(offset))?
            }
            None => {
                tpl.add_partition(&tp.topic, tp.partition);
            }
        }
    }
    Ok(tpl)
}

fn partition_keys(list: &TopicPartitionList) -> BTreeSet<(String, i32)> {
    list.elements()
        .iter()
        .map(|elem| (elem.topic().to_string(), elem.partition()))
        .collect()
}

fn to_message(msg: &RdkafkaBorrowedMessage<'_>) -> Message {
    Message {
        payload: msg.payload().map(Bytes::copy_from_slice).unwrap_or_default(),
        topic: msg.topic().to_string(),
        partition: msg.partition(),
        offset: msg.offset(),
        key: msg.key().map(|k| k.to_vec()),
        timestamp: msg.timestamp().to_millis(),
    }
}

fn broker_error(error: &KafkaError, reason: &str) -> BrokerError {
    let message = format!("{reason}: {error}");
    match error.rdkafka_error_code() {
        Some(code) => BrokerError::with_code(format!("{code:?}"), message),
        None => BrokerError::new(message),
    }
}
