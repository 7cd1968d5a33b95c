//! Broker client contract for the async producer and its rdkafka-backed
//! implementation.

use crate::config::ProducerConfig;
use crate::error::{Error, Result};
use kafka_types::{BrokerError, DeliveryReport, OutboundMessage, ProducerEvent};
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::message::Message as RdkafkaMessage;
use rdkafka::producer::{
    BaseRecord, DeliveryResult, Producer as RdkafkaProducer, ProducerContext, ThreadedProducer,
};
use rdkafka::ClientContext;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Send path of a producer client.
///
/// Delivery confirmations do not come back through this trait: a client is
/// created together with an event receiver, which the
/// [`Producer`](crate::Producer) drains in its delivery report task. The event
/// source closes when the client is dropped.
pub trait ProducerClient: Send + Sync {
    /// Queue a message for sending without waiting for the broker
    fn send(&self, message: OutboundMessage) -> Result<()>;

    /// Wait until every queued message has been delivered or has failed
    fn flush(&self, timeout: Duration) -> Result<()>;
}

/// rdkafka context forwarding delivery callbacks and client errors as
/// [`ProducerEvent`]s.
pub struct DeliveryContext {
    events: mpsc::UnboundedSender<ProducerEvent>,
}

impl DeliveryContext {
    fn forward(&self, event: ProducerEvent) {
        if self.events.send(event).is_err() {
            debug!("Dropping producer event, the delivery report loop is gone");
        }
    }
}

impl ClientContext for DeliveryContext {
    fn error(&self, error: KafkaError, reason: &str) {
        self.forward(ProducerEvent::Error(broker_error(&error, reason)));
    }
}

impl ProducerContext for DeliveryContext {
    type DeliveryOpaque = ();

    fn delivery(&self, delivery_result: &DeliveryResult<'_>, _delivery_opaque: Self::DeliveryOpaque) {
        let report = match delivery_result {
            Ok(msg) => DeliveryReport::delivered(msg.topic(), msg.partition(), msg.offset()),
            Err((err, msg)) => DeliveryReport::failed(
                msg.topic(),
                msg.partition(),
                broker_error(err, "delivery failed"),
            ),
        };
        self.forward(ProducerEvent::Delivery(report));
    }
}

/// [`ProducerClient`] backed by an rdkafka `ThreadedProducer`, whose polling
/// thread runs the delivery callbacks.
pub struct KafkaProducerClient {
    producer: ThreadedProducer<DeliveryContext>,
}

impl KafkaProducerClient {
    /// Create the client and the receiver its delivery events arrive on
    pub fn new(config: &ProducerConfig) -> Result<(Self, mpsc::UnboundedReceiver<ProducerEvent>)> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let producer: ThreadedProducer<DeliveryContext> = client_config(config)
            .create_with_context(DeliveryContext { events: events_tx })
            .map_err(|e| Error::InvalidConfig(format!("Failed to create Kafka producer: {e}")))?;
        Ok((Self { producer }, events_rx))
    }
}

impl ProducerClient for KafkaProducerClient {
    fn send(&self, message: OutboundMessage) -> Result<()> {
        let mut record: BaseRecord<'_, (), [u8]> =
            BaseRecord::to(&message.topic).payload(message.payload.as_ref());
        if let Some(partition) = message.partition {
            record = record.partition(partition);
        }

        self.producer
            .send(record)
            .map_err(|(err, _)| Error::Enqueue {
                topic: message.topic.clone(),
                reason: err.to_string(),
            })
    }

    fn flush(&self, timeout: Duration) -> Result<()> {
        self.producer
            .flush(timeout)
            .map_err(|e| Error::Flush(e.to_string()))
    }
}

/// Build the librdkafka configuration for a producer.
pub fn client_config(config: &ProducerConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.brokers)
        .set("message.timeout.ms", config.message_timeout_ms.to_string());
    client_config
}

fn broker_error(error: &KafkaError, reason: &str) -> BrokerError {
    let message = format!("{reason}: {error}");
    match error.rdkafka_error_code() {
        Some(code) => BrokerError::with_code(format!("{code:?}"), message),
        None => BrokerError::new(message),
    }
}
