use crate::client::{KafkaProducerClient, ProducerClient};
use crate::config::ProducerConfig;
use crate::error::Result;
use bytes::Bytes;
use kafka_types::{ErrorReporter, ErrorTags, NullReporter, OutboundMessage, ProducerEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const ERROR_TAGS: ErrorTags = ErrorTags {
    version: env!("CARGO_PKG_VERSION"),
    extension: "kafka-producer",
};

/// Counters maintained by the delivery report loop.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl DeliveryStats {
    /// Messages the broker confirmed
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst)
    }

    /// Messages that could not be queued or were reported undeliverable
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }
}

/// Fire-and-forget Kafka producer.
///
/// [`send_async`](Self::send_async) only queues the message. Outcomes are
/// observed by a background task reading the client's delivery events: it
/// logs successes, and logs and reports failures. A send cannot be matched to
/// its outcome other than through the topic/partition/offset in the logs.
pub struct Producer<P: ProducerClient = KafkaProducerClient> {
    client: P,
    config: ProducerConfig,
    stats: Arc<DeliveryStats>,
    reporter: Arc<dyn ErrorReporter>,
    delivery_task: JoinHandle<()>,
}

impl Producer<KafkaProducerClient> {
    /// Create a new Kafka producer. Must be called within a Tokio runtime.
    pub fn new(config: ProducerConfig) -> Result<Self> {
        Self::new_with_reporter(config, Arc::new(NullReporter))
    }

    /// Create a new Kafka producer that sends delivery failures to `reporter`
    pub fn new_with_reporter(
        config: ProducerConfig,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        config.validate()?;
        debug!("Configuring Kafka producer: brokers={}", config.brokers);

        let (client, events) = KafkaProducerClient::new(&config).inspect_err(|e| {
            error!("Error configuring Kafka producer client: {e}");
        })?;
        Self::with_client(config, client, events, reporter)
    }
}

impl<P: ProducerClient> Producer<P> {
    /// Create a producer on top of an existing client and its delivery event source
    pub fn with_client(
        config: ProducerConfig,
        client: P,
        events: mpsc::UnboundedReceiver<ProducerEvent>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self> {
        config.validate()?;

        let stats = Arc::new(DeliveryStats::default());
        let delivery_task = tokio::spawn(listen_for_delivery_reports(
            events,
            Arc::clone(&stats),
            Arc::clone(&reporter),
        ));

        info!("Kafka producer initialized: brokers={}", config.brokers);
        Ok(Self {
            client,
            config,
            stats,
            reporter,
            delivery_task,
        })
    }

    /// Queue `payload` for `topic` on any partition. Never blocks.
    pub fn send_async(&self, payload: impl Into<Bytes>, topic: &str) {
        let message = OutboundMessage::new(topic, payload.into());
        if let Err(e) = self.client.send(message) {
            self.stats.failed.fetch_add(1, Ordering::SeqCst);
            self.reporter.capture(&e, ERROR_TAGS);
            error!("Error sending message to Kafka: {e}");
        }
    }

    /// Wait until queued messages are delivered or failed
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        self.client.flush(timeout)
    }

    /// Flush, drop the client and wait for the delivery report loop to drain.
    pub async fn close(self, timeout: Duration) -> Result<()> {
        let Producer {
            client,
            delivery_task,
            ..
        } = self;

        let flushed = client.flush(timeout);
        // Dropping the client closes its event source
        drop(client);
        if let Err(e) = delivery_task.await {
            warn!("Delivery report task ended abnormally: {e}");
        }
        flushed
    }

    /// Shared handle to the delivery counters, usable after [`close`](Self::close)
    pub fn delivery_stats(&self) -> Arc<DeliveryStats> {
        Arc::clone(&self.stats)
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    /// Get the underlying client (for advanced use cases)
    pub fn client(&self) -> &P {
        &self.client
    }
}

async fn listen_for_delivery_reports(
    mut events: mpsc::UnboundedReceiver<ProducerEvent>,
    stats: Arc<DeliveryStats>,
    reporter: Arc<dyn ErrorReporter>,
) {
    while let Some(event) = events.recv().await {
        match event {
            ProducerEvent::Delivery(report) => match &report.error {
                None => {
                    stats.delivered.fetch_add(1, Ordering::SeqCst);
                    debug!(
                        topic = %report.topic,
                        partition = report.partition,
                        offset = report.offset,
                        "Delivered message to topic"
                    );
                }
                Some(err) => {
                    stats.failed.fetch_add(1, Ordering::SeqCst);
                    reporter.capture(err, ERROR_TAGS);
                    error!(
                        topic = %report.topic,
                        partition = report.partition,
                        "Error sending message to Kafka: {err}"
                    );
                }
            },
            ProducerEvent::Error(err) => warn!("Ignored Kafka producer event: {err}"),
            ProducerEvent::Other(description) => {
                warn!("Ignored Kafka producer event: {description}")
            }
        }
    }
    debug!("Producer event source closed, delivery report loop exiting");
}
