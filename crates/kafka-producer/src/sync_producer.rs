use crate::client::client_config;
use crate::config::ProducerConfig;
use crate::error::{Error, Result};
use rdkafka::producer::{FutureProducer, FutureRecord};
use tracing::debug;

/// Kafka producer that waits for the broker to acknowledge each message.
pub struct SyncProducer {
    producer: FutureProducer,
    config: ProducerConfig,
}

impl SyncProducer {
    /// Create a new synchronous producer. Must be called within a Tokio runtime.
    pub fn new(config: ProducerConfig) -> Result<Self> {
        config.validate()?;
        let producer: FutureProducer = client_config(&config)
            .create()
            .map_err(|e| Error::InvalidConfig(format!("Failed to create Kafka producer: {e}")))?;

        Ok(Self { producer, config })
    }

    /// Send `payload` to `topic` on any partition and return where it was written
    pub async fn produce(&self, topic: &str, payload: &[u8]) -> Result<(i32, i64)> {
        let record = FutureRecord::<(), [u8]>::to(topic).payload(payload);

        let (partition, offset) = self
            .producer
            .send(record, self.config.message_timeout())
            .await
            .map_err(|(err, _)| Error::Delivery {
                topic: topic.to_string(),
                reason: err.to_string(),
            })?;

        debug!(topic, partition, offset, "Delivered message to topic");
        Ok((partition, offset))
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    /// Get the underlying producer (for advanced use cases)
    pub fn inner(&self) -> &FutureProducer {
        &self.producer
    }
}
