//! Producer configuration.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Configuration for the Kafka producers
///
/// Deserializes from the `extensions.kafkaproducer` section of a settings
/// file (or any other prefix the caller chooses).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Kafka brokers (comma-separated list)
    pub brokers: String,
    /// How long librdkafka keeps retrying a message before reporting it failed
    #[serde(rename = "messageTimeout")]
    pub message_timeout_ms: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            message_timeout_ms: 5000,
        }
    }
}

impl ProducerConfig {
    pub fn message_timeout(&self) -> Duration {
        Duration::from_millis(self.message_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.brokers.trim().is_empty() {
            return Err(Error::InvalidConfig("brokers must not be empty".to_string()));
        }
        if self.message_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "messageTimeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
