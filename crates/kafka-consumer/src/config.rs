//! Consumer configuration.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Where to start reading when the group has no committed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OffsetReset {
    /// Start from the beginning of each partition
    Earliest,
    /// Start from the end of each partition, skipping the backlog
    #[default]
    Latest,
}

impl OffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetReset::Earliest => "earliest",
            OffsetReset::Latest => "latest",
        }
    }
}

impl fmt::Display for OffsetReset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the Kafka consumer
///
/// Deserializes from the `extensions.kafkaconsumer` section of a settings
/// file. Every key is optional and falls back to [`ConsumerConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Topics to subscribe to
    pub topics: Vec<String>,
    /// Kafka brokers (comma-separated list)
    pub brokers: String,
    /// Consumer group ID
    #[serde(rename = "group")]
    pub group_id: String,
    /// Session timeout in milliseconds
    ///
    /// The loop stops polling while the message channel is full, so a
    /// downstream reader that stalls for longer than this gets the consumer
    /// evicted from the group and triggers a rebalance.
    #[serde(rename = "sessionTimeout")]
    pub session_timeout_ms: u64,
    /// Capacity of the bounded message channel
    #[serde(rename = "channelSize")]
    pub channel_size: usize,
    /// Auto offset reset strategy
    #[serde(rename = "offsetResetStrategy")]
    pub offset_reset: OffsetReset,
    /// Track dispatched-but-unprocessed messages so shutdown can wait for them
    #[serde(rename = "handleAllMessagesBeforeExiting")]
    pub drain_before_exit: bool,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            topics: vec!["test-topic".to_string()],
            brokers: "localhost:9092".to_string(),
            group_id: "test".to_string(),
            session_timeout_ms: 6000,
            channel_size: 100,
            offset_reset: OffsetReset::Latest,
            drain_before_exit: true,
        }
    }
}

impl ConsumerConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    /// Reject settings no broker client could be built from.
    pub fn validate(&self) -> Result<()> {
        if self.topics.is_empty() {
            return Err(Error::InvalidConfig("topics must not be empty".to_string()));
        }
        if let Some(pos) = self.topics.iter().position(|t| t.trim().is_empty()) {
            return Err(Error::InvalidConfig(format!(
                "topic at index {pos} is empty"
            )));
        }
        if self.brokers.trim().is_empty() {
            return Err(Error::InvalidConfig("brokers must not be empty".to_string()));
        }
        if self.group_id.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "consumer group must not be empty".to_string(),
            ));
        }
        if self.channel_size == 0 {
            return Err(Error::InvalidConfig(
                "channelSize must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
