//! Kafka message types.
//!
//! Payloads are opaque bytes: the extension never looks inside them. Only the
//! coordinates a message arrived on (or is headed to) are modelled.

use bytes::Bytes;
use std::fmt;

/// A topic partition, optionally pinned to an offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPartition {
    /// Kafka topic name
    pub topic: String,
    /// Partition number within the topic
    pub partition: i32,
    /// Offset within the partition, if the event carries one
    pub offset: Option<i64>,
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset: None,
        }
    }

    pub fn with_offset(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset: Some(offset),
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{}[{}]@{}", self.topic, self.partition, offset),
            None => write!(f, "{}[{}]", self.topic, self.partition),
        }
    }
}

/// A message delivered by the broker.
///
/// Handed to downstream readers through the consumer's bounded channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Raw message value
    pub payload: Bytes,
    /// Kafka topic
    pub topic: String,
    /// Kafka partition
    pub partition: i32,
    /// Kafka offset
    pub offset: i64,
    /// Message key (if any)
    pub key: Option<Vec<u8>>,
    /// Message timestamp (milliseconds since epoch)
    pub timestamp: Option<i64>,
}

impl Message {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, payload: Bytes) -> Self {
        Self {
            payload,
            topic: topic.into(),
            partition,
            offset,
            key: None,
            timestamp: None,
        }
    }

    /// The partition (and offset) this message was read from.
    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::with_offset(self.topic.clone(), self.partition, self.offset)
    }
}

/// A message queued for production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Destination topic
    pub topic: String,
    /// Destination partition; `None` lets the client's partitioner decide
    pub partition: Option<i32>,
    /// Raw message value
    pub payload: Bytes,
}

impl OutboundMessage {
    pub fn new(topic: impl Into<String>, payload: Bytes) -> Self {
        Self {
            topic: topic.into(),
            partition: None,
            payload,
        }
    }
}
