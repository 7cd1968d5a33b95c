//! Events surfaced by broker clients.
//!
//! A broker client reports everything that happens on its connection as one
//! of these closed variant types. The consumer loop and the producer's
//! delivery loop dispatch on them with an exhaustive `match`.

use crate::error::BrokerError;
use crate::message::{Message, TopicPartition};

/// An event read from a consumer client.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerEvent {
    /// The group coordinator assigned this (complete) set of partitions
    AssignedPartitions(Vec<TopicPartition>),
    /// The group coordinator revoked this set of partitions
    RevokedPartitions(Vec<TopicPartition>),
    /// A message was fetched
    Message(Message),
    /// The end of a partition was reached
    PartitionEof(TopicPartition),
    /// Offsets were committed
    OffsetsCommitted(Vec<TopicPartition>),
    /// The client reported an error. The consumer loop treats it as fatal.
    Error(BrokerError),
    /// Anything the client could not classify
    Unrecognized(String),
}

impl BrokerEvent {
    /// Short name of the variant, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            BrokerEvent::AssignedPartitions(_) => "assigned_partitions",
            BrokerEvent::RevokedPartitions(_) => "revoked_partitions",
            BrokerEvent::Message(_) => "message",
            BrokerEvent::PartitionEof(_) => "partition_eof",
            BrokerEvent::OffsetsCommitted(_) => "offsets_committed",
            BrokerEvent::Error(_) => "error",
            BrokerEvent::Unrecognized(_) => "unrecognized",
        }
    }
}

/// Outcome of a single produced message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Topic the message was sent to
    pub topic: String,
    /// Partition the message landed on (`-1` if unknown)
    pub partition: i32,
    /// Offset the message was written at (`-1` if unknown)
    pub offset: i64,
    /// Set when delivery failed
    pub error: Option<BrokerError>,
}

impl DeliveryReport {
    pub fn delivered(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            error: None,
        }
    }

    pub fn failed(topic: impl Into<String>, partition: i32, error: BrokerError) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset: -1,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// An event read from a producer client.
#[derive(Debug, Clone, PartialEq)]
pub enum ProducerEvent {
    /// Delivery confirmation (success or failure) for one message
    Delivery(DeliveryReport),
    /// Client-level error not tied to a message
    Error(BrokerError),
    /// Anything else the client surfaced
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_report_success_flag() {
        assert!(DeliveryReport::delivered("t", 0, 10).is_success());
        let failed = DeliveryReport::failed("t", 0, BrokerError::new("timed out"));
        assert!(!failed.is_success());
        assert_eq!(failed.offset, -1);
    }

    #[test]
    fn test_event_kind() {
        assert_eq!(
            BrokerEvent::Error(BrokerError::new("boom")).kind(),
            "error"
        );
        assert_eq!(
            BrokerEvent::AssignedPartitions(vec![]).kind(),
            "assigned_partitions"
        );
    }
}
