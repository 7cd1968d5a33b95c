//! Event-driven Kafka consumer for the kafka-extension workspace.
//!
//! Features:
//!
//! - Rebalance handling: partition assignments and revocations are applied as
//!   they arrive and the current assignment is always the latest one
//! - Backpressure: messages are pushed onto a bounded channel, and a slow
//!   reader suspends broker polling
//! - Readiness: callers can wait for the first partition assignment
//! - Graceful shutdown: a cooperative stop flag plus an optional tracker of
//!   dispatched-but-unprocessed messages to drain before exiting
//!
//! # Dependency Direction
//!
//! This crate depends on `kafka-types` for the shared type definitions
//! (Message, BrokerEvent, BrokerError, ErrorReporter, etc.).

/// Broker client contract and the rdkafka-backed implementation
pub mod client;
pub mod config;
pub mod consumer;
pub mod coordination;
pub mod error;

/// Scripted broker client for tests
pub mod testing;

#[cfg(test)]
mod tests;

// Re-export from kafka-types for convenience
pub use kafka_types::{BrokerError, BrokerEvent, ErrorReporter, Message, TopicPartition};

// Re-export consumer types
pub use client::{ConsumerClient, KafkaConsumerClient};
pub use config::{ConsumerConfig, OffsetReset};
pub use consumer::{Consumer, ConsumerState};
pub use coordination::PendingMessages;
pub use error::{Error, Result};
