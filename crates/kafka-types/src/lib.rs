//! Shared types for the kafka-extension consumer and producer crates.
//!
//! This crate defines the broker-agnostic data model both sides of the
//! extension agree on. It has no dependency on `rdkafka`, so mock clients in
//! tests can build every event shape by hand.
//!
//! # Architecture
//!
//! ```text
//! Consume:  broker client → BrokerEvent → consumer loop → Message → bounded channel
//! Produce:  OutboundMessage → producer client → ProducerEvent → delivery report loop
//! ```
//!
//! # Modules
//!
//! - [`message`] - Messages, outbound records and topic partitions
//! - [`event`] - Events surfaced by broker clients
//! - [`error`] - Broker-side error type carried inside events
//! - [`report`] - Error-capture collaborator used for failures worth alerting on

pub mod error;
pub mod event;
pub mod message;
pub mod report;

// Re-export main types for convenient access
pub use error::BrokerError;
pub use event::{BrokerEvent, DeliveryReport, ProducerEvent};
pub use message::{Message, OutboundMessage, TopicPartition};
pub use report::{ErrorReporter, ErrorTags, NullReporter, TracingReporter};
