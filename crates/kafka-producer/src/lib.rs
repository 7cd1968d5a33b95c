//! Kafka producer extension
//!
//! Two producers share one configuration:
//!
//! - [`Producer`] queues messages without waiting. A background task reads
//!   delivery reports, logs confirmations and sends failures to an
//!   [`ErrorReporter`].
//! - [`SyncProducer`] awaits the broker acknowledgement and returns the
//!   partition and offset the message was written at.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use kafka_extension_producer::{Producer, ProducerConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let producer = Producer::new(ProducerConfig::default())?;
//!     producer.send_async("hello", "test-topic");
//!     producer.close(Duration::from_secs(5)).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod producer;
pub mod sync_producer;
pub mod testing;

pub use client::{KafkaProducerClient, ProducerClient};
pub use config::ProducerConfig;
pub use error::{Error, Result};
pub use producer::{DeliveryStats, Producer};
pub use sync_producer::SyncProducer;

// Re-export shared types for convenience
pub use kafka_types::{
    BrokerError, DeliveryReport, ErrorReporter, ErrorTags, NullReporter, OutboundMessage,
    ProducerEvent, TracingReporter,
};
