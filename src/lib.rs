//! Kafka extension
//!
//! Ties the consumer and producer crates to a YAML settings file.
//!
//! # Crates
//!
//! - `kafka_extension_consumer` - consumer with partition-assignment handling,
//!   readiness signalling and graceful draining
//! - `kafka_extension_producer` - fire-and-forget and synchronous producers
//! - `kafka_types` - messages, broker events and error capture shared by both
//!
//! # CLI Usage
//!
//! ```bash
//! # Print every message from the configured topics until Ctrl-C
//! kafka-extension consume --config settings.yaml
//!
//! # Send each stdin line to a topic
//! kafka-extension produce --topic events --config settings.yaml
//! ```

pub mod config;
pub mod startup;

pub use config::{Settings, DEFAULT_CONSUMER_PREFIX, DEFAULT_PRODUCER_PREFIX};
pub use startup::{wait_ready_or_exit, Startup};
pub use kafka_extension_consumer as consumer;
pub use kafka_extension_producer as producer;
