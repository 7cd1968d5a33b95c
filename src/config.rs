//! Settings loading for the Kafka extension
//!
//! Consumer and producer sections are read from a YAML settings file under
//! dotted key prefixes, `extensions.kafkaconsumer` and
//! `extensions.kafkaproducer` unless the caller picks others.

mod duration;
mod settings;

pub use duration::parse_duration;
pub use settings::{Settings, DEFAULT_CONSUMER_PREFIX, DEFAULT_PRODUCER_PREFIX};
