use kafka_types::BrokerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to subscribe to topics {topics:?}: {reason}")]
    Subscription { topics: Vec<String>, reason: String },

    #[error("Failed to assign partitions: {0}")]
    Assignment(String),

    #[error("Failed to unassign partitions: {0}")]
    Unassignment(String),

    #[error("Broker error: {0}")]
    Broker(#[source] BrokerError),

    #[error("Broker event stream closed while consuming")]
    EventStreamClosed,

    #[error("Message channel closed by the receiver")]
    ChannelClosed,

    #[error("Consumer is {0}, operation not allowed")]
    InvalidState(&'static str),

    #[error("Failed to close consumer: {0}")]
    Close(String),
}

pub type Result<T> = std::result::Result<T, Error>;
