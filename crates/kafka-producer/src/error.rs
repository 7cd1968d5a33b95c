use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to enqueue message for topic {topic}: {reason}")]
    Enqueue { topic: String, reason: String },

    #[error("Failed to deliver message to topic {topic}: {reason}")]
    Delivery { topic: String, reason: String },

    #[error("Failed to flush producer: {0}")]
    Flush(String),
}

pub type Result<T> = std::result::Result<T, Error>;
