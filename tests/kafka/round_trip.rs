//! Producer to consumer round trip against a real broker
//!
//! Test flow:
//! 1. Start a consumer on a fresh topic and group, reading from the earliest offset
//! 2. Wait for the first partition assignment
//! 3. Send messages with both the synchronous and the fire-and-forget producer
//! 4. Read them back, marking each one processed
//! 5. Stop, drain and clean up

use kafka_extension_consumer::{Consumer, ConsumerConfig, ConsumerState, OffsetReset};
use kafka_extension_producer::{Producer, ProducerConfig, SyncProducer};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::timeout;

/// Kafka broker address for testing
const KAFKA_BROKER: &str = "kafka:9092";

fn generate_test_id() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}

#[tokio::test]
#[ignore = "Requires a Kafka broker at kafka:9092"]
async fn test_produce_and_consume_round_trip() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("kafka_extension_consumer=debug,kafka_extension_producer=debug")
        .try_init()
        .ok();

    let test_id = generate_test_id();
    let topic = format!("test-round-trip-{test_id}");

    // The first sync send auto-creates the topic
    let sync_producer = SyncProducer::new(ProducerConfig {
        brokers: KAFKA_BROKER.to_string(),
        ..Default::default()
    })?;
    sync_producer.produce(&topic, b"sync-0").await?;

    let consumer = Arc::new(Consumer::new(ConsumerConfig {
        topics: vec![topic.clone()],
        brokers: KAFKA_BROKER.to_string(),
        group_id: format!("test-group-{test_id}"),
        channel_size: 4,
        offset_reset: OffsetReset::Earliest,
        ..Default::default()
    })?);
    let mut messages = consumer.take_messages().expect("message channel");
    let pending = consumer.pending_messages().expect("draining is enabled");
    let loop_handle = consumer.spawn_consume_loop();

    timeout(Duration::from_secs(30), consumer.wait_until_ready()).await?;
    assert!(!consumer.assigned_partitions().await.is_empty());

    let (partition, offset) = sync_producer.produce(&topic, b"sync-1").await?;
    assert!(partition >= 0);
    assert!(offset >= 0);

    let producer = Producer::new(ProducerConfig {
        brokers: KAFKA_BROKER.to_string(),
        ..Default::default()
    })?;
    for i in 0..5 {
        producer.send_async(format!("async-{i}"), &topic);
    }
    let stats = producer.delivery_stats();
    producer.close(Duration::from_secs(10)).await?;
    assert_eq!(stats.delivered(), 5);
    assert_eq!(stats.failed(), 0);

    let mut received = HashSet::new();
    while received.len() < 7 {
        let message = timeout(Duration::from_secs(30), messages.recv())
            .await?
            .expect("consume loop ended early");
        assert_eq!(message.topic, topic);
        received.insert(String::from_utf8_lossy(&message.payload).into_owned());
        pending.done();
    }
    assert!(received.contains("sync-0"));
    assert!(received.contains("sync-1"));
    assert!(received.contains("async-4"));

    consumer.stop_consuming();
    timeout(Duration::from_secs(10), pending.wait()).await?;
    consumer.cleanup()?;
    loop_handle.await??;

    assert_eq!(consumer.state(), ConsumerState::Stopped);
    assert_eq!(consumer.messages_received(), 7);
    Ok(())
}
