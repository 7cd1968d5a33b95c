use kafka_extension_consumer::{Consumer, ConsumerConfig, OffsetReset};
use std::sync::Arc;
use std::time::Duration;

/// Example demonstrating a consumer that drains in-flight messages on shutdown
///
/// This example shows how to:
/// 1. Configure a consumer with a small bounded channel
/// 2. Run the consume loop in its own task
/// 3. Wait (with a caller-side timeout) for the first partition assignment
/// 4. Process messages and mark them done
/// 5. Stop, drain pending messages and clean up on Ctrl-C
///
/// To run this example:
/// 1. Start Kafka with Docker
///   docker run -d --name kafka -p 9092:9092 apache/kafka:latest
/// 2. Run the example
///   cargo run -p kafka-extension-consumer --example drain_on_shutdown
/// 3. Produce some lines from another terminal
///   cargo run -- produce --topic user-events

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    match run_main().await {
        Ok(_) => {}
        Err(e) => {
            eprintln!("Error: {e:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<()> {
    let config = ConsumerConfig {
        brokers: "localhost:9092".to_string(),
        group_id: "drain-example-group".to_string(),
        topics: vec!["user-events".to_string()],
        channel_size: 10,
        offset_reset: OffsetReset::Earliest,
        drain_before_exit: true,
        ..Default::default()
    };

    let consumer = Arc::new(Consumer::new(config)?);
    let mut messages = consumer
        .take_messages()
        .ok_or_else(|| anyhow::anyhow!("message channel already taken"))?;
    let pending = consumer.pending_messages();
    let loop_handle = consumer.spawn_consume_loop();

    if tokio::time::timeout(Duration::from_secs(30), consumer.wait_until_ready())
        .await
        .is_err()
    {
        println!("No partitions assigned after 30s, still waiting in the background");
    }

    let reader = tokio::spawn(async move {
        while let Some(message) = messages.recv().await {
            println!(
                "{}[{}]@{}: {}",
                message.topic,
                message.partition,
                message.offset,
                String::from_utf8_lossy(&message.payload)
            );
            if let Some(pending) = &pending {
                pending.done();
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    println!("Shutting down...");
    consumer.stop_consuming();

    if let Some(pending) = consumer.pending_messages() {
        tokio::time::timeout(Duration::from_secs(10), pending.wait()).await?;
    }
    consumer.cleanup()?;
    loop_handle.await??;
    reader.abort();

    println!(
        "Consumed {} messages in total",
        consumer.messages_received()
    );
    Ok(())
}
