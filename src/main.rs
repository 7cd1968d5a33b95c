//! Command-line interface for kafka-extension
//!
//! # Usage Examples
//!
//! ## Consume
//! ```bash
//! # Consume with settings from extensions.kafkaconsumer
//! kafka-extension consume --config settings.yaml
//!
//! # Override topics and start from the earliest offset
//! kafka-extension consume --topics orders,payments --offset-reset earliest \
//!   --ready-timeout 30s --shutdown-timeout 10s
//! ```
//!
//! ## Produce
//! ```bash
//! # Fire-and-forget, delivery reports are logged
//! seq 1 10 | kafka-extension produce --topic orders
//!
//! # Wait for each acknowledgement and print partition/offset
//! seq 1 10 | kafka-extension produce --topic orders --sync
//! ```

use anyhow::Context;
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use kafka_extension::config::parse_duration;
use kafka_extension::{
    wait_ready_or_exit, Settings, Startup, DEFAULT_CONSUMER_PREFIX, DEFAULT_PRODUCER_PREFIX,
};
use kafka_extension_consumer::{Consumer, ConsumerConfig, OffsetReset};
use kafka_extension_producer::{Producer, ProducerConfig, SyncProducer};
use kafka_types::TracingReporter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "kafka-extension")]
#[command(about = "Consume from and produce to Kafka using extension settings")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print message payloads from the configured topics until Ctrl-C
    Consume(ConsumeArgs),
    /// Send each line read from stdin to a topic
    Produce(ProduceArgs),
}

#[derive(Args)]
struct SettingsArgs {
    /// YAML settings file
    #[arg(long, env = "KAFKA_EXTENSION_CONFIG")]
    config: Option<PathBuf>,

    /// Dotted key prefix of the section to read (defaults per subcommand)
    #[arg(long)]
    prefix: Option<String>,
}

impl SettingsArgs {
    fn load(&self) -> anyhow::Result<Settings> {
        match &self.config {
            Some(path) => Settings::from_file(path),
            None => Ok(Settings::default()),
        }
    }
}

#[derive(Args)]
struct ConsumeArgs {
    #[command(flatten)]
    settings: SettingsArgs,

    /// Topics to subscribe to (comma-separated)
    #[arg(long, value_delimiter = ',', env = "KAFKA_TOPICS")]
    topics: Vec<String>,

    /// Kafka brokers (comma-separated list)
    #[arg(long, env = "KAFKA_BROKERS")]
    brokers: Option<String>,

    /// Consumer group ID
    #[arg(long, env = "KAFKA_GROUP")]
    group: Option<String>,

    /// Where to start when the group has no committed offset
    #[arg(long, value_enum)]
    offset_reset: Option<OffsetReset>,

    /// How long to wait for the first partition assignment before going on anyway
    #[arg(long, default_value = "30s", value_parser = parse_duration)]
    ready_timeout: Duration,

    /// How long to wait for in-flight messages after Ctrl-C
    #[arg(long, default_value = "10s", value_parser = parse_duration)]
    shutdown_timeout: Duration,
}

impl ConsumeArgs {
    fn consumer_config(&self) -> anyhow::Result<ConsumerConfig> {
        let settings = self.settings.load()?;
        let prefix = self
            .settings
            .prefix
            .as_deref()
            .unwrap_or(DEFAULT_CONSUMER_PREFIX);
        let mut config = settings.consumer_with_prefix(prefix)?;

        if !self.topics.is_empty() {
            config.topics = self.topics.clone();
        }
        if let Some(brokers) = &self.brokers {
            config.brokers = brokers.clone();
        }
        if let Some(group) = &self.group {
            config.group_id = group.clone();
        }
        if let Some(offset_reset) = self.offset_reset {
            config.offset_reset = offset_reset;
        }
        Ok(config)
    }
}

#[derive(Args)]
struct ProduceArgs {
    #[command(flatten)]
    settings: SettingsArgs,

    /// Topic to send to
    #[arg(long)]
    topic: String,

    /// Kafka brokers (comma-separated list)
    #[arg(long, env = "KAFKA_BROKERS")]
    brokers: Option<String>,

    /// Wait for each acknowledgement instead of sending fire-and-forget
    #[arg(long)]
    sync: bool,
}

impl ProduceArgs {
    fn producer_config(&self) -> anyhow::Result<ProducerConfig> {
        let settings = self.settings.load()?;
        let prefix = self
            .settings
            .prefix
            .as_deref()
            .unwrap_or(DEFAULT_PRODUCER_PREFIX);
        let mut config = settings.producer_with_prefix(prefix)?;

        if let Some(brokers) = &self.brokers {
            config.brokers = brokers.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Consume(args) => run_consume(args).await,
        Commands::Produce(args) => run_produce(args).await,
    }
}

async fn run_consume(args: ConsumeArgs) -> anyhow::Result<()> {
    let config = args.consumer_config()?;
    let consumer = Arc::new(
        Consumer::new(config)
            .context("Failed to create Kafka consumer")?
            .with_error_reporter(Arc::new(TracingReporter)),
    );

    let mut messages = consumer
        .take_messages()
        .context("Message channel already taken")?;
    let pending = consumer.pending_messages();
    let mut loop_handle = consumer.spawn_consume_loop();

    let reader = tokio::spawn(async move {
        while let Some(message) = messages.recv().await {
            println!("{}", String::from_utf8_lossy(&message.payload));
            if let Some(pending) = &pending {
                pending.done();
            }
        }
    });

    let startup = wait_ready_or_exit(&*consumer, &mut loop_handle, args.ready_timeout).await;
    let early_exit = match startup {
        Startup::Exited(result) => Some(result),
        startup => {
            if matches!(startup, Startup::Ready) {
                info!(
                    "Consumer ready: {} partition(s) assigned",
                    consumer.assigned_partitions().await.len()
                );
            } else {
                warn!(
                    "No partitions assigned after {:?}, continuing to wait in the background",
                    args.ready_timeout
                );
            }

            // Either Ctrl-C or the loop ending on its own (fatal error)
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal.context("Failed to listen for Ctrl-C")?;
                    info!("Shutting down...");
                    None
                }
                result = &mut loop_handle => Some(result),
            }
        }
    };

    consumer.stop_consuming();
    if let Some(pending) = consumer.pending_messages() {
        if tokio::time::timeout(args.shutdown_timeout, pending.wait())
            .await
            .is_err()
        {
            warn!(
                "{} message(s) still pending after {:?}",
                pending.count(),
                args.shutdown_timeout
            );
        }
    }
    consumer.cleanup().context("Failed to close Kafka consumer")?;

    let loop_result = match early_exit {
        Some(result) => result,
        None => loop_handle.await,
    };
    reader.abort();

    info!(
        "Consumed {} messages in total",
        consumer.messages_received()
    );
    loop_result
        .context("Consume loop task failed")?
        .context("Consume loop ended with an error")
}

async fn run_produce(args: ProduceArgs) -> anyhow::Result<()> {
    let config = args.producer_config()?;
    let timeout = config.message_timeout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if args.sync {
        let producer = SyncProducer::new(config).context("Failed to create Kafka producer")?;
        while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
            let (partition, offset) = producer.produce(&args.topic, line.as_bytes()).await?;
            println!("{}[{partition}]@{offset}", args.topic);
        }
        return Ok(());
    }

    let producer = Producer::new_with_reporter(config, Arc::new(TracingReporter))
        .context("Failed to create Kafka producer")?;
    let mut sent = 0u64;
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        producer.send_async(Bytes::from(line), &args.topic);
        sent += 1;
    }

    let stats = producer.delivery_stats();
    producer
        .close(timeout)
        .await
        .context("Failed to flush Kafka producer")?;
    info!(
        "Sent {sent} message(s): {} delivered, {} failed",
        stats.delivered(),
        stats.failed()
    );
    Ok(())
}
