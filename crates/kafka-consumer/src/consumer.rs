use crate::client::{ConsumerClient, KafkaConsumerClient};
use crate::config::ConsumerConfig;
use crate::coordination::{PendingMessages, ReadyGate};
use crate::error::{Error, Result};
use kafka_types::{
    BrokerError, BrokerEvent, ErrorReporter, ErrorTags, Message, NullReporter, TopicPartition,
};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

/// Log the received-message count every this many messages
const PROGRESS_LOG_INTERVAL: u64 = 1000;

/// Lifecycle of a [`Consumer`]. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    /// Constructed, `consume_loop` not called yet
    Idle,
    /// `consume_loop` is running
    Running,
    /// The loop exited (stop, fatal error, failed subscribe) or the consumer was cleaned up
    Stopped,
}

impl ConsumerState {
    fn from_u8(value: u8) -> Self {
        match value {
            IDLE => ConsumerState::Idle,
            RUNNING => ConsumerState::Running,
            _ => ConsumerState::Stopped,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ConsumerState::Idle => "idle",
            ConsumerState::Running => "running",
            ConsumerState::Stopped => "stopped",
        }
    }
}

/// Event-driven Kafka consumer feeding a bounded message channel.
///
/// One task runs [`consume_loop`](Self::consume_loop); any other task may
/// read messages, wait for readiness, request a stop or clean up. Pushing onto
/// a full channel suspends the loop, so a slow reader throttles broker polling.
pub struct Consumer<C: ConsumerClient = KafkaConsumerClient> {
    client: C,
    config: ConsumerConfig,
    running: AtomicBool,
    state: AtomicU8,
    closed: AtomicBool,
    messages_received: AtomicU64,
    assigned: RwLock<Vec<TopicPartition>>,
    messages_tx: mpsc::Sender<Message>,
    messages_rx: StdMutex<Option<mpsc::Receiver<Message>>>,
    ready: ReadyGate,
    pending: Option<PendingMessages>,
    reporter: Arc<dyn ErrorReporter>,
}

impl Consumer<KafkaConsumerClient> {
    /// Create a new Kafka consumer
    pub fn new(config: ConsumerConfig) -> Result<Self> {
        config.validate()?;
        debug!(
            "Configuring Kafka consumer: brokers={}, group={}, session_timeout_ms={}, offset_reset={}, topics={:?}",
            config.brokers,
            config.group_id,
            config.session_timeout_ms,
            config.offset_reset,
            config.topics
        );

        let client = KafkaConsumerClient::new(&config).inspect_err(|e| {
            error!("Error configuring Kafka consumer: {e}");
        })?;
        Self::with_client(config, client)
    }
}

impl<C: ConsumerClient> Consumer<C> {
    /// Create a consumer on top of an existing broker client
    pub fn with_client(config: ConsumerConfig, client: C) -> Result<Self> {
        config.validate()?;

        let (messages_tx, messages_rx) = mpsc::channel(config.channel_size);
        let pending = config.drain_before_exit.then(PendingMessages::new);

        info!(
            "Kafka consumer configured for topics {:?} (channel_size={}, drain_before_exit={})",
            config.topics, config.channel_size, config.drain_before_exit
        );

        Ok(Self {
            client,
            config,
            running: AtomicBool::new(false),
            state: AtomicU8::new(IDLE),
            closed: AtomicBool::new(false),
            messages_received: AtomicU64::new(0),
            assigned: RwLock::new(Vec::new()),
            messages_tx,
            messages_rx: StdMutex::new(Some(messages_rx)),
            ready: ReadyGate::new(),
            pending,
            reporter: Arc::new(NullReporter),
        })
    }

    /// Send fatal broker errors to `reporter` in addition to the logs
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Subscribe and dispatch broker events until stopped.
    ///
    /// Returns `Ok(())` when the loop exits after [`stop_consuming`](Self::stop_consuming).
    /// Any error means the consumer is now [`ConsumerState::Stopped`] and
    /// [`cleanup`](Self::cleanup) should be called. The stop flag is checked
    /// once per event, so a stop takes effect after the next event is handled
    /// or when the client's event source closes.
    pub async fn consume_loop(&self) -> Result<()> {
        if let Err(current) =
            self.state
                .compare_exchange(IDLE, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
        {
            return Err(Error::InvalidState(ConsumerState::from_u8(current).as_str()));
        }
        self.running.store(true, Ordering::SeqCst);

        let topics = &self.config.topics;
        if let Err(e) = self.client.subscribe(topics) {
            error!("Error subscribing to topics {topics:?}: {e}");
            self.finish();
            return Err(e);
        }
        info!("Successfully subscribed to topics {topics:?}");

        let result = self.run_event_loop().await;
        self.finish();
        result
    }

    /// Spawn [`consume_loop`](Self::consume_loop) on the runtime
    pub fn spawn_consume_loop(self: &Arc<Self>) -> JoinHandle<Result<()>>
    where
        C: 'static,
    {
        let consumer = Arc::clone(self);
        tokio::spawn(async move { consumer.consume_loop().await })
    }

    async fn run_event_loop(&self) -> Result<()> {
        while self.running.load(Ordering::SeqCst) {
            let Some(event) = self.client.next_event().await else {
                if self.running.load(Ordering::SeqCst) {
                    error!("Kafka event stream closed while consuming");
                    return Err(Error::EventStreamClosed);
                }
                debug!("Kafka event stream closed after stop was requested");
                break;
            };
            self.handle_event(event).await?;
        }

        info!(
            "Stopped consuming from topics {:?} after {} messages",
            self.config.topics,
            self.messages_received()
        );
        Ok(())
    }

    async fn handle_event(&self, event: BrokerEvent) -> Result<()> {
        match event {
            BrokerEvent::AssignedPartitions(partitions) => {
                self.assign_partitions(partitions).await;
            }
            BrokerEvent::RevokedPartitions(partitions) => {
                self.unassign_partitions(&partitions).await;
            }
            BrokerEvent::Message(message) => {
                self.receive_message(message).await?;
            }
            BrokerEvent::PartitionEof(partition) => {
                debug!("Reached partition EOF: {partition}");
            }
            BrokerEvent::OffsetsCommitted(offsets) => {
                debug!(
                    "Offsets committed successfully: {}",
                    format_partitions(&offsets)
                );
            }
            BrokerEvent::Error(err) => {
                self.handle_error(&err);
                self.stop_consuming();
                return Err(Error::Broker(err));
            }
            BrokerEvent::Unrecognized(description) => {
                warn!("Kafka event not recognized: {description}");
            }
        }
        Ok(())
    }

    async fn assign_partitions(&self, partitions: Vec<TopicPartition>) {
        debug!("Assigning partitions {}", format_partitions(&partitions));
        match self.client.assign(&partitions) {
            Ok(()) => info!("Partitions assigned: {}", format_partitions(&partitions)),
            Err(e) => error!(
                "Failed to assign partitions {}: {e}",
                format_partitions(&partitions)
            ),
        }
        // The set tracks the latest rebalance event even if the client call failed
        *self.assigned.write().await = partitions;

        if self.ready.open() {
            info!("Kafka consumer ready");
        }
    }

    async fn unassign_partitions(&self, revoked: &[TopicPartition]) {
        debug!("Unassigning partitions {}", format_partitions(revoked));
        match self.client.unassign() {
            Ok(()) => info!("Partitions unassigned"),
            Err(e) => error!("Failed to unassign partitions: {e}"),
        }
        self.assigned.write().await.clear();
    }

    async fn receive_message(&self, message: Message) -> Result<()> {
        let received = self.messages_received.fetch_add(1, Ordering::SeqCst) + 1;
        if received % PROGRESS_LOG_INTERVAL == 0 {
            info!("Messages received from Kafka: {received}");
        }
        debug!(
            "Message on {}: {} bytes",
            message.topic_partition(),
            message.payload.len()
        );

        if let Some(pending) = &self.pending {
            pending.add(1);
        }

        // Waits while the channel is full
        if self.messages_tx.send(message).await.is_err() {
            if let Some(pending) = &self.pending {
                pending.done();
            }
            error!("Message channel receiver dropped, stopping consumer");
            self.stop_consuming();
            return Err(Error::ChannelClosed);
        }

        Ok(())
    }

    fn handle_error(&self, err: &BrokerError) {
        self.reporter.capture(
            err,
            ErrorTags {
                version: env!("CARGO_PKG_VERSION"),
                extension: "kafka-consumer",
            },
        );
        error!("Error in Kafka connection: {err}");
    }

    fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.state.store(STOPPED, Ordering::SeqCst);
    }

    /// Block until the first partition assignment has been processed.
    ///
    /// There is no timeout: if the group never assigns a partition this never
    /// resolves. Wrap it in `tokio::time::timeout` for a bounded wait.
    pub async fn wait_until_ready(&self) {
        self.ready.wait().await;
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_open()
    }

    /// Ask the loop to exit after the event it is currently handling.
    ///
    /// Does not close the channel or wait for pending messages.
    pub fn stop_consuming(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Stopping Kafka consumer");
        }
    }

    /// Take the receiving end of the message channel.
    ///
    /// Returns `None` after the first call.
    pub fn take_messages(&self) -> Option<mpsc::Receiver<Message>> {
        self.messages_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Tracker of dispatched-but-unprocessed messages, when draining is enabled.
    ///
    /// Readers must call [`PendingMessages::done`] after handling each message.
    pub fn pending_messages(&self) -> Option<PendingMessages> {
        self.pending.clone()
    }

    /// Stop if still running and close the broker client.
    ///
    /// The client is closed at most once; later calls return `Ok(())`. For
    /// [`KafkaConsumerClient`] this releases the rdkafka consumer, so the group
    /// is left and broker connections are shut without dropping the `Consumer`.
    pub fn cleanup(&self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            self.stop_consuming();
        }
        // A consumer that never ran can no longer start on a closed client
        let _ = self
            .state
            .compare_exchange(IDLE, STOPPED, Ordering::SeqCst, Ordering::SeqCst);

        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.client.close().inspect_err(|e| {
            error!("Error closing Kafka consumer: {e}");
        })?;
        info!("Kafka consumer closed");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ConsumerState {
        ConsumerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::SeqCst)
    }

    /// Partitions applied by the most recent rebalance
    pub async fn assigned_partitions(&self) -> Vec<TopicPartition> {
        self.assigned.read().await.clone()
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Get the underlying broker client (for advanced use cases)
    pub fn client(&self) -> &C {
        &self.client
    }
}

fn format_partitions(partitions: &[TopicPartition]) -> String {
    let formatted: Vec<String> = partitions.iter().map(ToString::to_string).collect();
    format!("[{}]", formatted.join(", "))
}
