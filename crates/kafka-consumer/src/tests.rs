//! Unit tests for the consumer loop, driven by the mock broker client.

use std::error::Error as StdError;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use kafka_types::{ErrorReporter, ErrorTags, Message, TopicPartition};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

use crate::testing::{ClientCall, MockConsumerClient, MockEvents};
use crate::{Consumer, ConsumerConfig, ConsumerState, Error, Result};

const WAIT: Duration = Duration::from_secs(2);

/// Reporter that remembers what it was given.
#[derive(Default)]
struct RecordingReporter {
    captured: StdMutex<Vec<(String, ErrorTags)>>,
}

impl ErrorReporter for RecordingReporter {
    fn capture(&self, error: &(dyn StdError + 'static), tags: ErrorTags) {
        self.captured
            .lock()
            .unwrap()
            .push((error.to_string(), tags));
    }
}

fn config(channel_size: usize) -> ConsumerConfig {
    ConsumerConfig {
        topics: vec!["t".to_string()],
        channel_size,
        ..Default::default()
    }
}

struct Harness {
    consumer: Arc<Consumer<MockConsumerClient>>,
    events: MockEvents,
    messages: mpsc::Receiver<Message>,
    handle: JoinHandle<Result<()>>,
}

fn start_with(config: ConsumerConfig, client: MockConsumerClient, events: MockEvents) -> Harness {
    let consumer = Arc::new(Consumer::with_client(config, client).unwrap());
    let messages = consumer.take_messages().unwrap();
    let handle = consumer.spawn_consume_loop();
    Harness {
        consumer,
        events,
        messages,
        handle,
    }
}

fn start(config: ConsumerConfig) -> Harness {
    let (client, events) = MockConsumerClient::new();
    start_with(config, client, events)
}

async fn next_message(messages: &mut mpsc::Receiver<Message>) -> Message {
    timeout(WAIT, messages.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("message channel closed")
}

async fn finished(handle: JoinHandle<Result<()>>) -> Result<()> {
    timeout(WAIT, handle)
        .await
        .expect("consume loop did not exit")
        .expect("consume loop panicked")
}

async fn eventually<F: Fn() -> bool>(condition: F) {
    let poll = async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    };
    timeout(WAIT, poll).await.expect("condition never became true");
}

fn completes_within<F: Future>(future: F) -> impl Future<Output = bool> {
    async move { timeout(Duration::from_millis(50), future).await.is_ok() }
}

// ============================================================================
// Message delivery
// ============================================================================

#[tokio::test]
async fn test_messages_delivered_in_order_and_counted() {
    let mut h = start(config(10));

    for i in 0..5 {
        h.events.message("t", 0, i, format!("msg-{i}"));
    }

    for i in 0..5 {
        let msg = next_message(&mut h.messages).await;
        assert_eq!(msg.payload, format!("msg-{i}").as_bytes());
        assert_eq!(msg.offset, i);
    }
    assert_eq!(h.consumer.messages_received(), 5);
    assert_eq!(
        h.consumer.client().calls()[0],
        ClientCall::Subscribe(vec!["t".to_string()])
    );

    h.consumer.stop_consuming();
    h.events.partition_eof("t", 0);
    finished(h.handle).await.unwrap();
    assert!(h.messages.try_recv().is_err());
}

#[tokio::test]
async fn test_full_channel_blocks_event_loop() {
    let mut h = start(config(1));

    h.events.message("t", 0, 0, "first");
    h.events.message("t", 0, 1, "second");
    h.events.assign(&[("t", 0)]);

    // The second push waits for room, so the assignment behind it stays queued
    eventually(|| h.consumer.messages_received() == 2).await;
    sleep(Duration::from_millis(50)).await;
    assert!(!h.consumer.is_ready());

    assert_eq!(next_message(&mut h.messages).await.payload, "first");
    eventually(|| h.consumer.is_ready()).await;
    assert_eq!(next_message(&mut h.messages).await.payload, "second");
    assert_eq!(h.consumer.messages_received(), 2);

    h.consumer.cleanup().unwrap();
    finished(h.handle).await.unwrap();
}

#[tokio::test]
async fn test_dropped_receiver_is_fatal() {
    let Harness {
        consumer,
        events,
        messages,
        handle,
    } = start(config(10));
    drop(messages);

    events.message("t", 0, 0, "lost");
    assert!(matches!(finished(handle).await, Err(Error::ChannelClosed)));
    assert!(!consumer.is_running());
    assert_eq!(consumer.pending_messages().unwrap().count(), 0);
}

#[test]
fn test_take_messages_only_once() {
    let (client, _events) = MockConsumerClient::new();
    let consumer = Consumer::with_client(config(1), client).unwrap();
    assert!(consumer.take_messages().is_some());
    assert!(consumer.take_messages().is_none());
}

// ============================================================================
// Rebalances
// ============================================================================

#[tokio::test]
async fn test_revocation_clears_assignment() {
    let mut h = start(config(10));

    h.events.assign(&[("t", 0), ("t", 1)]);
    h.events.message("t", 0, 0, "sync");
    next_message(&mut h.messages).await;
    assert_eq!(
        h.consumer.assigned_partitions().await,
        vec![TopicPartition::new("t", 0), TopicPartition::new("t", 1)]
    );

    h.events.revoke(&[("t", 0), ("t", 1)]);
    h.events.message("t", 0, 1, "sync");
    next_message(&mut h.messages).await;
    assert!(h.consumer.assigned_partitions().await.is_empty());
    assert!(h.consumer.client().calls().contains(&ClientCall::Unassign));

    h.consumer.cleanup().unwrap();
    finished(h.handle).await.unwrap();
}

#[tokio::test]
async fn test_reassignment_replaces_rather_than_merges() {
    let mut h = start(config(10));

    h.events.assign(&[("t", 0), ("t", 1)]);
    h.events.assign(&[("t", 2)]);
    h.events.message("t", 2, 0, "sync");
    next_message(&mut h.messages).await;

    assert_eq!(
        h.consumer.assigned_partitions().await,
        vec![TopicPartition::new("t", 2)]
    );

    h.consumer.cleanup().unwrap();
    finished(h.handle).await.unwrap();
}

#[tokio::test]
async fn test_assignment_failure_is_not_fatal() {
    let (client, events) = MockConsumerClient::new();
    let mut h = start_with(config(10), client.fail_assign("coordinator moved"), events);

    h.events.assign(&[("t", 0)]);
    h.events.message("t", 0, 0, "still flowing");

    assert_eq!(next_message(&mut h.messages).await.payload, "still flowing");
    assert!(h.consumer.is_running());
    assert!(h.consumer.is_ready());
    assert_eq!(
        h.consumer.assigned_partitions().await,
        vec![TopicPartition::new("t", 0)]
    );

    h.consumer.cleanup().unwrap();
    finished(h.handle).await.unwrap();
}

#[tokio::test]
async fn test_unassign_failure_still_clears_assignment() {
    let (client, events) = MockConsumerClient::new();
    let mut h = start_with(config(10), client.fail_unassign("not a member"), events);

    h.events.assign(&[("t", 0)]);
    h.events.revoke(&[("t", 0)]);
    h.events.message("t", 0, 0, "sync");
    next_message(&mut h.messages).await;

    assert!(h.consumer.is_running());
    assert!(h.consumer.assigned_partitions().await.is_empty());
    assert!(h.consumer.client().calls().contains(&ClientCall::Unassign));

    h.consumer.cleanup().unwrap();
    finished(h.handle).await.unwrap();
}

#[tokio::test]
async fn test_failed_assignment_then_revocation_leaves_nothing_assigned() {
    let (client, events) = MockConsumerClient::new();
    let mut h = start_with(config(10), client.fail_assign("coordinator moved"), events);

    h.events.assign(&[("t", 0), ("t", 1)]);
    h.events.revoke(&[("t", 0), ("t", 1)]);
    h.events.message("t", 0, 0, "sync");
    next_message(&mut h.messages).await;

    assert!(h.consumer.is_running());
    assert!(h.consumer.assigned_partitions().await.is_empty());

    h.consumer.cleanup().unwrap();
    finished(h.handle).await.unwrap();
}

#[tokio::test]
async fn test_failed_reassignment_still_tracks_latest_event() {
    let (client, events) = MockConsumerClient::new();
    let mut h = start_with(config(10), client.fail_assign("rebalance in progress"), events);

    h.events.assign(&[("t", 0)]);
    h.events.assign(&[("t", 1), ("t", 2)]);
    h.events.message("t", 1, 0, "sync");
    next_message(&mut h.messages).await;

    assert_eq!(
        h.consumer.assigned_partitions().await,
        vec![TopicPartition::new("t", 1), TopicPartition::new("t", 2)]
    );

    h.consumer.cleanup().unwrap();
    finished(h.handle).await.unwrap();
}

#[tokio::test]
async fn test_informational_events_do_not_change_state() {
    let mut h = start(config(10));

    h.events.partition_eof("t", 0);
    h.events.offsets_committed("t", 0, 17);
    h.events.unrecognized("stats: {}");
    h.events.message("t", 0, 18, "after");

    next_message(&mut h.messages).await;
    assert_eq!(h.consumer.messages_received(), 1);
    assert!(h.consumer.assigned_partitions().await.is_empty());
    assert!(!h.consumer.is_ready());
    assert!(h.consumer.is_running());

    h.consumer.cleanup().unwrap();
    finished(h.handle).await.unwrap();
}

// ============================================================================
// Readiness
// ============================================================================

#[tokio::test]
async fn test_wait_until_ready_blocks_until_assignment() {
    let h = start(config(10));

    assert!(!completes_within(h.consumer.wait_until_ready()).await);
    assert!(!h.consumer.is_ready());

    h.events.assign(&[("t", 0)]);
    timeout(WAIT, h.consumer.wait_until_ready())
        .await
        .expect("assignment should make the consumer ready");

    // Already ready: returns at once, even after a revocation
    h.events.revoke(&[("t", 0)]);
    assert!(completes_within(h.consumer.wait_until_ready()).await);

    h.consumer.cleanup().unwrap();
    finished(h.handle).await.unwrap();
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_stop_finishes_in_flight_message() {
    let mut h = start(config(1));

    h.events.message("t", 0, 0, "first");
    h.events.message("t", 0, 1, "second");

    // The loop is now pushing "second" onto the full channel
    eventually(|| h.consumer.messages_received() == 2).await;
    h.consumer.stop_consuming();
    assert!(!h.consumer.is_running());

    assert_eq!(next_message(&mut h.messages).await.payload, "first");
    finished(h.handle).await.unwrap();
    assert_eq!(next_message(&mut h.messages).await.payload, "second");
    assert_eq!(h.consumer.state(), ConsumerState::Stopped);
}

#[tokio::test]
async fn test_broker_error_is_fatal() {
    let (client, events) = MockConsumerClient::new();
    let reporter = Arc::new(RecordingReporter::default());
    let consumer = Arc::new(
        Consumer::with_client(config(10), client)
            .unwrap()
            .with_error_reporter(reporter.clone()),
    );
    let handle = consumer.spawn_consume_loop();

    events.assign(&[("t", 0)]);
    events.error("all brokers down");

    match finished(handle).await {
        Err(Error::Broker(err)) => assert_eq!(err.message, "all brokers down"),
        other => panic!("expected broker error, got {other:?}"),
    }
    assert!(!consumer.is_running());
    assert_eq!(consumer.state(), ConsumerState::Stopped);

    let captured = reporter.captured.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].0, "all brokers down");
    assert_eq!(captured[0].1.extension, "kafka-consumer");
}

#[tokio::test]
async fn test_subscribe_failure_is_terminal() {
    let (client, _events) = MockConsumerClient::new();
    let consumer = Consumer::with_client(config(10), client.fail_subscribe("unknown topic")).unwrap();
    let mut messages = consumer.take_messages().unwrap();

    let result = consumer.consume_loop().await;
    assert!(matches!(result, Err(Error::Subscription { .. })));
    assert!(!consumer.is_running());
    assert_eq!(consumer.state(), ConsumerState::Stopped);
    assert!(messages.try_recv().is_err());

    // No way back to running
    assert!(matches!(
        consumer.consume_loop().await,
        Err(Error::InvalidState("stopped"))
    ));
}

#[tokio::test]
async fn test_concurrent_loop_is_rejected() {
    let h = start(config(10));
    eventually(|| h.consumer.is_running()).await;

    assert!(matches!(
        h.consumer.consume_loop().await,
        Err(Error::InvalidState("running"))
    ));

    h.consumer.cleanup().unwrap();
    finished(h.handle).await.unwrap();
}

#[tokio::test]
async fn test_event_stream_closed_while_running() {
    let Harness {
        consumer,
        events,
        messages: _messages,
        handle,
    } = start(config(10));
    eventually(|| consumer.is_running()).await;

    drop(events);
    assert!(matches!(
        finished(handle).await,
        Err(Error::EventStreamClosed)
    ));
    assert_eq!(consumer.state(), ConsumerState::Stopped);
}

#[tokio::test]
async fn test_cleanup_stops_and_closes_once() {
    let h = start(config(10));
    h.events.assign(&[("t", 0)]);
    timeout(WAIT, h.consumer.wait_until_ready()).await.unwrap();

    h.consumer.cleanup().unwrap();
    assert!(!h.consumer.is_running());
    // Closing the client closes its event source, which releases the loop
    finished(h.handle).await.unwrap();

    h.consumer.cleanup().unwrap();
    let closes = h
        .consumer
        .client()
        .calls()
        .into_iter()
        .filter(|call| *call == ClientCall::Close)
        .count();
    assert_eq!(closes, 1);
}

#[tokio::test]
async fn test_cleanup_returns_close_error() {
    let (client, _events) = MockConsumerClient::new();
    let consumer = Consumer::with_client(config(10), client.fail_close("socket busy")).unwrap();

    assert!(matches!(consumer.cleanup(), Err(Error::Close(_))));
    assert!(consumer.cleanup().is_ok());
    assert_eq!(consumer.state(), ConsumerState::Stopped);
    assert!(matches!(
        consumer.consume_loop().await,
        Err(Error::InvalidState("stopped"))
    ));
}

// ============================================================================
// Pending messages
// ============================================================================

#[tokio::test]
async fn test_pending_messages_drain() {
    let mut h = start(config(10));
    let pending = h.consumer.pending_messages().expect("draining is on by default");

    for i in 0..3 {
        h.events.message("t", 0, i, "work");
    }
    for _ in 0..3 {
        next_message(&mut h.messages).await;
    }
    assert_eq!(pending.count(), 3);

    h.consumer.stop_consuming();
    h.events.partition_eof("t", 0);
    finished(h.handle).await.unwrap();

    let drained = {
        let pending = pending.clone();
        tokio::spawn(async move { pending.wait().await })
    };
    pending.done();
    pending.done();
    assert!(!completes_within(pending.wait()).await);
    pending.done();
    timeout(WAIT, drained).await.unwrap().unwrap();
}

#[test]
fn test_pending_messages_disabled() {
    let (client, _events) = MockConsumerClient::new();
    let config = ConsumerConfig {
        drain_before_exit: false,
        ..config(10)
    };
    let consumer = Consumer::with_client(config, client).unwrap();
    assert!(consumer.pending_messages().is_none());
}

#[test]
fn test_with_client_rejects_invalid_config() {
    let (client, _events) = MockConsumerClient::new();
    let result = Consumer::with_client(config(0), client);
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}
