//! Waiting for a consumer to become ready.

use kafka_extension_consumer::{Consumer, ConsumerClient};
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};

/// Outcome of [`wait_ready_or_exit`].
#[derive(Debug)]
pub enum Startup {
    /// The first partition assignment was processed
    Ready,
    /// No assignment within the timeout; the loop is still running
    TimedOut,
    /// The consume loop ended before becoming ready
    Exited(Result<kafka_extension_consumer::Result<()>, JoinError>),
}

/// Wait for the first partition assignment, bounded by `timeout`, returning
/// early if the consume loop ends first (e.g. a failed subscription).
pub async fn wait_ready_or_exit<C: ConsumerClient>(
    consumer: &Consumer<C>,
    loop_handle: &mut JoinHandle<kafka_extension_consumer::Result<()>>,
    timeout: Duration,
) -> Startup {
    tokio::select! {
        ready = tokio::time::timeout(timeout, consumer.wait_until_ready()) => match ready {
            Ok(()) => Startup::Ready,
            Err(_) => Startup::TimedOut,
        },
        result = loop_handle => Startup::Exited(result),
    }
}
