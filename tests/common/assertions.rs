//! Event assertions for integration tests

use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;
use update_stager::Event;

/// Result of waiting for an event
#[derive(Debug)]
pub enum WaitResult {
    /// A matching event arrived
    Received(Event),
    /// Timeout waiting for the event
    Timeout,
    /// Channel closed unexpectedly
    ChannelClosed,
}

/// Wait until an event matching `pred` arrives
pub async fn wait_for<F>(events: &mut Receiver<Event>, timeout: Duration, pred: F) -> WaitResult
where
    F: Fn(&Event) -> bool,
{
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return WaitResult::Received(event),
                Ok(_) => {
                    // Other events, continue waiting
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return WaitResult::ChannelClosed,
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Like [`wait_for`] with a one second timeout, panicking when nothing matches
pub async fn expect_event<F>(events: &mut Receiver<Event>, pred: F) -> Event
where
    F: Fn(&Event) -> bool,
{
    match wait_for(events, Duration::from_secs(1), pred).await {
        WaitResult::Received(event) => event,
        other => panic!("expected event, got {other:?}"),
    }
}
