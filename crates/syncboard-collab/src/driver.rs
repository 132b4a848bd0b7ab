//! Tokio event-loop adapter
//!
//! The client itself is deterministic and clock-agnostic; this module
//! drives it from asynchronous inputs: transport events, engine events,
//! pointer samples and the periodic maintenance tick. Everything runs on
//! one task, so session and document mutation stay single-threaded.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::channel::Channel;
use crate::client::CollabClient;
use crate::engine::{DocumentEngine, EngineEvent, Point};

/// Transport-side events fed into the driver
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// The transport (re)connected
    Connected,
    /// One inbound wire message
    Message(String),
    /// The transport dropped; it reconnects on its own
    Disconnected,
}

/// Input handles for a running driver. Dropping every sender or calling
/// [`DriverHandle::shutdown`] stops the loop.
#[derive(Clone)]
pub struct DriverHandle {
    /// Transport events
    pub channel_events: mpsc::Sender<ChannelEvent>,
    /// Document Engine events
    pub engine_events: mpsc::Sender<EngineEvent>,
    /// Local pointer samples, screen coordinates
    pub pointer: mpsc::Sender<Point>,
    cancel: CancellationToken,
}

impl DriverHandle {
    /// Request the driver to stop
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Single-task event loop around a [`CollabClient`]
pub struct CollabDriver<E, C> {
    client: CollabClient<E, C>,
    connection_id: Uuid,
    channel_events: mpsc::Receiver<ChannelEvent>,
    engine_events: mpsc::Receiver<EngineEvent>,
    pointer: mpsc::Receiver<Point>,
    cancel: CancellationToken,
}

impl<E: DocumentEngine, C: Channel> CollabDriver<E, C> {
    /// Wrap a client, returning the driver and its input handle
    #[must_use]
    pub fn new(client: CollabClient<E, C>) -> (Self, DriverHandle) {
        let (channel_tx, channel_rx) = mpsc::channel(256);
        let (engine_tx, engine_rx) = mpsc::channel(256);
        let (pointer_tx, pointer_rx) = mpsc::channel(256);
        let cancel = CancellationToken::new();

        let handle = DriverHandle {
            channel_events: channel_tx,
            engine_events: engine_tx,
            pointer: pointer_tx,
            cancel: cancel.clone(),
        };
        let driver = Self {
            client,
            connection_id: Uuid::new_v4(),
            channel_events: channel_rx,
            engine_events: engine_rx,
            pointer: pointer_rx,
            cancel,
        };
        (driver, handle)
    }

    /// Run until cancelled or all inputs are gone, then return the client.
    ///
    /// Stopping reverses every registration made at setup: the receivers
    /// and the pending tick are dropped with the driver. Session state is
    /// deliberately kept — it only resets on a session-id change, not on
    /// teardown of the loop ([`CollabClient::shutdown`] clears it for
    /// good).
    pub async fn run(mut self) -> CollabClient<E, C> {
        info!(connection_id = %self.connection_id, "collaboration driver started");
        let mut tick = tokio::time::interval(self.client.config().sweep_interval());
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,

                event = self.channel_events.recv() => match event {
                    Some(ChannelEvent::Connected) => self.client.channel_opened(),
                    Some(ChannelEvent::Message(text)) => {
                        self.client.handle_incoming(&text, clock_now()).await;
                    }
                    Some(ChannelEvent::Disconnected) => self.client.channel_closed(),
                    None => break,
                },

                event = self.engine_events.recv() => match event {
                    Some(event) => self.client.handle_engine_event(event, clock_now()),
                    None => break,
                },

                point = self.pointer.recv() => match point {
                    Some(point) => self.client.pointer_moved(point, clock_now()),
                    None => break,
                },

                _ = tick.tick() => self.client.tick(clock_now()).await,
            }
        }

        info!(connection_id = %self.connection_id, "collaboration driver stopping");
        self.client
    }
}

/// Current instant from the tokio clock, so paused-time tests drive the
/// core's timers consistently
fn clock_now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::test_support::RecordingChannel;
    use crate::engine::OperationContext;
    use crate::protocol::{CollabMessage, MessagePayload, User};
    use crate::testutil::FakeEngine;
    use std::time::Duration;
    use tokio_test::assert_ok;

    fn join_text(user_id: &str) -> String {
        CollabMessage::new(
            user_id,
            Some("session-1".to_string()),
            MessagePayload::Join {
                user: User::new(user_id, "Fox", "#3b82f6"),
                existing_users: Some(vec![]),
            },
        )
        .encode()
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_joins_and_exports_on_tick() {
        let channel = RecordingChannel::new();
        let mut engine = FakeEngine::new();
        engine.snapshot = "<diagram/>".to_string();
        let client = CollabClient::new(engine, channel.clone());

        let (driver, handle) = CollabDriver::new(client);
        let task = tokio::spawn(driver.run());

        handle
            .channel_events
            .send(ChannelEvent::Connected)
            .await
            .unwrap();
        handle
            .channel_events
            .send(ChannelEvent::Message(join_text("user-a")))
            .await
            .unwrap();

        // A replayed edit dirties the document without broadcasting
        handle
            .engine_events
            .send(EngineEvent::OperationExecuted {
                command: "shape.move".into(),
                context: OperationContext::remote(),
            })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(1600)).await;

        handle.shutdown();
        let client = assert_ok!(task.await);

        assert!(client.session().has_joined());
        assert_eq!(client.session().synced_snapshot(), Some("<diagram/>"));
        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("\"type\":\"sync\""));
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_stops_when_inputs_close() {
        let client = CollabClient::new(FakeEngine::new(), RecordingChannel::new());
        let (driver, handle) = CollabDriver::new(client);
        let task = tokio::spawn(driver.run());

        drop(handle);

        let client = task.await.unwrap();
        assert!(!client.session().has_joined());
    }
}
