//! Collaboration client
//!
//! Per-connection facade wiring the extractor, replayer, presence tracker
//! and session state to one Document Engine and one Channel. All entry
//! points are event-driven and take an explicit `Instant`, keeping the
//! core deterministic; the `driver` module adapts them to tokio.

use std::time::Instant;
use tracing::{debug, warn};

use crate::channel::Channel;
use crate::config::CollabConfig;
use crate::engine::{DocumentEngine, EngineEvent, Point};
use crate::error::Error;
use crate::extract::OperationExtractor;
use crate::presence::{CursorMarker, LockOverlay, PresenceTracker};
use crate::protocol::{CollabMessage, MessagePayload};
use crate::replay::OperationReplayer;
use crate::session::SessionState;

/// One collaboration session over one engine and one channel
pub struct CollabClient<E, C> {
    engine: E,
    channel: C,
    config: CollabConfig,
    session: SessionState,
    extractor: OperationExtractor,
    replayer: OperationReplayer,
    presence: PresenceTracker,
}

impl<E: DocumentEngine, C: Channel> CollabClient<E, C> {
    /// Create a client with default tunables
    #[must_use]
    pub fn new(engine: E, channel: C) -> Self {
        Self::with_config(engine, channel, CollabConfig::default())
    }

    /// Create a client with explicit tunables
    #[must_use]
    pub fn with_config(engine: E, channel: C, config: CollabConfig) -> Self {
        let extractor = OperationExtractor::new(config.clone());
        let presence = PresenceTracker::new(&config);
        Self {
            engine,
            channel,
            config,
            session: SessionState::new(),
            extractor,
            replayer: OperationReplayer::new(),
            presence,
        }
    }

    /// Session state (read-only)
    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// The active tunables
    #[must_use]
    pub fn config(&self) -> &CollabConfig {
        &self.config
    }

    /// The wrapped engine
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Mutable access to the wrapped engine
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// The transport started connecting, optionally to a known session
    pub fn connect(&mut self, session_id: Option<&str>) {
        if let Some(id) = session_id {
            self.session.ensure_session(id);
        }
        self.session.mark_connecting();
    }

    /// The transport opened
    pub fn channel_opened(&mut self) {
        self.session.mark_open();
    }

    /// The transport dropped; the channel owns reconnection, state is kept
    pub fn channel_closed(&mut self) {
        self.session.mark_closed();
    }

    /// Classify and dispatch one inbound wire message.
    ///
    /// Malformed messages are logged and dropped; no inbound message can
    /// fail the session.
    pub async fn handle_incoming(&mut self, text: &str, now: Instant) {
        let message = match CollabMessage::decode(text) {
            Ok(message) => message,
            Err(err) => {
                warn!(code = err.code(), error = %err, "dropping inbound message");
                return;
            }
        };

        // Defensive self-filter, independent of transport echo handling.
        // Join is exempt: the own-join response is how identity arrives.
        let is_join = matches!(message.payload, MessagePayload::Join { .. });
        if !is_join && self.session.is_self(&message.user_id) {
            debug!(user_id = %message.user_id, "ignoring own echo");
            return;
        }

        match message.payload {
            MessagePayload::Join {
                user,
                existing_users,
            } => {
                // The own-join response also carries the canonical session id
                if let Some(session_id) = message.session_id.as_deref() {
                    self.session.ensure_session(session_id);
                }
                self.session
                    .handle_join(&message.user_id, user, existing_users);
            }
            MessagePayload::Leave {} => self.session.handle_leave(&message.user_id),
            MessagePayload::Lock { element_id } => {
                self.session.handle_lock(&message.user_id, &element_id);
            }
            MessagePayload::Unlock { element_id } => self.session.handle_unlock(&element_id),
            MessagePayload::Cursor { x, y } => {
                self.session.handle_cursor(&message.user_id, x, y, now);
            }
            MessagePayload::Sync { xml } => self.handle_sync(xml).await,
            MessagePayload::Command { command, context } => {
                self.replayer.replay(&mut self.engine, &command, context);
            }
        }
    }

    /// Accept a canonical snapshot, reloading the engine only when it
    /// differs by value from the current canonical export
    async fn handle_sync(&mut self, xml: String) {
        if self.session.synced_snapshot() == Some(xml.as_str()) {
            return;
        }

        let current = match self.engine.export_snapshot().await {
            Ok(current) => Some(current),
            Err(err) => {
                debug!(error = %err, "export for sync comparison failed");
                None
            }
        };

        if current.as_deref() != Some(xml.as_str()) {
            if let Err(err) = self.engine.import_snapshot(&xml).await {
                warn!(code = Error::ImportFailed(err).code(), "snapshot import failed");
                return;
            }
        }
        self.session.set_synced_snapshot(xml);
    }

    /// Feed one Document Engine event through the extractor and presence
    /// tracker, broadcasting whatever falls out
    pub fn handle_engine_event(&mut self, event: EngineEvent, now: Instant) {
        match event {
            EngineEvent::OperationExecuted { command, context }
            | EngineEvent::OperationReverted { command, context } => {
                if let Some(payload) = self.extractor.on_operation(&command, &context, now) {
                    self.send(payload);
                }
            }
            EngineEvent::SelectionChanged { selection } => {
                // Elements locked by a peer cannot be locked here until the
                // holder unlocks or leaves
                let selection: Vec<String> = selection
                    .into_iter()
                    .filter(|id| !self.session.is_locked(id))
                    .collect();
                for payload in self.extractor.on_selection_changed(&selection) {
                    self.send(payload);
                }
            }
            EngineEvent::ViewTransformChanged(view) => self.presence.set_view(view),
        }
    }

    /// Sample a local pointer move (screen coordinates)
    pub fn pointer_moved(&mut self, screen: Point, now: Instant) {
        if let Some(payload) = self.presence.pointer_moved(screen, now) {
            self.send(payload);
        }
    }

    /// Periodic maintenance: fire a due snapshot export and sweep stale
    /// cursors. Driven by the 1 s interval tick (or called directly in
    /// tests).
    pub async fn tick(&mut self, now: Instant) {
        self.session
            .sweep_stale_cursors(now, self.config.cursor_stale());

        if self.extractor.export_due(now) {
            match self.engine.export_snapshot().await {
                Ok(xml) => {
                    if self.session.synced_snapshot() != Some(xml.as_str()) {
                        self.session.set_synced_snapshot(xml.clone());
                        self.send(MessagePayload::Sync { xml });
                    }
                }
                Err(err) => {
                    // retried on the next operation-log event
                    warn!(code = Error::ExportFailed(err).code(), "snapshot export skipped");
                }
            }
        }
    }

    /// Remote cursor markers under the current local view transform
    #[must_use]
    pub fn cursor_markers(&self) -> Vec<CursorMarker> {
        self.presence.cursor_markers(&self.session)
    }

    /// Lock overlays under the current local view transform
    #[must_use]
    pub fn lock_overlays(&self) -> Vec<LockOverlay> {
        self.presence.lock_overlays(&self.session, &self.engine)
    }

    /// Tear the session down: pending timers are disarmed and all
    /// per-session state is cleared
    pub fn shutdown(&mut self) {
        self.extractor.reset();
        self.presence.reset();
        self.session.reset();
    }

    /// Wrap a payload in the envelope and push it out, gated on a
    /// confirmed identity and an open channel
    fn send(&mut self, payload: MessagePayload) {
        if !self.session.can_send() {
            debug!(kind = payload.kind(), "outbound gated until joined");
            return;
        }
        if !self.channel.is_open() {
            debug!(
                kind = payload.kind(),
                code = Error::ChannelClosed.code(),
                "dropping outbound"
            );
            return;
        }

        let user_id = match self.session.current_user() {
            Some(user) => user.id.clone(),
            None => return,
        };
        let message = CollabMessage::new(
            user_id,
            self.session.session_id().map(str::to_string),
            payload,
        );

        match message.encode() {
            Ok(text) => {
                if let Err(err) = self.channel.send(&text) {
                    let err = Error::ChannelSend(err);
                    warn!(code = err.code(), error = %err, "channel send failed");
                }
            }
            Err(err) => warn!(code = err.code(), "failed to encode outbound message"),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
