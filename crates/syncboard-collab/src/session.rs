//! Session State Machine
//!
//! Central per-connection state: identity, roster, advisory locks and the
//! synced snapshot. Classifies every inbound presence message, gates
//! outbound sends on a confirmed identity, and defensively filters the
//! local user's own messages regardless of transport-side echo handling.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::protocol::User;

/// Connection lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport
    Disconnected,
    /// Transport connecting (or reconnecting)
    Connecting,
    /// Transport open, own join not yet confirmed
    Joining,
    /// Identity confirmed; outbound sends allowed
    Joined,
}

/// Last known pointer position of a remote user
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorState {
    /// Document-space x
    pub x: f64,
    /// Document-space y
    pub y: f64,
    /// When the position was last refreshed
    pub last_update: Instant,
}

/// A participant other than the local user
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteUser {
    /// Identity, name and color
    pub user: User,
    /// Live cursor, cleared after the staleness threshold
    pub cursor: Option<CursorState>,
}

/// An advisory lock held by a remote user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedElement {
    /// Locked element id
    pub element_id: String,
    /// Lock owner
    pub user_id: String,
    /// Owner display name (for the lock badge)
    pub user_name: String,
    /// Owner color
    pub user_color: String,
}

/// Per-connection collaboration state
pub struct SessionState {
    current_user: Option<User>,
    remote_users: HashMap<String, RemoteUser>,
    locked_elements: HashMap<String, LockedElement>,
    session_id: Option<String>,
    synced_snapshot: Option<String>,
    has_joined: bool,
    connection: ConnectionState,
}

impl SessionState {
    /// Create state for a fresh connection
    #[must_use]
    pub fn new() -> Self {
        Self {
            current_user: None,
            remote_users: HashMap::new(),
            locked_elements: HashMap::new(),
            session_id: None,
            synced_snapshot: None,
            has_joined: false,
            connection: ConnectionState::Disconnected,
        }
    }

    /// The confirmed local identity, if joined
    #[must_use]
    pub fn current_user(&self) -> Option<&User> {
        self.current_user.as_ref()
    }

    /// The roster of remote users
    #[must_use]
    pub fn remote_users(&self) -> &HashMap<String, RemoteUser> {
        &self.remote_users
    }

    /// Elements currently locked by remote users
    #[must_use]
    pub fn locked_elements(&self) -> &HashMap<String, LockedElement> {
        &self.locked_elements
    }

    /// The active session id
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// The last accepted canonical snapshot
    #[must_use]
    pub fn synced_snapshot(&self) -> Option<&str> {
        self.synced_snapshot.as_deref()
    }

    /// Whether the own join has been confirmed
    #[must_use]
    pub fn has_joined(&self) -> bool {
        self.has_joined
    }

    /// Current connection state
    #[must_use]
    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// No message is sent before the own identity is confirmed
    #[must_use]
    pub fn can_send(&self) -> bool {
        self.has_joined && self.connection == ConnectionState::Joined
    }

    /// Whether an inbound message originated from the local user
    #[must_use]
    pub fn is_self(&self, user_id: &str) -> bool {
        self.current_user
            .as_ref()
            .is_some_and(|u| u.id == user_id)
    }

    /// Transport started connecting
    pub fn mark_connecting(&mut self) {
        self.connection = ConnectionState::Connecting;
    }

    /// Transport opened; waiting for the own join confirmation
    pub fn mark_open(&mut self) {
        self.connection = if self.has_joined {
            ConnectionState::Joined
        } else {
            ConnectionState::Joining
        };
    }

    /// Transport lost. Identity and roster are retained: they only reset
    /// when the session id changes, not across a reconnect to the same
    /// session.
    pub fn mark_closed(&mut self) {
        self.connection = ConnectionState::Connecting;
    }

    /// Adopt a session id, resetting state if it differs from the current
    /// one. Reconnecting to the same id preserves identity and roster.
    pub fn ensure_session(&mut self, session_id: &str) {
        if self.session_id.as_deref() == Some(session_id) {
            return;
        }
        if self.session_id.is_some() {
            info!(session_id, "session changed, resetting state");
            self.reset();
        }
        self.session_id = Some(session_id.to_string());
    }

    /// Clear identity, roster and locks (session change or teardown)
    pub fn reset(&mut self) {
        self.current_user = None;
        self.remote_users.clear();
        self.locked_elements.clear();
        self.synced_snapshot = None;
        self.has_joined = false;
        self.session_id = None;
    }

    /// Handle a join message.
    ///
    /// The first identity message after connecting that either carries a
    /// roster snapshot or does not match an already-known self is this
    /// client's own join: it establishes `current_user` and seeds the
    /// roster. Any later join for a different id is a peer arrival,
    /// appended idempotently.
    pub fn handle_join(
        &mut self,
        user_id: &str,
        mut user: User,
        existing_users: Option<Vec<User>>,
    ) {
        // The envelope userId is the source of truth for the identity
        if user.id != user_id {
            user.id = user_id.to_string();
        }

        let is_own_join = existing_users.is_some()
            || self.current_user.is_none()
            || self.is_self(user_id);

        if is_own_join {
            info!(user_id, "join confirmed");
            self.has_joined = true;
            self.connection = ConnectionState::Joined;

            self.remote_users.clear();
            for existing in existing_users.unwrap_or_default() {
                if existing.id != user.id {
                    self.remote_users.insert(
                        existing.id.clone(),
                        RemoteUser {
                            user: existing,
                            cursor: None,
                        },
                    );
                }
            }
            self.current_user = Some(user);
            return;
        }

        // Peer arrival; duplicate ids are ignored
        if !self.remote_users.contains_key(user_id) {
            debug!(user_id, "peer joined");
            self.remote_users.insert(
                user_id.to_string(),
                RemoteUser { user, cursor: None },
            );
        }
    }

    /// Handle a leave: drop the roster entry and every lock the user held
    pub fn handle_leave(&mut self, user_id: &str) {
        debug!(user_id, "peer left");
        self.remote_users.remove(user_id);
        self.locked_elements.retain(|_, lock| lock.user_id != user_id);
    }

    /// Handle a lock taken by a remote user.
    ///
    /// The lock badge needs the owner's name and color, so locks from
    /// users missing from the roster are ignored; the local user's own
    /// echo is ignored as well.
    pub fn handle_lock(&mut self, user_id: &str, element_id: &str) {
        if self.is_self(user_id) {
            return;
        }
        // First owner wins until they unlock or leave
        if let Some(existing) = self.locked_elements.get(element_id) {
            if existing.user_id != user_id {
                debug!(user_id, element_id, holder = %existing.user_id, "element already locked");
                return;
            }
        }
        let Some(owner) = self.remote_users.get(user_id) else {
            debug!(user_id, element_id, "lock from unknown user ignored");
            return;
        };
        self.locked_elements.insert(
            element_id.to_string(),
            LockedElement {
                element_id: element_id.to_string(),
                user_id: user_id.to_string(),
                user_name: owner.user.name.clone(),
                user_color: owner.user.color.clone(),
            },
        );
    }

    /// Handle an unlock
    pub fn handle_unlock(&mut self, element_id: &str) {
        self.locked_elements.remove(element_id);
    }

    /// Check whether an element is locked by a remote user
    #[must_use]
    pub fn is_locked(&self, element_id: &str) -> bool {
        self.locked_elements.contains_key(element_id)
    }

    /// Handle a cursor update. Unknown users do not get roster entries
    /// created on their behalf.
    pub fn handle_cursor(&mut self, user_id: &str, x: f64, y: f64, now: Instant) {
        if self.is_self(user_id) {
            return;
        }
        if let Some(remote) = self.remote_users.get_mut(user_id) {
            remote.cursor = Some(CursorState {
                x,
                y,
                last_update: now,
            });
        }
    }

    /// Record an accepted canonical snapshot
    pub fn set_synced_snapshot(&mut self, snapshot: impl Into<String>) {
        self.synced_snapshot = Some(snapshot.into());
    }

    /// Clear cursors idle longer than `threshold`; the roster entries
    /// remain. Returns the ids whose cursor was cleared.
    pub fn sweep_stale_cursors(&mut self, now: Instant, threshold: Duration) -> Vec<String> {
        let mut cleared = Vec::new();
        for (user_id, remote) in &mut self.remote_users {
            if let Some(cursor) = remote.cursor {
                if now.duration_since(cursor.last_update) > threshold {
                    remote.cursor = None;
                    cleared.push(user_id.clone());
                }
            }
        }
        cleared
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
