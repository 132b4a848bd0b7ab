//! Wire Protocol Messages
//!
//! One JSON object per message, camelCase keys. Every message shares the
//! same envelope: a `type` tag, the sender's `userId`, an optional
//! `sessionId` and `timestamp`, and a type-specific `payload`.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A collaboration participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable user id
    pub id: String,
    /// Display name
    pub name: String,
    /// Presence color (CSS hex)
    pub color: String,
}

impl User {
    /// Create a user
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: color.into(),
        }
    }
}

/// Type-specific payload, tagged by the envelope `type` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum MessagePayload {
    /// A user joined the session
    Join {
        /// The joining user
        user: User,
        /// Roster snapshot; present only in the response delivered to the
        /// joining client
        #[serde(skip_serializing_if = "Option::is_none")]
        existing_users: Option<Vec<User>>,
    },

    /// A user left; the envelope `userId` identifies the departing user
    Leave {},

    /// Full-document canonical snapshot
    Sync {
        /// Snapshot text
        xml: String,
    },

    /// Advisory lock taken on an element
    Lock {
        /// Locked element id
        element_id: String,
    },

    /// Advisory lock released
    Unlock {
        /// Unlocked element id
        element_id: String,
    },

    /// Pointer position in document coordinate space
    Cursor {
        /// Document-space x
        x: f64,
        /// Document-space y
        y: f64,
    },

    /// A portable operation
    Command {
        /// Command name, e.g. `shape.move`
        command: String,
        /// Portable context: identifiers and primitives only
        context: serde_json::Map<String, serde_json::Value>,
    },
}

impl MessagePayload {
    /// The envelope `type` tag for this payload
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Leave {} => "leave",
            Self::Sync { .. } => "sync",
            Self::Lock { .. } => "lock",
            Self::Unlock { .. } => "unlock",
            Self::Cursor { .. } => "cursor",
            Self::Command { .. } => "command",
        }
    }
}

/// The shared message envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollabMessage {
    /// Tagged payload (`type` + `payload` on the wire)
    #[serde(flatten)]
    pub payload: MessagePayload,

    /// Originating user
    pub user_id: String,

    /// Session this message belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Send time, unix milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl CollabMessage {
    /// Create a message stamped with the current time
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        session_id: Option<String>,
        payload: MessagePayload,
    ) -> Self {
        Self {
            payload,
            user_id: user_id.into(),
            session_id,
            timestamp: Some(Utc::now().timestamp_millis()),
        }
    }

    /// Serialize to wire text
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from wire text
    pub fn decode(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::malformed(e.to_string()))
    }
}
