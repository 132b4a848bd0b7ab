//! Error types for syncboard-collab
//!
//! Every failure in the collaboration core degrades to "log and drop":
//! a bad remote message must never take the session down.

use thiserror::Error;

/// Collaboration error type
#[derive(Debug, Error)]
pub enum Error {
    /// Inbound message failed to parse
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// A portable context referenced an element missing from the registry
    #[error("unresolvable reference in {command}: {field}")]
    UnresolvableReference {
        /// Command the reference belonged to
        command: String,
        /// Context field that failed to resolve
        field: String,
    },

    /// The engine rejected a reconstructed remote operation
    #[error("replay of {command} failed: {source}")]
    ReplayFailed {
        /// Command that was being replayed
        command: String,
        /// Underlying engine error
        #[source]
        source: anyhow::Error,
    },

    /// Snapshot export threw; the next debounce window retries
    #[error("snapshot export failed: {0}")]
    ExportFailed(#[source] anyhow::Error),

    /// Snapshot import threw
    #[error("snapshot import failed: {0}")]
    ImportFailed(#[source] anyhow::Error),

    /// Outbound send attempted while the channel is closed
    #[error("channel closed")]
    ChannelClosed,

    /// Transport-level send failure
    #[error("channel send failed: {0}")]
    ChannelSend(#[source] anyhow::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a malformed message error
    #[must_use]
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedMessage(msg.into())
    }

    /// Create an unresolvable reference error
    #[must_use]
    pub fn unresolvable(command: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnresolvableReference {
            command: command.into(),
            field: field.into(),
        }
    }

    /// Get error code for log labels
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedMessage(_) => "malformed_message",
            Self::UnresolvableReference { .. } => "unresolvable_reference",
            Self::ReplayFailed { .. } => "replay_failed",
            Self::ExportFailed(_) => "export_failed",
            Self::ImportFailed(_) => "import_failed",
            Self::ChannelClosed => "channel_closed",
            Self::ChannelSend(_) => "channel_send_failed",
            Self::Serialization(_) => "serialization_error",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias for collaboration operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = Error::malformed("not json");
        assert_eq!(err.code(), "malformed_message");

        let err = Error::unresolvable("shape.move", "shapeId");
        assert_eq!(err.code(), "unresolvable_reference");
    }

    #[test]
    fn test_error_display() {
        let err = Error::unresolvable("connection.create", "sourceId");
        let msg = err.to_string();
        assert!(msg.contains("connection.create"));
        assert!(msg.contains("sourceId"));
    }

    #[test]
    fn test_from_serde_error() {
        let result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        let err: Error = result.unwrap_err().into();
        assert_eq!(err.code(), "serialization_error");
    }
}
