//! Syncboard Collab - Real-Time Collaboration Core
//!
//! This crate provides the collaboration core for Syncboard:
//! - Extract: portable operation messages from local diagram edits
//! - Replay: deterministic re-execution of remote operations
//! - Presence: remote cursors, roster and advisory element locks
//! - Session: per-connection state machine and message dispatch
//! - Driver: tokio event loop gluing the core to engine and transport
//!
//! ## Features
//!
//! - Live element references serialized to stable identifiers and
//!   reconstructed against a possibly-stale registry
//! - Replayed operations tagged so they are never re-broadcast
//! - Advisory per-element locks driven by local selection
//! - Throttled, viewport-independent cursor sharing
//! - Debounced full-snapshot export for late joiners
//!
//! ## Usage
//!
//! ```ignore
//! use syncboard_collab::{CollabClient, CollabDriver, ChannelEvent};
//!
//! // Engine and channel are host-provided trait implementations
//! let client = CollabClient::new(engine, channel);
//! let (driver, handle) = CollabDriver::new(client);
//! tokio::spawn(driver.run());
//!
//! // Wire the transport into the driver
//! handle.channel_events.send(ChannelEvent::Connected).await?;
//! ```
//!
//! The core is single-threaded and event-driven: all session and document
//! mutation happens on the driver task, so no locking is required.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod channel;
pub mod client;
pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod extract;
pub mod presence;
pub mod protocol;
pub mod replay;
pub mod session;
pub mod timing;

#[cfg(test)]
mod testutil;

// Re-export main types
pub use channel::Channel;
pub use client::CollabClient;
pub use config::CollabConfig;
pub use driver::{ChannelEvent, CollabDriver, DriverHandle};
pub use engine::{
    Bounds, ContextValue, DocumentEngine, Element, EngineEvent, OperationContext,
    OperationSource, Point, ViewTransform,
};
pub use error::{Error, Result};
pub use extract::OperationExtractor;
pub use presence::{CursorMarker, LockOverlay, PresenceTracker};
pub use protocol::{CollabMessage, MessagePayload, User};
pub use replay::{OperationReplayer, RemoteCommand, ReplayOutcome};
pub use session::{ConnectionState, LockedElement, RemoteUser, SessionState};
