//! Collaboration configuration
//!
//! Tunables for the timers and the housekeeping-command set. All values
//! have working defaults; hosts typically deserialize this from their own
//! config file section:
//!
//! ```toml
//! [collab]
//! cursor_throttle_ms = 50
//! export_debounce_ms = 500
//! cursor_stale_ms = 3000
//! sweep_interval_ms = 1000
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a collaboration client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollabConfig {
    /// Minimum interval between outbound cursor samples (ms)
    pub cursor_throttle_ms: u64,

    /// Trailing silence before a full snapshot export fires (ms)
    pub export_debounce_ms: u64,

    /// Idle time after which a remote cursor is cleared (ms)
    pub cursor_stale_ms: u64,

    /// Period of the staleness sweep tick (ms)
    pub sweep_interval_ms: u64,

    /// Commands recomputed on every replica and therefore never broadcast
    pub housekeeping_commands: Vec<String>,
}

impl Default for CollabConfig {
    fn default() -> Self {
        Self {
            cursor_throttle_ms: 50,
            export_debounce_ms: 500,
            cursor_stale_ms: 3000,
            sweep_interval_ms: 1000,
            housekeeping_commands: vec!["refs.update".to_string(), "ordering.update".to_string()],
        }
    }
}

impl CollabConfig {
    /// Cursor throttle as a `Duration`
    #[must_use]
    pub fn cursor_throttle(&self) -> Duration {
        Duration::from_millis(self.cursor_throttle_ms)
    }

    /// Export debounce as a `Duration`
    #[must_use]
    pub fn export_debounce(&self) -> Duration {
        Duration::from_millis(self.export_debounce_ms)
    }

    /// Cursor staleness threshold as a `Duration`
    #[must_use]
    pub fn cursor_stale(&self) -> Duration {
        Duration::from_millis(self.cursor_stale_ms)
    }

    /// Sweep interval as a `Duration`
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Check whether a command is internal housekeeping
    #[must_use]
    pub fn is_housekeeping(&self, command: &str) -> bool {
        self.housekeeping_commands.iter().any(|c| c == command)
    }
}
