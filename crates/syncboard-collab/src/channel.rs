//! Channel collaborator interface
//!
//! The transport (including its reconnect/backoff policy) lives outside
//! this core. The core only needs to push serialized messages out and know
//! whether the channel is currently open; inbound text and connectivity
//! changes are delivered to the client by the driver.

/// Outbound side of the collaboration transport
pub trait Channel: Send {
    /// Send one serialized message
    fn send(&self, text: &str) -> anyhow::Result<()>;

    /// Whether the transport is currently connected
    fn is_open(&self) -> bool;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Channel double that records every send
    #[derive(Clone, Default)]
    pub struct RecordingChannel {
        sent: Arc<Mutex<Vec<String>>>,
        open: Arc<Mutex<bool>>,
    }

    impl RecordingChannel {
        pub fn new() -> Self {
            Self {
                sent: Arc::new(Mutex::new(Vec::new())),
                open: Arc::new(Mutex::new(true)),
            }
        }

        pub fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        pub fn clear(&self) {
            self.sent.lock().unwrap().clear();
        }

        pub fn set_open(&self, open: bool) {
            *self.open.lock().unwrap() = open;
        }
    }

    impl Channel for RecordingChannel {
        fn send(&self, text: &str) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn is_open(&self) -> bool {
            *self.open.lock().unwrap()
        }
    }
}
