use serde::{Deserialize, Serialize};

/// What the dispatcher does when a client's buffer is full.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Skip the item for that client only.
    #[default]
    DropMessage,
    /// Deregister the client and close its channel.
    Disconnect,
}

/// Configuration for a [`Hub`](crate::Hub).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Capacity of each client's delivery channel.
    pub client_buffer: usize,
    pub overflow: OverflowPolicy,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            client_buffer: 256,
            overflow: OverflowPolicy::default(),
        }
    }
}

impl HubConfig {
    /// Channel capacity actually used; tokio channels need at least one slot.
    pub fn effective_buffer(&self) -> usize {
        self.client_buffer.max(1)
    }
}
