/// Errors produced by the broadcast hub.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HubError {
    /// No client is registered under this ID.
    #[error("{topic} client not found: {client_id}")]
    ClientNotFound {
        topic: &'static str,
        client_id: String,
    },

    /// The client's delivery channel was already handed out.
    #[error("{topic} stream for client {client_id} already taken")]
    StreamTaken {
        topic: &'static str,
        client_id: String,
    },

    /// Dispatch loops can only be started once per hub.
    #[error("hub dispatch already started")]
    AlreadyStarted,
}

/// Convenience alias used throughout the hub crate.
pub type HubResult<T> = Result<T, HubError>;
