/// HTTP endpoint paths for the GeoDB protocol.
pub mod endpoints {
    pub const PING: &str = "/v1/ping";
    pub const SET: &str = "/v1/set";
    pub const GET: &str = "/v1/get";
    pub const KEYS: &str = "/v1/keys";
    pub const SEEK: &str = "/v1/seek";
    pub const REGEX: &str = "/v1/regex";
    pub const DELETE: &str = "/v1/delete";
    pub const STREAM_OBJECTS: &str = "/v1/stream/objects";
    pub const STREAM_EVENTS: &str = "/v1/stream/events";
    pub const HEALTH: &str = "/v1/health";
}

/// Server-sent event names used on the stream endpoints.
pub mod sse_events {
    pub const OBJECT: &str = "object";
    pub const EVENT: &str = "event";
}

/// Health check response.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub protocol_version: u32,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            protocol_version: super::message::PROTOCOL_VERSION,
        }
    }
}
