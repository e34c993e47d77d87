use std::collections::BTreeMap;

use geodb_types::{Event, Object};
use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResponse {
    pub ok: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SetRequest {
    pub objects: BTreeMap<String, Object>,
}

/// Writes are fire-and-forget per key; nothing is reported back.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetResponse {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRequest {
    pub keys: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GetResponse {
    pub objects: BTreeMap<String, Object>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysResponse {
    pub keys: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekRequest {
    pub prefix: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SeekResponse {
    pub objects: BTreeMap<String, Object>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRegexRequest {
    pub regex: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GetRegexResponse {
    pub objects: BTreeMap<String, Object>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub keys: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {}

/// Query string of the two stream endpoints.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub regex: Option<String>,
}

/// Payload of one `object` stream message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectMessage {
    pub object: Object,
}

/// Payload of one `event` stream message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub event: Event,
}

impl From<Object> for ObjectMessage {
    fn from(object: Object) -> Self {
        Self { object }
    }
}

impl From<Event> for EventMessage {
    fn from(event: Event) -> Self {
        Self { event }
    }
}

/// Render any protocol message as JSON.
pub fn to_json<T: Serialize>(message: &T) -> ProtocolResult<String> {
    serde_json::to_string(message).map_err(|e| ProtocolError::Serialization(e.to_string()))
}
