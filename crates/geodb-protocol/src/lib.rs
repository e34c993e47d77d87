//! Wire protocol for GeoDB.
//!
//! Defines the JSON request/response bodies of the unary operations, the
//! payloads carried by the object and event streams, and the HTTP paths
//! they are served on.

pub mod endpoint;
pub mod error;
pub mod message;

pub use endpoint::{endpoints, sse_events, HealthResponse};
pub use error::{ErrorCode, ErrorResponse, ProtocolError, ProtocolResult};
pub use message::{
    DeleteRequest, DeleteResponse, EventMessage, GetRegexRequest, GetRegexResponse, GetRequest,
    GetResponse, KeysResponse, ObjectMessage, PingResponse, SeekRequest, SeekResponse, SetRequest,
    SetResponse, StreamQuery, PROTOCOL_VERSION, to_json,
};
