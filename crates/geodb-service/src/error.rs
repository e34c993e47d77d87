use geodb_kv::KvError;
use geodb_types::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("failed to decode object {key}: {source}")]
    Decode { key: String, source: TypeError },

    #[error("invalid object: {0}")]
    Invalid(#[from] TypeError),

    #[error("storage error: {0}")]
    Storage(#[from] KvError),

    #[error("stream closed for client {client_id}")]
    StreamClosed { client_id: String },
}

pub type ServiceResult<T> = Result<T, ServiceError>;
