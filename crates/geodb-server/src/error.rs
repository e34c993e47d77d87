use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use geodb_protocol::{ErrorCode, ErrorResponse};
use geodb_service::ServiceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("storage error: {0}")]
    Storage(#[from] geodb_kv::KvError),

    #[error("hub error: {0}")]
    Hub(#[from] geodb_hub::HubError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl ServerError {
    pub fn status(&self) -> (StatusCode, ErrorCode) {
        match self {
            Self::Service(ServiceError::NotFound(_)) => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
            Self::Service(ServiceError::InvalidPattern(_)) => {
                (StatusCode::BAD_REQUEST, ErrorCode::InvalidPattern)
            }
            Self::Service(ServiceError::Invalid(_)) | Self::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadRequest)
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(ErrorResponse::new(code, self.to_string()))).into_response()
    }
}
