use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Json;
use geodb_protocol::{
    DeleteRequest, DeleteResponse, GetRegexRequest, GetRegexResponse, GetRequest, GetResponse,
    HealthResponse, KeysResponse, PingResponse, SeekRequest, SeekResponse, SetRequest,
    SetResponse,
};
use tracing::debug;

use crate::error::ServerResult;
use crate::state::AppState;

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

pub async fn ping_handler(State(state): State<AppState>) -> Json<PingResponse> {
    Json(PingResponse {
        ok: state.db.ping(),
    })
}

/// Per-key failures are logged by the store and not reported to the caller.
pub async fn set_handler(
    State(state): State<AppState>,
    payload: Result<Json<SetRequest>, JsonRejection>,
) -> ServerResult<Json<SetResponse>> {
    let Json(request) = payload?;
    let report = state.db.set(request.objects).await;
    debug!(
        written = report.written,
        failed = report.failed,
        events = report.events,
        "set handled"
    );
    Ok(Json(SetResponse {}))
}

pub async fn get_handler(
    State(state): State<AppState>,
    payload: Result<Json<GetRequest>, JsonRejection>,
) -> ServerResult<Json<GetResponse>> {
    let Json(request) = payload?;
    let objects = state.db.get(&request.keys)?;
    Ok(Json(GetResponse { objects }))
}

pub async fn keys_handler(State(state): State<AppState>) -> ServerResult<Json<KeysResponse>> {
    Ok(Json(KeysResponse {
        keys: state.db.keys()?,
    }))
}

pub async fn seek_handler(
    State(state): State<AppState>,
    payload: Result<Json<SeekRequest>, JsonRejection>,
) -> ServerResult<Json<SeekResponse>> {
    let Json(request) = payload?;
    let objects = state.db.seek(&request.prefix)?;
    Ok(Json(SeekResponse { objects }))
}

pub async fn regex_handler(
    State(state): State<AppState>,
    payload: Result<Json<GetRegexRequest>, JsonRejection>,
) -> ServerResult<Json<GetRegexResponse>> {
    let Json(request) = payload?;
    let objects = state.db.get_regex(&request.regex)?;
    Ok(Json(GetRegexResponse { objects }))
}

pub async fn delete_handler(
    State(state): State<AppState>,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> ServerResult<Json<DeleteResponse>> {
    let Json(request) = payload?;
    state.db.delete(&request.keys)?;
    Ok(Json(DeleteResponse {}))
}
