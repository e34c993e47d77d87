//! Server-sent event transport for the object and event streams.
//!
//! Each connection runs a gateway loop on a spawned task that writes into a
//! bounded channel; the response body reads from it. The body owns a drop
//! guard, so a client disconnect cancels the loop and deregisters the
//! subscriber.

use std::convert::Infallible;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::stream::{BoxStream, StreamExt};
use geodb_protocol::{sse_events, to_json, EventMessage, ObjectMessage, StreamQuery};
use geodb_service::{Event, Object, StreamRequest};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::DropGuard;
use tracing::{debug, warn};

use crate::error::ServerResult;
use crate::state::AppState;

pub type SseResponse = Sse<BoxStream<'static, Result<SseEvent, Infallible>>>;

pub async fn stream_objects_handler(
    State(state): State<AppState>,
    query: Result<Query<StreamQuery>, QueryRejection>,
) -> ServerResult<SseResponse> {
    let request = stream_request(query?);
    request.filter()?;

    let (mut tx, rx) = mpsc::channel::<Object>(state.sse_buffer);
    let cancel = state.shutdown.child_token();
    let token = cancel.clone();
    let db = state.db.clone();
    tokio::spawn(async move {
        match db.stream_objects(request, &mut tx, token).await {
            Ok(()) => debug!("object stream finished"),
            Err(e) => warn!(error = %e, "object stream ended"),
        }
    });

    Ok(into_sse(rx, cancel.drop_guard(), |object| {
        render(sse_events::OBJECT, &ObjectMessage::from(object))
    }))
}

pub async fn stream_events_handler(
    State(state): State<AppState>,
    query: Result<Query<StreamQuery>, QueryRejection>,
) -> ServerResult<SseResponse> {
    let request = stream_request(query?);
    request.filter()?;

    let (mut tx, rx) = mpsc::channel::<Event>(state.sse_buffer);
    let cancel = state.shutdown.child_token();
    let token = cancel.clone();
    let db = state.db.clone();
    tokio::spawn(async move {
        match db.stream_events(request, &mut tx, token).await {
            Ok(()) => debug!("event stream finished"),
            Err(e) => warn!(error = %e, "event stream ended"),
        }
    });

    Ok(into_sse(rx, cancel.drop_guard(), |event| {
        render(sse_events::EVENT, &EventMessage::from(event))
    }))
}

fn stream_request(Query(query): Query<StreamQuery>) -> StreamRequest {
    StreamRequest {
        client_id: query.client_id,
        regex: query.regex,
    }
}

fn into_sse<M: Send + 'static>(
    rx: mpsc::Receiver<M>,
    guard: DropGuard,
    render: fn(M) -> SseEvent,
) -> SseResponse {
    let stream = ReceiverStream::new(rx)
        .map(move |message| {
            let _guard = &guard;
            Ok::<_, Infallible>(render(message))
        })
        .boxed();
    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn render<T: Serialize>(name: &'static str, message: &T) -> SseEvent {
    match to_json(message) {
        Ok(data) => SseEvent::default().event(name).data(data),
        Err(e) => SseEvent::default().comment(format!("serialization error: {e}")),
    }
}
