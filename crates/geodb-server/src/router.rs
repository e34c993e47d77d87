use axum::routing::{get, post};
use axum::Router;
use geodb_protocol::endpoints;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;
use crate::stream;

/// Build the axum router with all GeoDB endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(endpoints::HEALTH, get(handler::health_handler))
        .route(endpoints::PING, get(handler::ping_handler))
        .route(endpoints::SET, post(handler::set_handler))
        .route(endpoints::GET, post(handler::get_handler))
        .route(endpoints::KEYS, get(handler::keys_handler))
        .route(endpoints::SEEK, post(handler::seek_handler))
        .route(endpoints::REGEX, post(handler::regex_handler))
        .route(endpoints::DELETE, post(handler::delete_handler))
        .route(endpoints::STREAM_OBJECTS, get(stream::stream_objects_handler))
        .route(endpoints::STREAM_EVENTS, get(stream::stream_events_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
