use geodb_service::GeoDb;
use tokio_util::sync::CancellationToken;

/// Shared handler state.
#[derive(Clone, Debug)]
pub struct AppState {
    pub db: GeoDb,
    /// Messages buffered per server-sent event connection.
    pub sse_buffer: usize,
    /// Cancelled on shutdown; every open stream runs on a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(db: GeoDb, sse_buffer: usize, shutdown: CancellationToken) -> Self {
        Self {
            db,
            sse_buffer: sse_buffer.max(1),
            shutdown,
        }
    }
}
