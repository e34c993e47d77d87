use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use geodb_hub::{DispatchHandle, Hub};
use geodb_kv::MemoryEngine;
use geodb_service::GeoDb;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::router::build_router;
use crate::state::AppState;

/// GeoDB HTTP server.
pub struct GeoDbServer {
    config: ServerConfig,
}

impl GeoDbServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open the engine, start the hub's dispatch loops on `shutdown`, and
    /// assemble the handler state.
    pub fn open(&self, shutdown: &CancellationToken) -> ServerResult<(AppState, DispatchHandle)> {
        let engine = MemoryEngine::open(&self.config.engine_config())?;
        let hub = Arc::new(Hub::with_config(self.config.hub.clone()));
        let dispatch = hub.start(shutdown.clone())?;
        let db = GeoDb::with_config(engine, hub, self.config.db.clone());
        let state = AppState::new(db, self.config.sse_buffer, shutdown.clone());
        Ok((state, dispatch))
    }

    /// Serve until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        self.serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve until `signal` resolves, then close open streams, stop the
    /// background tasks, and compact the commit log.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shutdown = CancellationToken::new();
        let (state, dispatch) = self.open(&shutdown)?;
        let db = state.db.clone();
        let purge = spawn_purge(db.clone(), self.config.purge_interval_secs, shutdown.clone());

        let listener = TcpListener::bind(self.config.bind_addr).await?;
        info!(
            addr = %self.config.bind_addr,
            persistent = db.engine().is_persistent(),
            "GeoDB server listening"
        );

        let token = shutdown.clone();
        let result = axum::serve(listener, build_router(state))
            .with_graceful_shutdown(async move {
                signal.await;
                info!("shutdown requested");
                token.cancel();
            })
            .await;

        shutdown.cancel();
        dispatch.join().await;
        if let Some(purge) = purge {
            let _ = purge.await;
        }
        if let Err(e) = db.engine().compact() {
            warn!(error = %e, "commit log compaction failed");
        }
        result?;
        info!("GeoDB server stopped");
        Ok(())
    }

    /// Build the router over freshly opened state (useful for testing).
    pub fn router(&self, shutdown: &CancellationToken) -> ServerResult<axum::Router> {
        let (state, _dispatch) = self.open(shutdown)?;
        Ok(build_router(state))
    }
}

/// Periodically delete expired objects. `None` when disabled.
fn spawn_purge(
    db: GeoDb,
    interval_secs: u64,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => match db.purge_expired() {
                    Ok(0) => {}
                    Ok(purged) => info!(purged, "expired objects purged"),
                    Err(e) => warn!(error = %e, "expiry purge failed"),
                },
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geodb_service::{Object, Point};
    use std::collections::BTreeMap;

    #[test]
    fn server_construction() {
        let server = GeoDbServer::new(ServerConfig::default());
        assert_eq!(server.config().bind_addr, "127.0.0.1:5678".parse().unwrap());
    }

    #[tokio::test]
    async fn router_builds() {
        let server = GeoDbServer::new(ServerConfig::default());
        let shutdown = CancellationToken::new();
        let _router = server.router(&shutdown).unwrap();
        shutdown.cancel();
    }

    #[tokio::test]
    async fn open_with_data_dir_persists() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            data_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let shutdown = CancellationToken::new();
        let (state, dispatch) = GeoDbServer::new(config.clone()).open(&shutdown).unwrap();
        let object = Object::new("", Point::new(1.0, 1.0), 5.0);
        state
            .db
            .set(BTreeMap::from([("kept".to_string(), object)]))
            .await;
        shutdown.cancel();
        dispatch.join().await;
        drop(state);

        let shutdown = CancellationToken::new();
        let (state, _dispatch) = GeoDbServer::new(config).open(&shutdown).unwrap();
        assert_eq!(state.db.keys().unwrap(), vec!["kept".to_string()]);
        shutdown.cancel();
    }

    #[tokio::test]
    async fn purge_task_stops_on_shutdown() {
        let (state, _dispatch) = GeoDbServer::new(ServerConfig::default())
            .open(&CancellationToken::new())
            .unwrap();
        let shutdown = CancellationToken::new();
        let handle = spawn_purge(state.db.clone(), 1, shutdown.clone()).unwrap();
        shutdown.cancel();
        handle.await.unwrap();
        assert!(spawn_purge(state.db, 0, shutdown).is_none());
    }

    #[tokio::test]
    async fn serve_stops_on_signal() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        let server = GeoDbServer::new(config);
        server.serve_with_shutdown(async {}).await.unwrap();
    }
}
