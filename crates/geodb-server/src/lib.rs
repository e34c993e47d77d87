//! HTTP server for GeoDB.
//!
//! Serves the unary object-store operations as JSON endpoints and the
//! object and event streams as server-sent events.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;
pub mod stream;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::GeoDbServer;
pub use state::AppState;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::Router;
    use futures::StreamExt;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use tower::util::ServiceExt;

    struct TestApp {
        router: Router,
        state: AppState,
        shutdown: CancellationToken,
    }

    impl TestApp {
        fn new() -> Self {
            let shutdown = CancellationToken::new();
            let (state, _dispatch) = GeoDbServer::new(ServerConfig::default())
                .open(&shutdown)
                .unwrap();
            Self {
                router: router::build_router(state.clone()),
                state,
                shutdown,
            }
        }

        async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, body)
        }

        async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
            self.call(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
        }

        async fn get(&self, uri: &str) -> (StatusCode, Value) {
            self.call(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
        }

        async fn seed(&self, keys: &[&str]) {
            let objects: serde_json::Map<String, Value> = keys
                .iter()
                .map(|k| {
                    (
                        k.to_string(),
                        json!({"point": {"lat": 10.0, "lon": 20.0}, "radius": 50.0}),
                    )
                })
                .collect();
            let (status, body) = self.post("/v1/set", json!({ "objects": objects })).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({}));
        }
    }

    impl Drop for TestApp {
        fn drop(&mut self) {
            self.shutdown.cancel();
        }
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = TestApp::new();
        let (status, body) = app.get("/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn ping_endpoint() {
        let app = TestApp::new();
        let (status, body) = app.get("/v1/ping").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn set_then_get() {
        let app = TestApp::new();
        app.seed(&["truck"]).await;

        let (status, body) = app.post("/v1/get", json!({"keys": ["truck"]})).await;
        assert_eq!(status, StatusCode::OK);
        let truck = &body["objects"]["truck"];
        assert_eq!(truck["key"], "truck");
        assert_eq!(truck["radius"], 50.0);
        assert!(truck["updated_unix"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn get_missing_is_404() {
        let app = TestApp::new();
        let (status, body) = app.post("/v1/get", json!({"keys": ["ghost"]})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
        assert_eq!(body["message"], "key not found: ghost");
    }

    #[tokio::test]
    async fn keys_seek_delete_flow() {
        let app = TestApp::new();
        app.seed(&["car:1", "car:2", "bike:1"]).await;

        let (_, body) = app.get("/v1/keys").await;
        assert_eq!(body, json!({"keys": ["bike:1", "car:1", "car:2"]}));

        let (_, body) = app.post("/v1/seek", json!({"prefix": "car:"})).await;
        let found: Vec<&String> = body["objects"].as_object().unwrap().keys().collect();
        assert_eq!(found, vec!["car:1", "car:2"]);

        let (status, _) = app.post("/v1/delete", json!({"keys": ["car:1"]})).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = app.get("/v1/keys").await;
        assert_eq!(body, json!({"keys": ["bike:1", "car:2"]}));
    }

    #[tokio::test]
    async fn regex_endpoint() {
        let app = TestApp::new();
        app.seed(&["user-1", "admin"]).await;

        let (status, body) = app.post("/v1/regex", json!({"regex": "^user-"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["objects"].as_object().unwrap().len(), 1);

        let (status, body) = app.post("/v1/regex", json!({"regex": "("})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_pattern");
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let app = TestApp::new();
        let (status, body) = app.post("/v1/get", json!({"keys": "nope"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "bad_request");
    }

    #[tokio::test]
    async fn stream_with_invalid_regex_is_400() {
        let app = TestApp::new();
        let (status, body) = app.get("/v1/stream/events?regex=%28").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_pattern");
        assert_eq!(app.state.db.hub().events().client_count(), 0);
    }

    #[tokio::test]
    async fn object_stream_delivers_sse_frames() {
        let app = TestApp::new();
        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/v1/stream/objects?client_id=sse-1&regex=%5Etruck")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let hub = app.state.db.hub().clone();
        tokio::time::timeout(Duration::from_secs(1), async {
            while !hub.objects().contains("sse-1") {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        app.seed(&["bike", "truck"]).await;

        let mut body = response.into_body().into_data_stream();
        let mut text = String::new();
        tokio::time::timeout(Duration::from_secs(1), async {
            while !text.contains("\"key\":\"truck\"") {
                let chunk = body.next().await.unwrap().unwrap();
                text.push_str(&String::from_utf8_lossy(&chunk));
            }
        })
        .await
        .unwrap();
        assert!(text.contains("event: object"));
        assert!(!text.contains("\"key\":\"bike\""));

        // Dropping the body cancels the gateway and deregisters the client.
        drop(body);
        tokio::time::timeout(Duration::from_secs(1), async {
            while hub.objects().contains("sse-1") {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }
}
