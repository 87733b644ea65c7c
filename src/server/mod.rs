//! HTTP serving interface
//!
//! Builds the axum [`Router`] for the read API and serves it with graceful
//! shutdown driven by a [`CancellationToken`](tokio_util::sync::CancellationToken).
//!
//! Middleware, outermost first:
//! - `x-request-id` assignment (UUID v4 when the client sent none)
//! - `TraceLayer` access logging, with the request id in the span
//! - `x-request-id` propagation to the response
//! - panic capture, rendered as a 500 JSON error
//! - per-request timeout, rendered as 408

pub mod handlers;
pub mod serve;

pub use serve::{serve, shutdown_signal};

use crate::core::ServiceError;
use crate::pipeline::OrderReader;
use axum::Router;
use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::any::Any;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub reader: OrderReader,
}

/// Router options that come from configuration
#[derive(Debug, Clone, Default)]
pub struct RouterOptions {
    pub request_timeout: Duration,
    /// Directory served for paths no API route matches
    pub static_dir: Option<String>,
}

#[derive(Clone, Default)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

fn handle_panic(_panic: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("handler panicked");
    ServiceError::Internal("handler panicked".to_string()).into_response()
}

/// Routes of the read API, without middleware
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/orders/{order_uid}", get(handlers::get_order))
        .route("/orders/", get(handlers::missing_order_uid))
        .route("/health", get(handlers::health_check))
        .route("/healthz", get(handlers::health_check))
        .with_state(state)
}

/// Build the fully layered application router.
pub fn build_router(state: AppState, options: &RouterOptions) -> Router {
    let mut router = routes(state);

    if let Some(dir) = &options.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(request_id.clone(), XRequestId))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                }),
            )
            .layer(PropagateRequestIdLayer::new(request_id))
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                options.request_timeout,
            )),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryOrderCache;
    use crate::storage::InMemoryOrderStore;
    use axum_test::TestServer;
    use std::sync::Arc;

    fn state() -> AppState {
        AppState {
            reader: OrderReader::new(
                Arc::new(InMemoryOrderStore::new()),
                Arc::new(InMemoryOrderCache::new()),
            ),
        }
    }

    fn options() -> RouterOptions {
        RouterOptions {
            request_timeout: Duration::from_secs(5),
            static_dir: None,
        }
    }

    #[tokio::test]
    async fn test_request_id_is_generated() {
        let server = TestServer::new(build_router(state(), &options()));

        let response = server.get("/health").await;

        response.assert_status_ok();
        let id = response.header(REQUEST_ID_HEADER);
        assert!(Uuid::parse_str(id.to_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let server = TestServer::new(build_router(state(), &options()));

        let response = server
            .get("/health")
            .add_header(REQUEST_ID_HEADER, "req-42")
            .await;

        assert_eq!(response.header(REQUEST_ID_HEADER), "req-42");
    }

    async fn boom() -> &'static str {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let app = Router::new()
            .route("/boom", get(boom))
            .layer(CatchPanicLayer::custom(handle_panic));
        let server = TestServer::new(app);

        let response = server.get("/boom").await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "INTERNAL_ERROR");
        assert_eq!(body["message"], "internal server error");
    }

    #[tokio::test]
    async fn test_slow_handler_times_out() {
        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "done"
                }),
            )
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_millis(20),
            ));
        let server = TestServer::new(app);

        server
            .get("/slow")
            .await
            .assert_status(StatusCode::REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn test_static_dir_fallback() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>orders</h1>").unwrap();
        let options = RouterOptions {
            request_timeout: Duration::from_secs(5),
            static_dir: Some(dir.path().to_string_lossy().into_owned()),
        };
        let server = TestServer::new(build_router(state(), &options));

        let response = server.get("/index.html").await;

        response.assert_status_ok();
        response.assert_text("<h1>orders</h1>");
    }
}
