//! HTTP scenarios for the order read API.

#[macro_use]
mod store_harness;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use order_relay::cache::InMemoryOrderCache;
use order_relay::core::{Order, OrderCache, OrderStore, StoreError};
use order_relay::pipeline::OrderReader;
use order_relay::server::{AppState, RouterOptions, build_router};
use order_relay::storage::InMemoryOrderStore;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use store_harness::*;

/// Store wrapper counting `get_order` calls; can be switched to fail
#[derive(Default)]
struct CountingStore {
    inner: InMemoryOrderStore,
    gets: AtomicUsize,
    broken: bool,
}

#[async_trait]
impl OrderStore for CountingStore {
    async fn save_order(&self, order: &Order) -> Result<(), StoreError> {
        self.inner.save_order(order).await
    }

    async fn get_order(&self, order_uid: &str) -> Result<Order, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(StoreError::backend("test", "connection refused"));
        }
        self.inner.get_order(order_uid).await
    }

    async fn list_order_uids(&self) -> Result<Vec<String>, StoreError> {
        self.inner.list_order_uids().await
    }
}

fn server_with(store: Arc<CountingStore>, cache: Arc<InMemoryOrderCache>) -> TestServer {
    let state = AppState {
        reader: OrderReader::new(store, cache),
    };
    let options = RouterOptions {
        request_timeout: Duration::from_secs(5),
        static_dir: None,
    };
    TestServer::new(build_router(state, &options))
}

#[tokio::test]
async fn test_cached_order_is_served_without_store() {
    let store = Arc::new(CountingStore::default());
    let cache = Arc::new(InMemoryOrderCache::new());
    cache.set("abc", Arc::new(sample_order("abc")));
    let server = server_with(store.clone(), cache);

    let response = server.get("/orders/abc").await;

    response.assert_status_ok();
    assert_eq!(
        response.header("content-type").to_str().unwrap(),
        "application/json"
    );
    let body: Value = response.json();
    assert_eq!(body, serde_json::to_value(sample_order("abc")).unwrap());
    assert_eq!(store.gets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_response_uses_wire_field_names() {
    let store = Arc::new(CountingStore::default());
    let cache = Arc::new(InMemoryOrderCache::new());
    cache.set("b563feb7b2b84b6test", Arc::new(sample_order("b563feb7b2b84b6test")));
    let server = server_with(store, cache);

    let body: Value = server.get("/orders/b563feb7b2b84b6test").await.json();
    let expected: Value = serde_json::from_str(MODEL_JSON).unwrap();

    assert_eq!(body["shardkey"], "9");
    assert_eq!(body["delivery"], expected["delivery"]);
    assert_eq!(body["payment"], expected["payment"]);
    assert_eq!(body["items"], expected["items"]);
}

#[tokio::test]
async fn test_store_hit_fills_cache() {
    let store = Arc::new(CountingStore::default());
    store.save_order(&sample_order("xyz")).await.unwrap();
    let cache = Arc::new(InMemoryOrderCache::new());
    let server = server_with(store.clone(), cache.clone());

    server.get("/orders/xyz").await.assert_status_ok();
    assert!(cache.get("xyz").is_some());

    server.get("/orders/xyz").await.assert_status_ok();
    assert_eq!(store.gets.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_order_is_404() {
    let store = Arc::new(CountingStore::default());
    let cache = Arc::new(InMemoryOrderCache::new());
    let server = server_with(store, cache.clone());

    let response = server.get("/orders/missing").await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], "ORDER_NOT_FOUND");
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_empty_identifier_is_400() {
    let server = server_with(
        Arc::new(CountingStore::default()),
        Arc::new(InMemoryOrderCache::new()),
    );

    let response = server.get("/orders/").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "MISSING_ORDER_UID");
}

#[tokio::test]
async fn test_store_failure_is_500_without_detail() {
    let store = Arc::new(CountingStore {
        broken: true,
        ..Default::default()
    });
    let server = server_with(store, Arc::new(InMemoryOrderCache::new()));

    let response = server.get("/orders/abc").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["code"], "INTERNAL_ERROR");
    assert_eq!(body["message"], "internal server error");
}

#[tokio::test]
async fn test_health_reports_cache_size() {
    let cache = Arc::new(InMemoryOrderCache::new());
    cache.set("a", Arc::new(sample_order("a")));
    cache.set("b", Arc::new(sample_order("b")));
    let server = server_with(Arc::new(CountingStore::default()), cache);

    for path in ["/health", "/healthz"] {
        let response = server.get(path).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "order-relay");
        assert_eq!(body["cached_orders"], 2);
    }
}
