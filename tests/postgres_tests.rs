//! Integration tests for the PostgreSQL order store.
//!
//! # Requirements
//!
//! - Docker must be running (testcontainers launches a PostgreSQL container)
//! - Feature flag `postgres` must be enabled
//!
//! # Running
//!
//! ```sh
//! cargo test --features postgres --test postgres_tests -- --test-threads=1
//! ```
//!
//! All tests share one container (via `OnceLock`). Each test creates a fresh
//! `PgPool` and truncates the tables first.

#![cfg(feature = "postgres")]

#[macro_use]
mod store_harness;

use order_relay::config::PostgresConfig;
use order_relay::core::{OrderStore, StoreError};
use order_relay::storage::PostgresOrderStore;
use order_relay::storage::postgres::{connect, ensure_schema};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::OnceLock;
use store_harness::*;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;

// ---------------------------------------------------------------------------
// Shared test environment (single container, fresh pool per test)
// ---------------------------------------------------------------------------

struct PgTestEnv {
    /// Dropping this stops the container; it lives for the whole test binary.
    _container: testcontainers::ContainerAsync<Postgres>,
    config: PostgresConfig,
}

static TEST_ENV: OnceLock<PgTestEnv> = OnceLock::new();

async fn init_pg_env() -> &'static PgTestEnv {
    if let Some(env) = TEST_ENV.get() {
        return env;
    }

    let container = Postgres::default()
        .start()
        .await
        .expect("Failed to start PostgreSQL container, is Docker running?");

    let config = PostgresConfig {
        host: container.get_host().await.unwrap().to_string(),
        port: container.get_host_port_ipv4(5432).await.unwrap(),
        user: "postgres".to_string(),
        password: "postgres".to_string(),
        dbname: "postgres".to_string(),
        ..Default::default()
    };

    let pool = connect(&config)
        .await
        .expect("Failed to connect to PostgreSQL");
    ensure_schema(&pool).await.expect("Failed to create schema");
    pool.close().await;

    let _ = TEST_ENV.set(PgTestEnv {
        _container: container,
        config,
    });
    TEST_ENV.get().unwrap()
}

async fn pg_pool() -> PgPool {
    let env = init_pg_env().await;
    PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&env.config.connection_url())
        .await
        .expect("Failed to connect to PostgreSQL")
}

async fn clean_pg_store() -> PostgresOrderStore {
    let pool = pg_pool().await;
    sqlx::query("TRUNCATE items, orders, delivery, payment CASCADE")
        .execute(&pool)
        .await
        .expect("Failed to truncate order tables");
    PostgresOrderStore::new(pool)
}

order_store_tests!(clean_pg_store().await);

// ---------------------------------------------------------------------------
// Backend-specific behaviour
// ---------------------------------------------------------------------------

async fn count(pool: &PgPool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_ensure_schema_is_idempotent() {
    let store = clean_pg_store().await;
    ensure_schema(store.pool()).await.unwrap();
    ensure_schema(store.pool()).await.unwrap();
}

#[tokio::test]
async fn test_replacement_leaves_no_orphan_rows() {
    let store = clean_pg_store().await;

    store.save_order(&order_with_items("abc", 4)).await.unwrap();
    store.save_order(&order_with_items("abc", 2)).await.unwrap();

    assert_eq!(count(store.pool(), "orders").await, 1);
    assert_eq!(count(store.pool(), "delivery").await, 1);
    assert_eq!(count(store.pool(), "payment").await, 1);
    assert_eq!(count(store.pool(), "items").await, 2);
}

#[tokio::test]
async fn test_failed_save_is_not_visible() {
    let store = clean_pg_store().await;

    // postgres rejects NUL in text, so the third item insert aborts the transaction
    let mut order = order_with_items("abc", 3);
    order.items[2].name = "bad\0name".to_string();

    assert!(store.save_order(&order).await.is_err());
    assert!(matches!(
        store.get_order("abc").await,
        Err(StoreError::NotFound { .. })
    ));
    assert_eq!(count(store.pool(), "orders").await, 0);
    assert_eq!(count(store.pool(), "items").await, 0);
    assert_eq!(count(store.pool(), "delivery").await, 0);
}
