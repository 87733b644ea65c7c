//! # order-relay
//!
//! Order ingestion service: consumes order messages from a stream, persists
//! each order aggregate transactionally, keeps an in-process cache of
//! orders and serves them over HTTP with a cache-aside read path.
//!
//! ## Features
//!
//! - **At-least-once ingestion**: a message is acknowledged only after its
//!   order is committed to the store; malformed messages are skipped
//! - **Bounded retry**: transient store failures are retried with a fixed delay
//! - **Cache-aside reads**: cache hits never touch the store, misses fill the cache
//! - **Warm start**: the cache is preloaded from the store before serving
//! - **Pluggable backends**: in-memory (default), PostgreSQL (`postgres`
//!   feature) and Kafka (`kafka` feature)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use order_relay::prelude::*;
//!
//! let store = Arc::new(InMemoryOrderStore::new());
//! let cache = Arc::new(InMemoryOrderCache::new());
//! let broker = InMemoryBroker::new();
//!
//! let consumer = OrderConsumer::new(Arc::new(broker.clone()), store.clone(), cache.clone());
//! let reader = OrderReader::new(store, cache);
//!
//! broker.publish(&order.order_uid, order.to_json()?).await?;
//! tokio::spawn(async move { consumer.run(CancellationToken::new()).await });
//!
//! let order = reader.get_order("b563feb7b2b84b6test").await?;
//! ```

pub mod app;
pub mod cache;
pub mod config;
pub mod core;
pub mod pipeline;
pub mod server;
pub mod storage;
pub mod stream;
pub mod telemetry;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        Delivery, Item, Order, OrderCache, OrderPublisher, OrderStore, OrderStream, Payment,
        ReadError, ServiceError, StoreError, StreamError, StreamMessage, WarmUpError,
    };

    // === Pipeline ===
    pub use crate::pipeline::{
        OrderConsumer, OrderProducer, OrderReader, RetryPolicy, WarmUpConfig, fake_order, warm_up,
    };

    // === Backends ===
    pub use crate::cache::InMemoryOrderCache;
    pub use crate::storage::InMemoryOrderStore;
    #[cfg(feature = "postgres")]
    pub use crate::storage::PostgresOrderStore;
    pub use crate::stream::InMemoryBroker;
    #[cfg(feature = "kafka")]
    pub use crate::stream::{KafkaOrderPublisher, KafkaOrderStream};

    // === App ===
    pub use crate::app::App;
    pub use crate::config::AppConfig;
    pub use crate::server::{AppState, RouterOptions, build_router};

    // === External dependencies ===
    pub use std::sync::Arc;
    pub use tokio_util::sync::CancellationToken;
}
