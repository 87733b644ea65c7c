//! Persistence contract for order aggregates

use crate::core::error::StoreError;
use crate::core::order::Order;
use async_trait::async_trait;

/// Transactional storage of order aggregates, keyed by `order_uid`
///
/// The consumer, the cache-aside read path and the warm-up procedure depend
/// only on this trait, so any backend (PostgreSQL, in-memory, a test double)
/// can be substituted.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist the whole aggregate atomically
    ///
    /// Header, delivery, payment and items become visible together or not at
    /// all. Saving an order whose `order_uid` already exists replaces the
    /// previous aggregate, so redelivered messages are harmless.
    async fn save_order(&self, order: &Order) -> Result<(), StoreError>;

    /// Load the aggregate stored under `order_uid`
    ///
    /// Returns [`StoreError::NotFound`] when no such order exists.
    async fn get_order(&self, order_uid: &str) -> Result<Order, StoreError>;

    /// List the identifiers of every stored order
    async fn list_order_uids(&self) -> Result<Vec<String>, StoreError>;
}
