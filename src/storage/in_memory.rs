//! In-memory implementation of OrderStore for testing and development

use crate::core::{Order, OrderStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// In-memory order store
///
/// Useful for testing and development. Uses RwLock for thread-safe access.
/// Each `save_order` replaces the stored aggregate as a whole.
#[derive(Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<String, Order>>>,
}

impl InMemoryOrderStore {
    /// Create a new, empty in-memory order store
    pub fn new() -> Self {
        Self {
            orders: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a store pre-populated with `orders`
    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let map = orders
            .into_iter()
            .map(|order| (order.order_uid.clone(), order))
            .collect();
        Self {
            orders: Arc::new(RwLock::new(map)),
        }
    }

    fn lock_error(e: impl std::fmt::Display) -> StoreError {
        StoreError::backend("in-memory", format!("failed to acquire lock: {}", e))
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn save_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut orders = self.orders.write().map_err(Self::lock_error)?;

        orders.insert(order.order_uid.clone(), order.clone());

        Ok(())
    }

    async fn get_order(&self, order_uid: &str) -> Result<Order, StoreError> {
        let orders = self.orders.read().map_err(Self::lock_error)?;

        orders
            .get(order_uid)
            .cloned()
            .ok_or_else(|| StoreError::not_found(order_uid))
    }

    async fn list_order_uids(&self) -> Result<Vec<String>, StoreError> {
        let orders = self.orders.read().map_err(Self::lock_error)?;

        let mut uids: Vec<String> = orders.keys().cloned().collect();
        uids.sort();
        Ok(uids)
    }
}
