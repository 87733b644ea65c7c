//! In-memory implementation of OrderCache

use crate::core::{Order, OrderCache};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Process-wide order cache
///
/// Readers share the lock, writers take it exclusively. Cloning the cache
/// yields another handle to the same map.
#[derive(Clone, Default)]
pub struct InMemoryOrderCache {
    orders: Arc<RwLock<HashMap<String, Arc<Order>>>>,
}

impl InMemoryOrderCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted identifiers of every cached order
    pub fn order_uids(&self) -> Vec<String> {
        let orders = self.orders.read().unwrap_or_else(PoisonError::into_inner);
        let mut uids: Vec<String> = orders.keys().cloned().collect();
        uids.sort();
        uids
    }
}

// A panicking writer cannot leave the map half-updated: every write is a
// single insert/remove/replace, so a poisoned lock is still consistent.
impl OrderCache for InMemoryOrderCache {
    fn get(&self, order_uid: &str) -> Option<Arc<Order>> {
        let orders = self.orders.read().unwrap_or_else(PoisonError::into_inner);
        orders.get(order_uid).cloned()
    }

    fn set(&self, order_uid: &str, order: Arc<Order>) {
        let mut orders = self.orders.write().unwrap_or_else(PoisonError::into_inner);
        orders.insert(order_uid.to_string(), order);
    }

    fn invalidate(&self, order_uid: &str) {
        let mut orders = self.orders.write().unwrap_or_else(PoisonError::into_inner);
        orders.remove(order_uid);
    }

    fn invalidate_all(&self) {
        let mut orders = self.orders.write().unwrap_or_else(PoisonError::into_inner);
        *orders = HashMap::new();
    }

    fn len(&self) -> usize {
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
