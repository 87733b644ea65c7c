//! Cache-aside read path used by the serving interface

use crate::core::{Order, OrderCache, OrderStore, ReadError, StoreError};
use std::sync::Arc;
use std::time::Duration;

/// Looks orders up in the cache first and falls back to the store
///
/// A store hit is written back into the cache, so the next lookup for the
/// same identifier never reaches the store. A not-found result is never
/// cached.
#[derive(Clone)]
pub struct OrderReader {
    store: Arc<dyn OrderStore>,
    cache: Arc<dyn OrderCache>,
    store_timeout: Option<Duration>,
}

impl OrderReader {
    pub fn new(store: Arc<dyn OrderStore>, cache: Arc<dyn OrderCache>) -> Self {
        Self {
            store,
            cache,
            store_timeout: None,
        }
    }

    /// Bound every store fallback by `timeout`
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = Some(timeout);
        self
    }

    pub fn cache(&self) -> &Arc<dyn OrderCache> {
        &self.cache
    }

    pub async fn get_order(&self, order_uid: &str) -> Result<Arc<Order>, ReadError> {
        if order_uid.trim().is_empty() {
            return Err(ReadError::MissingId);
        }

        if let Some(order) = self.cache.get(order_uid) {
            tracing::debug!(order_uid = %order_uid, "order fetched from cache");
            return Ok(order);
        }

        let loaded = match self.store_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.store.get_order(order_uid))
                .await
                .unwrap_or_else(|_| {
                    Err(StoreError::Timeout {
                        operation: "get_order".to_string(),
                    })
                }),
            None => self.store.get_order(order_uid).await,
        };

        match loaded {
            Ok(order) => {
                let order = Arc::new(order);
                self.cache.set(order_uid, order.clone());
                tracing::info!(order_uid = %order_uid, "order loaded from store and cached");
                Ok(order)
            }
            Err(StoreError::NotFound { .. }) => {
                tracing::info!(order_uid = %order_uid, "order not found");
                Err(ReadError::NotFound {
                    order_uid: order_uid.to_string(),
                })
            }
            Err(e) => {
                tracing::error!(order_uid = %order_uid, error = %e, "failed to fetch order from store");
                Err(ReadError::Internal(e))
            }
        }
    }
}
