//! Startup cache warm-up

use crate::config::WarmUpSettings;
use crate::core::{OrderCache, OrderStore, StoreError, WarmUpError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Time limits applied while preloading the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmUpConfig {
    /// Bound on listing every stored identifier
    pub list_timeout: Duration,
    /// Bound on loading one order
    pub fetch_timeout: Duration,
}

impl Default for WarmUpConfig {
    fn default() -> Self {
        Self::from(&WarmUpSettings::default())
    }
}

impl From<&WarmUpSettings> for WarmUpConfig {
    fn from(settings: &WarmUpSettings) -> Self {
        Self {
            list_timeout: Duration::from_secs(settings.list_timeout_secs),
            fetch_timeout: Duration::from_secs(settings.fetch_timeout_secs),
        }
    }
}

async fn bounded<T, Fut>(limit: Duration, operation: &str, fut: Fut) -> Result<T, StoreError>
where
    Fut: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .unwrap_or_else(|_| {
            Err(StoreError::Timeout {
                operation: operation.to_string(),
            })
        })
}

/// Load every stored order into the cache before traffic is served.
///
/// Returns the number of orders cached. Any failure aborts the warm-up;
/// orders cached before the failure stay in the cache.
pub async fn warm_up(
    store: &dyn OrderStore,
    cache: &dyn OrderCache,
    config: &WarmUpConfig,
) -> Result<usize, WarmUpError> {
    tracing::info!("warming up order cache");

    let order_uids = bounded(config.list_timeout, "list_order_uids", store.list_order_uids())
        .await
        .map_err(WarmUpError::ListIds)?;

    for order_uid in &order_uids {
        let order = bounded(config.fetch_timeout, "get_order", store.get_order(order_uid))
            .await
            .map_err(|source| WarmUpError::Fetch {
                order_uid: order_uid.clone(),
                source,
            })?;
        cache.set(order_uid, Arc::new(order));
    }

    tracing::info!(count = order_uids.len(), "order cache warmed up");
    Ok(order_uids.len())
}
