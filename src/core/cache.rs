//! Cache contract for order aggregates

use crate::core::order::Order;
use std::sync::Arc;

/// In-process map from `order_uid` to a full order snapshot
///
/// Entries are shared as `Arc<Order>`: a cached aggregate is never mutated in
/// place, a newer version replaces the whole entry. `set` overwrites
/// unconditionally, the last writer for an identifier wins.
///
/// All methods may be called concurrently.
pub trait OrderCache: Send + Sync {
    fn get(&self, order_uid: &str) -> Option<Arc<Order>>;

    fn set(&self, order_uid: &str, order: Arc<Order>);

    fn invalidate(&self, order_uid: &str);

    fn invalidate_all(&self);

    /// Number of cached orders
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
