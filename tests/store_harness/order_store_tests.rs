//! Macro-generated contract tests for `OrderStore` implementations.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[macro_use]
//! mod store_harness;
//!
//! use store_harness::*;
//! use order_relay::storage::InMemoryOrderStore;
//!
//! order_store_tests!(InMemoryOrderStore::new());
//! ```
//!
//! # Generated Tests
//!
//! - `test_save_and_get`: the stored aggregate is returned field for field
//! - `test_get_missing`: unknown identifier yields `StoreError::NotFound`
//! - `test_list_empty` / `test_list_sorted`: identifier listing
//! - `test_save_replaces_previous_version`: upsert replaces the whole aggregate
//! - `test_save_is_idempotent`: redelivering the same order is harmless
//! - `test_items_keep_their_order`: item sequence survives a round trip
//! - `test_order_without_items`: empty item list is allowed
//! - `test_concurrent_saves`: parallel saves of distinct orders
//! - `test_sub_microsecond_timestamp_round_trips`: a decoded order reads back unchanged
//! - `test_generated_orders_round_trip`: random producer orders match through store and cache

/// Generate an `OrderStore` conformance test suite.
///
/// `$factory` is evaluated once per test and must produce a fresh, empty
/// store implementing `OrderStore + 'static`.
#[macro_export]
macro_rules! order_store_tests {
    ($factory:expr) => {
        mod order_store_contract_tests {
            use super::*;
            use order_relay::core::{OrderStore, StoreError};
            use std::sync::Arc;

            #[tokio::test]
            async fn test_save_and_get() {
                let store = $factory;
                let order = sample_order("b563feb7b2b84b6test");

                store.save_order(&order).await.unwrap();

                let loaded = store.get_order("b563feb7b2b84b6test").await.unwrap();
                assert_eq!(loaded, order);
            }

            #[tokio::test]
            async fn test_get_missing() {
                let store = $factory;

                let err = store.get_order("missing").await.unwrap_err();
                match err {
                    StoreError::NotFound { order_uid } => assert_eq!(order_uid, "missing"),
                    other => panic!("expected NotFound, got {:?}", other),
                }
            }

            #[tokio::test]
            async fn test_list_empty() {
                let store = $factory;
                assert!(store.list_order_uids().await.unwrap().is_empty());
            }

            #[tokio::test]
            async fn test_list_sorted() {
                let store = $factory;
                for uid in ["c", "a", "b"] {
                    store.save_order(&sample_order(uid)).await.unwrap();
                }

                assert_eq!(store.list_order_uids().await.unwrap(), vec!["a", "b", "c"]);
            }

            #[tokio::test]
            async fn test_save_replaces_previous_version() {
                let store = $factory;
                store
                    .save_order(&order_with_items("abc", 3))
                    .await
                    .unwrap();

                let mut newer = order_with_items("abc", 1);
                newer.track_number = "NEWTRACK".to_string();
                newer.delivery.city = "Kazan".to_string();
                newer.payment.amount = 42;
                store.save_order(&newer).await.unwrap();

                let loaded = store.get_order("abc").await.unwrap();
                assert_eq!(loaded, newer);
                assert_eq!(loaded.items.len(), 1);
                assert_eq!(store.list_order_uids().await.unwrap(), vec!["abc"]);
            }

            #[tokio::test]
            async fn test_save_is_idempotent() {
                let store = $factory;
                let order = sample_order("abc");

                store.save_order(&order).await.unwrap();
                store.save_order(&order).await.unwrap();

                assert_eq!(store.get_order("abc").await.unwrap(), order);
                assert_eq!(store.list_order_uids().await.unwrap().len(), 1);
            }

            #[tokio::test]
            async fn test_items_keep_their_order() {
                let store = $factory;
                let order = order_with_items("abc", 5);

                store.save_order(&order).await.unwrap();

                let names: Vec<String> = store
                    .get_order("abc")
                    .await
                    .unwrap()
                    .items
                    .into_iter()
                    .map(|item| item.name)
                    .collect();
                assert_eq!(names, vec!["item 0", "item 1", "item 2", "item 3", "item 4"]);
            }

            #[tokio::test]
            async fn test_order_without_items() {
                let store = $factory;
                let order = order_with_items("empty", 0);

                store.save_order(&order).await.unwrap();

                assert!(store.get_order("empty").await.unwrap().items.is_empty());
            }

            #[tokio::test]
            async fn test_sub_microsecond_timestamp_round_trips() {
                let store = $factory;
                let mut wire = serde_json::to_value(sample_order("nanos")).unwrap();
                wire["date_created"] = "2021-11-26T06:22:19.987654321Z".into();
                let order = order_relay::core::Order::from_json(
                    &serde_json::to_vec(&wire).unwrap(),
                )
                .unwrap();

                store.save_order(&order).await.unwrap();

                assert_eq!(store.get_order("nanos").await.unwrap(), order);
            }

            #[tokio::test]
            async fn test_generated_orders_round_trip() {
                use order_relay::cache::InMemoryOrderCache;
                use order_relay::core::OrderCache;

                let store = $factory;
                let cache = InMemoryOrderCache::new();

                for _ in 0..20 {
                    let order = order_relay::pipeline::fake_order();
                    store.save_order(&order).await.unwrap();
                    cache.set(&order.order_uid, Arc::new(order.clone()));

                    let loaded = store.get_order(&order.order_uid).await.unwrap();
                    assert_eq!(loaded, order);
                    assert_eq!(*cache.get(&order.order_uid).unwrap(), loaded);
                }
            }

            #[tokio::test]
            async fn test_concurrent_saves() {
                let store = Arc::new($factory);

                let handles: Vec<_> = (0..8)
                    .map(|i| {
                        let store = store.clone();
                        tokio::spawn(async move {
                            store
                                .save_order(&sample_order(&format!("order-{}", i)))
                                .await
                                .unwrap();
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.await.unwrap();
                }

                assert_eq!(store.list_order_uids().await.unwrap().len(), 8);
            }
        }
    };
}
