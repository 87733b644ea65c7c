//! Shared fixtures and contract tests for order store backends
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod store_harness;
//! use store_harness::*;
//! ```

#![allow(dead_code)]

#[macro_use]
pub mod order_store_tests;

use order_relay::core::{Item, Order};

/// The reference order message, as it arrives on the stream
pub const MODEL_JSON: &str = r#"{
  "order_uid": "b563feb7b2b84b6test",
  "track_number": "WBILMTESTTRACK",
  "entry": "WBIL",
  "delivery": {
    "name": "Test Testov",
    "phone": "+9720000000",
    "zip": "2639809",
    "city": "Kiryat Mozkin",
    "address": "Ploshad Mira 15",
    "region": "Kraiot",
    "email": "test@gmail.com"
  },
  "payment": {
    "transaction": "b563feb7b2b84b6test",
    "request_id": "",
    "currency": "USD",
    "provider": "wbpay",
    "amount": 1817,
    "payment_dt": 1637907727,
    "bank": "alpha",
    "delivery_cost": 1500,
    "goods_total": 317,
    "custom_fee": 0
  },
  "items": [
    {
      "chrt_id": 9934930,
      "track_number": "WBILMTESTTRACK",
      "price": 453,
      "rid": "ab4219087a764ae0btest",
      "name": "Mascaras",
      "sale": 30,
      "size": "0",
      "total_price": 317,
      "nm_id": 2389212,
      "brand": "Vivienne Sabo",
      "status": 202
    }
  ],
  "locale": "en",
  "internal_signature": "",
  "customer_id": "test",
  "delivery_service": "meest",
  "shardkey": "9",
  "sm_id": 99,
  "date_created": "2021-11-26T06:22:19Z",
  "oof_shard": "1"
}"#;

/// The reference order under a different identifier
pub fn sample_order(order_uid: &str) -> Order {
    let mut order = Order::from_json(MODEL_JSON.as_bytes()).unwrap();
    order.order_uid = order_uid.to_string();
    order.payment.transaction = order_uid.to_string();
    order
}

/// Reference order with `count` distinct items, in a known order
pub fn order_with_items(order_uid: &str, count: usize) -> Order {
    let mut order = sample_order(order_uid);
    let template = order.items[0].clone();
    order.items = (0..count)
        .map(|i| Item {
            chrt_id: 1_000 + i as i64,
            rid: format!("rid-{}", i),
            name: format!("item {}", i),
            price: 100 * (i as i64 + 1),
            ..template.clone()
        })
        .collect();
    order
}
