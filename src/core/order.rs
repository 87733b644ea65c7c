//! The order aggregate carried on the stream, persisted by the store and
//! served from the cache.
//!
//! An [`Order`] owns exactly one [`Delivery`], exactly one [`Payment`] and an
//! ordered list of [`Item`]s. The whole aggregate is the unit of storage: it is
//! written atomically and replaced wholesale when a newer message arrives for
//! the same `order_uid`.
//!
//! The JSON field names are the wire format of inbound messages and of the
//! `GET /orders/{order_uid}` response body.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

/// Order aggregate root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Order {
    /// Globally unique identifier, the only external lookup key
    #[validate(custom(function = "not_blank"))]
    pub order_uid: String,

    #[validate(length(min = 1), custom(function = "storable_text"))]
    pub track_number: String,

    #[validate(length(min = 1), custom(function = "storable_text"))]
    pub entry: String,

    #[validate(nested)]
    pub delivery: Delivery,

    #[validate(nested)]
    pub payment: Payment,

    #[validate(nested)]
    #[serde(default)]
    pub items: Vec<Item>,

    #[validate(custom(function = "storable_text"))]
    #[serde(default)]
    pub locale: String,

    #[validate(custom(function = "storable_text"))]
    #[serde(default)]
    pub internal_signature: String,

    #[validate(length(min = 1), custom(function = "storable_text"))]
    pub customer_id: String,

    #[validate(custom(function = "storable_text"))]
    #[serde(default)]
    pub delivery_service: String,

    #[validate(custom(function = "storable_text"))]
    #[serde(rename = "shardkey", default)]
    pub shard_key: String,

    #[validate(range(min = 0))]
    pub sm_id: i32,

    /// Creation time, kept at microsecond precision
    #[serde(deserialize_with = "deserialize_micros")]
    pub date_created: DateTime<Utc>,

    #[validate(custom(function = "storable_text"))]
    #[serde(default)]
    pub oof_shard: String,
}

/// Recipient details, stored as its own relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Delivery {
    #[validate(length(min = 1), custom(function = "storable_text"))]
    pub name: String,

    #[validate(length(min = 1), custom(function = "storable_text"))]
    pub phone: String,

    #[validate(custom(function = "storable_text"))]
    #[serde(default)]
    pub zip: String,

    #[validate(length(min = 1), custom(function = "storable_text"))]
    pub city: String,

    #[validate(length(min = 1), custom(function = "storable_text"))]
    pub address: String,

    #[validate(custom(function = "storable_text"))]
    #[serde(default)]
    pub region: String,

    #[validate(email, custom(function = "storable_text"))]
    pub email: String,
}

/// Payment details, stored as its own relation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Payment {
    #[validate(length(min = 1), custom(function = "storable_text"))]
    pub transaction: String,

    #[validate(custom(function = "storable_text"))]
    #[serde(default)]
    pub request_id: String,

    #[validate(length(min = 1), custom(function = "storable_text"))]
    pub currency: String,

    #[validate(length(min = 1), custom(function = "storable_text"))]
    pub provider: String,

    #[validate(range(min = 0))]
    pub amount: i64,

    /// Payment time in epoch seconds
    pub payment_dt: i64,

    #[validate(custom(function = "storable_text"))]
    #[serde(default)]
    pub bank: String,

    #[validate(range(min = 0))]
    pub delivery_cost: i64,

    #[validate(range(min = 0))]
    pub goods_total: i64,

    #[validate(range(min = 0))]
    #[serde(default)]
    pub custom_fee: i64,
}

/// Line item of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Item {
    pub chrt_id: i64,

    #[validate(length(min = 1), custom(function = "storable_text"))]
    pub track_number: String,

    #[validate(range(min = 0))]
    pub price: i64,

    #[validate(custom(function = "storable_text"))]
    #[serde(default)]
    pub rid: String,

    #[validate(length(min = 1), custom(function = "storable_text"))]
    pub name: String,

    /// Sale percentage
    #[validate(range(min = 0, max = 100))]
    pub sale: i32,

    #[validate(custom(function = "storable_text"))]
    #[serde(default)]
    pub size: String,

    #[validate(range(min = 0))]
    pub total_price: i64,

    pub nm_id: i64,

    #[validate(custom(function = "storable_text"))]
    #[serde(default)]
    pub brand: String,

    pub status: i32,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    storable_text(value)
}

/// Text columns cannot hold NUL, so such a value could never be persisted.
fn storable_text(value: &str) -> Result<(), ValidationError> {
    if value.contains('\0') {
        return Err(ValidationError::new("nul_byte"));
    }
    Ok(())
}

/// Timestamps are stored with microsecond precision. Truncating on decode
/// keeps a cached order identical to the one the store gives back.
pub fn truncate_to_micros(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(6)
}

fn deserialize_micros<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    DateTime::<Utc>::deserialize(deserializer).map(truncate_to_micros)
}

impl Order {
    /// Decode an order from its JSON wire representation.
    pub fn from_json(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }

    /// Encode the order into its JSON wire representation.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Check the structural constraints an order must satisfy before it is
    /// persisted.
    pub fn check(&self) -> Result<(), ValidationErrors> {
        self.validate()
    }
}
