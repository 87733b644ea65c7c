//! PostgreSQL order store using sqlx.
//!
//! Provides `PostgresOrderStore`, an [`OrderStore`] backed by a normalized
//! schema via `sqlx::PgPool`.
//!
//! # Feature flag
//!
//! This module is gated behind the `postgres` feature flag:
//! ```toml
//! [dependencies]
//! order-relay = { version = "0.1", features = ["postgres"] }
//! ```
//!
//! # Schema
//!
//! - `delivery` and `payment` rows are keyed by a generated `BIGSERIAL` id
//! - `orders` holds the header and references both by id
//! - `items` references `orders(order_uid)` and keeps the original item order
//!   in a `position` column
//!
//! Saving an order replaces every row of its previous version inside the same
//! transaction, which makes `save_order` idempotent on `order_uid`.

use crate::config::PostgresConfig;
use crate::core::{Delivery, Item, Order, OrderStore, Payment, StoreError};
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::time::Duration;

const BACKEND: &str = "PostgreSQL";

fn db_error(context: &str, e: sqlx::Error) -> StoreError {
    StoreError::backend(BACKEND, format!("{}: {}", context, e))
}

// ---------------------------------------------------------------------------
// Connection and schema management
// ---------------------------------------------------------------------------

/// Open a connection pool and make sure the database answers.
pub async fn connect(config: &PostgresConfig) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(&config.connection_url())
        .await
        .map_err(|e| db_error("unable to connect to database", e))?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(|e| db_error("unable to ping database", e))?;

    Ok(pool)
}

/// Apply the required tables and indexes (idempotent).
///
/// Safe to call on every startup.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS delivery (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            phone TEXT NOT NULL,
            zip TEXT NOT NULL,
            city TEXT NOT NULL,
            address TEXT NOT NULL,
            region TEXT NOT NULL,
            email TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS payment (
            id BIGSERIAL PRIMARY KEY,
            transaction TEXT NOT NULL,
            request_id TEXT NOT NULL,
            currency TEXT NOT NULL,
            provider TEXT NOT NULL,
            amount BIGINT NOT NULL,
            payment_dt BIGINT NOT NULL,
            bank TEXT NOT NULL,
            delivery_cost BIGINT NOT NULL,
            goods_total BIGINT NOT NULL,
            custom_fee BIGINT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS orders (
            order_uid TEXT PRIMARY KEY,
            track_number TEXT NOT NULL,
            entry TEXT NOT NULL,
            locale TEXT NOT NULL,
            internal_signature TEXT NOT NULL,
            customer_id TEXT NOT NULL,
            delivery_service TEXT NOT NULL,
            shardkey TEXT NOT NULL,
            sm_id INTEGER NOT NULL,
            date_created TIMESTAMPTZ NOT NULL,
            oof_shard TEXT NOT NULL,
            delivery_id BIGINT NOT NULL REFERENCES delivery (id),
            payment_id BIGINT NOT NULL REFERENCES payment (id)
        )",
        "CREATE TABLE IF NOT EXISTS items (
            id BIGSERIAL PRIMARY KEY,
            order_uid TEXT NOT NULL REFERENCES orders (order_uid) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            chrt_id BIGINT NOT NULL,
            track_number TEXT NOT NULL,
            price BIGINT NOT NULL,
            rid TEXT NOT NULL,
            name TEXT NOT NULL,
            sale INTEGER NOT NULL,
            size TEXT NOT NULL,
            total_price BIGINT NOT NULL,
            nm_id BIGINT NOT NULL,
            brand TEXT NOT NULL,
            status INTEGER NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_items_order_uid ON items (order_uid, position)",
    ];

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| db_error("failed to apply schema", e))?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// PostgresOrderStore
// ---------------------------------------------------------------------------

/// Order store backed by PostgreSQL.
///
/// # Example
///
/// ```rust,ignore
/// use order_relay::storage::postgres::{connect, PostgresOrderStore};
///
/// let pool = connect(&config.postgres).await?;
/// let store = PostgresOrderStore::new(pool);
/// store.save_order(&order).await?;
/// ```
#[derive(Clone, Debug)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Delete every row of the stored version of `order_uid`, if any.
    async fn delete_previous(
        tx: &mut Transaction<'_, Postgres>,
        order_uid: &str,
    ) -> Result<(), StoreError> {
        let previous: Option<(i64, i64)> = sqlx::query_as(
            "SELECT delivery_id, payment_id FROM orders WHERE order_uid = $1 FOR UPDATE",
        )
        .bind(order_uid)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| db_error("lock previous order failed", e))?;

        let Some((delivery_id, payment_id)) = previous else {
            return Ok(());
        };

        // items go with the header (ON DELETE CASCADE)
        sqlx::query("DELETE FROM orders WHERE order_uid = $1")
            .bind(order_uid)
            .execute(&mut **tx)
            .await
            .map_err(|e| db_error("delete previous order failed", e))?;

        sqlx::query("DELETE FROM delivery WHERE id = $1")
            .bind(delivery_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| db_error("delete previous delivery failed", e))?;

        sqlx::query("DELETE FROM payment WHERE id = $1")
            .bind(payment_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| db_error("delete previous payment failed", e))?;

        Ok(())
    }

    fn order_from_row(row: &PgRow) -> Result<Order, sqlx::Error> {
        Ok(Order {
            order_uid: row.try_get("order_uid")?,
            track_number: row.try_get("track_number")?,
            entry: row.try_get("entry")?,
            delivery: Delivery {
                name: row.try_get("d_name")?,
                phone: row.try_get("d_phone")?,
                zip: row.try_get("d_zip")?,
                city: row.try_get("d_city")?,
                address: row.try_get("d_address")?,
                region: row.try_get("d_region")?,
                email: row.try_get("d_email")?,
            },
            payment: Payment {
                transaction: row.try_get("p_transaction")?,
                request_id: row.try_get("p_request_id")?,
                currency: row.try_get("p_currency")?,
                provider: row.try_get("p_provider")?,
                amount: row.try_get("p_amount")?,
                payment_dt: row.try_get("p_payment_dt")?,
                bank: row.try_get("p_bank")?,
                delivery_cost: row.try_get("p_delivery_cost")?,
                goods_total: row.try_get("p_goods_total")?,
                custom_fee: row.try_get("p_custom_fee")?,
            },
            items: Vec::new(),
            locale: row.try_get("locale")?,
            internal_signature: row.try_get("internal_signature")?,
            customer_id: row.try_get("customer_id")?,
            delivery_service: row.try_get("delivery_service")?,
            shard_key: row.try_get("shardkey")?,
            sm_id: row.try_get("sm_id")?,
            date_created: row.try_get("date_created")?,
            oof_shard: row.try_get("oof_shard")?,
        })
    }

    fn item_from_row(row: &PgRow) -> Result<Item, sqlx::Error> {
        Ok(Item {
            chrt_id: row.try_get("chrt_id")?,
            track_number: row.try_get("track_number")?,
            price: row.try_get("price")?,
            rid: row.try_get("rid")?,
            name: row.try_get("name")?,
            sale: row.try_get("sale")?,
            size: row.try_get("size")?,
            total_price: row.try_get("total_price")?,
            nm_id: row.try_get("nm_id")?,
            brand: row.try_get("brand")?,
            status: row.try_get("status")?,
        })
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn save_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin tx failed", e))?;

        Self::delete_previous(&mut tx, &order.order_uid).await?;

        let delivery = &order.delivery;
        let delivery_id: i64 = sqlx::query_scalar(
            "INSERT INTO delivery (name, phone, zip, city, address, region, email) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(&delivery.name)
        .bind(&delivery.phone)
        .bind(&delivery.zip)
        .bind(&delivery.city)
        .bind(&delivery.address)
        .bind(&delivery.region)
        .bind(&delivery.email)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("insert delivery failed", e))?;

        let payment = &order.payment;
        let payment_id: i64 = sqlx::query_scalar(
            "INSERT INTO payment (transaction, request_id, currency, provider, amount, payment_dt, \
             bank, delivery_cost, goods_total, custom_fee) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING id",
        )
        .bind(&payment.transaction)
        .bind(&payment.request_id)
        .bind(&payment.currency)
        .bind(&payment.provider)
        .bind(payment.amount)
        .bind(payment.payment_dt)
        .bind(&payment.bank)
        .bind(payment.delivery_cost)
        .bind(payment.goods_total)
        .bind(payment.custom_fee)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("insert payment failed", e))?;

        sqlx::query(
            "INSERT INTO orders (order_uid, track_number, entry, locale, internal_signature, \
             customer_id, delivery_service, shardkey, sm_id, date_created, oof_shard, \
             delivery_id, payment_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(&order.order_uid)
        .bind(&order.track_number)
        .bind(&order.entry)
        .bind(&order.locale)
        .bind(&order.internal_signature)
        .bind(&order.customer_id)
        .bind(&order.delivery_service)
        .bind(&order.shard_key)
        .bind(order.sm_id)
        .bind(order.date_created)
        .bind(&order.oof_shard)
        .bind(delivery_id)
        .bind(payment_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("insert order failed", e))?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO items (order_uid, position, chrt_id, track_number, price, rid, name, \
                 sale, size, total_price, nm_id, brand, status) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            )
            .bind(&order.order_uid)
            .bind(position as i32)
            .bind(item.chrt_id)
            .bind(&item.track_number)
            .bind(item.price)
            .bind(&item.rid)
            .bind(&item.name)
            .bind(item.sale)
            .bind(&item.size)
            .bind(item.total_price)
            .bind(item.nm_id)
            .bind(&item.brand)
            .bind(item.status)
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("insert item failed", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| db_error("commit failed", e))?;

        Ok(())
    }

    async fn get_order(&self, order_uid: &str) -> Result<Order, StoreError> {
        // Header and items are read from one snapshot so a concurrent
        // replacement is never observed half-applied.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("begin tx failed", e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("set isolation failed", e))?;

        let row = sqlx::query(
            "SELECT o.order_uid, o.track_number, o.entry, o.locale, o.internal_signature, \
                    o.customer_id, o.delivery_service, o.shardkey, o.sm_id, o.date_created, \
                    o.oof_shard, \
                    d.name AS d_name, d.phone AS d_phone, d.zip AS d_zip, d.city AS d_city, \
                    d.address AS d_address, d.region AS d_region, d.email AS d_email, \
                    p.transaction AS p_transaction, p.request_id AS p_request_id, \
                    p.currency AS p_currency, p.provider AS p_provider, p.amount AS p_amount, \
                    p.payment_dt AS p_payment_dt, p.bank AS p_bank, \
                    p.delivery_cost AS p_delivery_cost, p.goods_total AS p_goods_total, \
                    p.custom_fee AS p_custom_fee \
             FROM orders o \
             JOIN delivery d ON d.id = o.delivery_id \
             JOIN payment p ON p.id = o.payment_id \
             WHERE o.order_uid = $1",
        )
        .bind(order_uid)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("get order failed", e))?
        .ok_or_else(|| StoreError::not_found(order_uid))?;

        let mut order =
            Self::order_from_row(&row).map_err(|e| db_error("decode order failed", e))?;

        let item_rows = sqlx::query(
            "SELECT chrt_id, track_number, price, rid, name, sale, size, total_price, nm_id, \
                    brand, status \
             FROM items WHERE order_uid = $1 ORDER BY position",
        )
        .bind(order_uid)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| db_error("get items failed", e))?;

        order.items = item_rows
            .iter()
            .map(Self::item_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| db_error("decode item failed", e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("commit failed", e))?;

        Ok(order)
    }

    async fn list_order_uids(&self) -> Result<Vec<String>, StoreError> {
        sqlx::query_scalar("SELECT order_uid FROM orders ORDER BY order_uid")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("list order uids failed", e))
    }
}
