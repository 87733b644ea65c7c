//! Synthetic order producer for demos and local load

use crate::core::{Delivery, Item, Order, OrderPublisher, Payment, truncate_to_micros};
use chrono::Utc;
use rand::Rng;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

const FIRST_NAMES: &[&str] = &["Anna", "Boris", "Daria", "Ivan", "Maria", "Oleg", "Pavel"];
const LAST_NAMES: &[&str] = &["Ivanova", "Petrov", "Smirnova", "Volkov", "Kuznetsov"];
const CITIES: &[&str] = &["Moscow", "Kazan", "Novosibirsk", "Samara", "Tver"];
const STREETS: &[&str] = &["Lenina", "Mira", "Sadovaya", "Tverskaya", "Gagarina"];
const REGIONS: &[&str] = &["Central", "Volga", "Siberia", "Northwest"];
const COMPANIES: &[&str] = &["Vivienne Sabo", "Alfa", "Sber", "Wildberries", "Ozon"];
const PRODUCTS: &[&str] = &["Mascara", "Sneakers", "Backpack", "Headphones", "Kettle"];
const SIZES: &[&str] = &["S", "M", "L", "XL"];
const LOCALES: &[&str] = &["en", "ru"];

fn pick(options: &[&'static str]) -> String {
    options
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or_default()
        .to_string()
}

fn letters(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect()
}

/// Build a random order that passes [`Order::check`].
pub fn fake_order() -> Order {
    let mut rng = rand::thread_rng();
    let track_number = Uuid::new_v4().simple().to_string().to_uppercase();

    let item_count: usize = rng.gen_range(1..=5);
    let items: Vec<Item> = (0..item_count)
        .map(|_| Item {
            chrt_id: rng.gen_range(1_000..10_000),
            track_number: track_number.clone(),
            price: rng.gen_range(100..10_000),
            rid: Uuid::new_v4().simple().to_string(),
            name: pick(PRODUCTS),
            sale: rng.gen_range(0..=50),
            size: pick(SIZES),
            total_price: rng.gen_range(100..10_000),
            nm_id: rng.gen_range(100_000..1_000_000),
            brand: pick(COMPANIES),
            status: rng.gen_range(200..=202),
        })
        .collect();

    let goods_total: i64 = items.iter().map(|item| item.total_price).sum();
    let delivery_cost: i64 = rng.gen_range(100..=500);
    let zip: u32 = rng.gen_range(100_000..1_000_000);
    let house: u32 = rng.gen_range(1..200);
    let shard: u8 = rng.gen_range(0..10);
    let order_uid = Uuid::new_v4().simple().to_string();
    let name = format!("{} {}", pick(FIRST_NAMES), pick(LAST_NAMES));

    Order {
        order_uid: order_uid.clone(),
        track_number,
        entry: "WBIL".to_string(),
        delivery: Delivery {
            email: format!("{}@example.com", letters(8)),
            name,
            phone: format!("+7{:010}", rng.gen_range(0..10_000_000_000_i64)),
            zip: zip.to_string(),
            city: pick(CITIES),
            address: format!("{} {}", pick(STREETS), house),
            region: pick(REGIONS),
        },
        payment: Payment {
            transaction: order_uid,
            request_id: String::new(),
            currency: "RUB".to_string(),
            provider: "wbpay".to_string(),
            amount: goods_total + delivery_cost,
            payment_dt: Utc::now().timestamp(),
            bank: pick(COMPANIES),
            delivery_cost,
            goods_total,
            custom_fee: rng.gen_range(0..=100),
        },
        items,
        locale: pick(LOCALES),
        internal_signature: String::new(),
        customer_id: letters(6),
        delivery_service: pick(COMPANIES),
        shard_key: shard.to_string(),
        sm_id: rng.gen_range(1..=100),
        date_created: truncate_to_micros(Utc::now()),
        oof_shard: "1".to_string(),
    }
}

/// Publishes one fake order per tick until cancelled
pub struct OrderProducer {
    publisher: Arc<dyn OrderPublisher>,
    interval: Duration,
}

impl OrderProducer {
    pub fn new(publisher: Arc<dyn OrderPublisher>, interval: Duration) -> Self {
        Self {
            publisher,
            interval,
        }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "order producer started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.publish_one().await,
            }
        }

        tracing::info!("order producer stopped");
    }

    async fn publish_one(&self) {
        let order = fake_order();
        let payload = match order.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode order");
                return;
            }
        };

        let sent = tokio::time::timeout(
            PUBLISH_TIMEOUT,
            self.publisher.publish(&order.order_uid, payload),
        )
        .await;

        match sent {
            Ok(Ok(())) => tracing::info!(order_uid = %order.order_uid, "order published"),
            Ok(Err(e)) => {
                tracing::error!(order_uid = %order.order_uid, error = %e, "failed to publish order")
            }
            Err(_) => tracing::error!(order_uid = %order.order_uid, "publishing order timed out"),
        }
    }
}
