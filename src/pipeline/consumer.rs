//! Stream consumer: decode, validate, persist, cache, acknowledge
//!
//! Messages are handled one at a time, in stream order:
//!
//! ```text
//! fetch ──▶ decode/validate ──malformed──▶ commit (never retried)
//!                 │
//!                 ▼
//!          save_order (RetryPolicy) ──exhausted──▶ no commit, left for redelivery
//!                 │
//!                 ▼
//!          cache.set ──▶ commit
//! ```
//!
//! A message is never acknowledged before its order is committed to the
//! store, and the cache only ever receives orders the store accepted.

use crate::core::{Order, OrderCache, OrderStore, OrderStream, StreamError, StreamMessage};
use crate::pipeline::retry::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use validator::ValidationErrors;

/// Why a message was rejected without being persisted
#[derive(Debug, Error)]
pub enum MalformedMessage {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("validation failed: {0}")]
    Invalid(#[from] ValidationErrors),
}

/// What happened to one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Saved, cached and acknowledged
    Persisted { order_uid: String },
    /// Rejected and acknowledged
    Malformed,
    /// Every save attempt failed; not acknowledged
    Unacknowledged { order_uid: String },
}

/// Decode and validate a raw message payload
pub fn decode(message: &StreamMessage) -> Result<Order, MalformedMessage> {
    let order = Order::from_json(&message.payload)?;
    order.check()?;
    Ok(order)
}

/// Long-running consumer of order messages
pub struct OrderConsumer {
    stream: Arc<dyn OrderStream>,
    store: Arc<dyn OrderStore>,
    cache: Arc<dyn OrderCache>,
    retry: RetryPolicy,
    fetch_error_backoff: Duration,
}

impl OrderConsumer {
    pub fn new(
        stream: Arc<dyn OrderStream>,
        store: Arc<dyn OrderStore>,
        cache: Arc<dyn OrderCache>,
    ) -> Self {
        Self {
            stream,
            store,
            cache,
            retry: RetryPolicy::default(),
            fetch_error_backoff: Duration::from_secs(1),
        }
    }

    /// Set the persistence retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the pause after a failed fetch
    pub fn with_fetch_error_backoff(mut self, backoff: Duration) -> Self {
        self.fetch_error_backoff = backoff;
        self
    }

    /// Fetch and process messages until `cancel` fires or the stream closes.
    ///
    /// A message already being processed when `cancel` fires is finished
    /// before the loop returns.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!("order consumer started");

        loop {
            let message = match self.stream.fetch_next(&cancel).await {
                Ok(message) => message,
                Err(StreamError::Cancelled) => break,
                Err(StreamError::Closed) => {
                    tracing::info!("order stream closed");
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "error fetching message");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.fetch_error_backoff) => continue,
                    }
                }
            };

            self.process(&message).await;
        }

        tracing::info!("order consumer stopped");
    }

    /// Handle a single message and report what was done with it.
    pub async fn process(&self, message: &StreamMessage) -> Outcome {
        let order = match decode(message) {
            Ok(order) => order,
            Err(reason) => {
                tracing::warn!(
                    offset = message.offset,
                    partition = message.partition,
                    error = %reason,
                    raw = %message.payload_lossy(),
                    "malformed order message, skipping"
                );
                self.acknowledge(message).await;
                return Outcome::Malformed;
            }
        };

        let order_uid = order.order_uid.clone();
        let store = self.store.as_ref();
        let pending = &order;

        let saved = self
            .retry
            .run(move |attempt| async move {
                tracing::debug!(order_uid = %pending.order_uid, attempt, "saving order");
                store.save_order(pending).await
            })
            .await;

        if let Err(exhausted) = saved {
            tracing::error!(
                order_uid = %order_uid,
                offset = message.offset,
                attempts = exhausted.attempts,
                error = %exhausted.last_error,
                "failed to save order after retries, leaving message for redelivery"
            );
            return Outcome::Unacknowledged { order_uid };
        }

        self.cache.set(&order_uid, Arc::new(order));
        tracing::info!(order_uid = %order_uid, offset = message.offset, "order saved");

        self.acknowledge(message).await;
        Outcome::Persisted { order_uid }
    }

    async fn acknowledge(&self, message: &StreamMessage) {
        if let Err(e) = self.stream.commit(message).await {
            tracing::warn!(
                offset = message.offset,
                partition = message.partition,
                error = %e,
                "failed to commit message"
            );
        }
    }
}
