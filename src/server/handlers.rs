//! HTTP handlers for the order read API

use super::AppState;
use crate::core::{Order, ServiceError};
use axum::Json;
use axum::extract::{Path, State};
use serde_json::{Value, json};
use std::sync::Arc;

/// `GET /orders/{order_uid}`
///
/// Serves the aggregate exactly as cached; a cache miss falls back to the
/// store and fills the cache.
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_uid): Path<String>,
) -> Result<Json<Arc<Order>>, ServiceError> {
    let order = state.reader.get_order(&order_uid).await?;
    Ok(Json(order))
}

/// `GET /orders/` with an empty identifier
pub async fn missing_order_uid() -> ServiceError {
    ServiceError::MissingOrderUid
}

/// `GET /health` and `GET /healthz`
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "order-relay",
        "cached_orders": state.reader.cache().len(),
    }))
}
