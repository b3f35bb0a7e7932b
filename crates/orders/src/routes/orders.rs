//! Order handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use panaderia_core::{OrderId, OrderStatus};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{order_view, success};
use crate::auth::Caller;
use crate::error::{ApiJson, AppError};
use crate::services::orders::{self as service, OrderRequest};
use crate::state::AppState;

/// Body of `update_order_status`.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub order_id: OrderId,
    pub status: OrderStatus,
}

/// Persist a cart as an unpaid order or replace an existing order's cart.
///
/// # Errors
///
/// Returns 400 for invalid carts, 403/404/409 for an unusable `order_id`.
pub async fn create_or_update(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<OrderRequest>,
) -> Result<Json<Value>, AppError> {
    let order = service::create_or_update(&state, &caller, request).await?;
    Ok(Json(success(order_view(&order))))
}

/// Advance an order's fulfillment status.
///
/// # Errors
///
/// Returns 403 for customers, 409 for a backwards move.
pub async fn update_status(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<StatusRequest>,
) -> Result<Json<Value>, AppError> {
    let (order, notifications) =
        service::update_status(&state, &caller, request.order_id, request.status).await?;
    let mut body = success(order_view(&order));
    if let Some(report) = notifications {
        body["notifications"] = json!(report);
    }
    Ok(Json(body))
}

/// Fetch a single order.
///
/// # Errors
///
/// Returns 404 or 403.
pub async fn show(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<OrderId>,
) -> Result<Json<Value>, AppError> {
    let order = service::get(&state, &caller, id).await?;
    Ok(Json(success(order_view(&order))))
}
