//! Quote handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use panaderia_core::QuoteId;
use serde_json::{Value, json};

use super::{order_view, success};
use crate::auth::Caller;
use crate::db::Quote;
use crate::error::{ApiJson, AppError};
use crate::services::quotes::{self as service, QuoteFinalization, QuoteResponse, QuoteSubmission};
use crate::state::AppState;

fn quote_view(quote: &Quote) -> Value {
    json!({
        "quote": quote,
        "reference_code": quote.reference_code(),
    })
}

/// Record a quote request.
///
/// # Errors
///
/// Returns 400 for invalid input.
pub async fn submit(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(submission): ApiJson<QuoteSubmission>,
) -> Result<Json<Value>, AppError> {
    let (quote, report) = service::submit(&state, &caller, submission).await?;
    let mut body = success(quote_view(&quote));
    body["notifications"] = json!(report);
    Ok(Json(body))
}

/// Price or reject a quote.
///
/// # Errors
///
/// Returns 403 for customers, 400 for a missing price, 409 for a closed quote.
pub async fn respond(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(response): ApiJson<QuoteResponse>,
) -> Result<Json<Value>, AppError> {
    let (quote, report) = service::respond(&state, &caller, response).await?;
    let mut body = success(quote_view(&quote));
    body["notifications"] = json!(report);
    Ok(Json(body))
}

/// Accept a priced quote, creating a payable order.
///
/// # Errors
///
/// Returns 409 unless the quote is `responded`.
pub async fn finalize(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<QuoteFinalization>,
) -> Result<Json<Value>, AppError> {
    let (order, quote, report) = service::finalize(&state, &caller, request).await?;
    let mut body = success(order_view(&order));
    body["quote"] = json!(quote);
    body["notifications"] = json!(report);
    Ok(Json(body))
}

/// Fetch a single quote.
///
/// # Errors
///
/// Returns 404 or 403.
pub async fn show(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<QuoteId>,
) -> Result<Json<Value>, AppError> {
    let quote = service::get(&state, &caller, id).await?;
    Ok(Json(success(quote_view(&quote))))
}
