//! Payment confirmation handlers.
//!
//! Card and manual confirmations share one reconciliation entry point; the
//! handlers only translate the request body into a [`PaymentIntent`].

use axum::{Json, extract::State};
use panaderia_core::OrderId;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{order_view, success};
use crate::auth::Caller;
use crate::error::{ApiJson, AppError};
use crate::payments::{self, PaymentIntent, ReconcileOutcome, ReconcileRequest};
use crate::services::orders::OrderDraft;
use crate::state::AppState;

/// Body of `confirm_card_payment`.
#[derive(Debug, Deserialize)]
pub struct CardPaymentRequest {
    #[serde(default)]
    pub order_id: Option<OrderId>,
    /// Cart for a new order when no `order_id` is given.
    #[serde(default)]
    pub order: Option<OrderDraft>,
    /// Single-use token from the tokenization provider.
    pub token: String,
    #[serde(default)]
    pub billing_postal_code: Option<String>,
}

/// Body of `confirm_manual_payment`.
#[derive(Debug, Deserialize)]
pub struct ManualPaymentRequest {
    #[serde(default)]
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub order: Option<OrderDraft>,
    /// Transfer reference quoted by the customer; generated if absent.
    #[serde(default)]
    pub reference: Option<String>,
}

/// Body of `confirm_payment`.
#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub order_id: OrderId,
}

fn outcome_body(outcome: &ReconcileOutcome) -> Value {
    let mut body = success(order_view(&outcome.order));
    body["already_confirmed"] = json!(outcome.already_confirmed);
    if let Some(report) = &outcome.notifications {
        body["notifications"] = json!(report);
    }
    body
}

/// Charge a card for a new or existing order.
///
/// # Errors
///
/// Returns 400 with the provider's reason (and the `order_id`) when the
/// charge fails.
pub async fn confirm_card(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<CardPaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = payments::reconcile(
        &state,
        &caller,
        ReconcileRequest {
            order_id: request.order_id,
            draft: request.order,
            intent: PaymentIntent::Card {
                token: request.token,
                billing_postal_code: request.billing_postal_code,
            },
        },
    )
    .await?;
    Ok(Json(outcome_body(&outcome)))
}

/// Record a declared bank transfer.
///
/// # Errors
///
/// Returns 400 for invalid input, 403/404 for an unusable `order_id`.
pub async fn confirm_manual(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<ManualPaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = payments::reconcile(
        &state,
        &caller,
        ReconcileRequest {
            order_id: request.order_id,
            draft: request.order,
            intent: PaymentIntent::Manual {
                reference: request.reference,
            },
        },
    )
    .await?;
    Ok(Json(outcome_body(&outcome)))
}

/// Staff confirmation that a transfer arrived.
///
/// # Errors
///
/// Returns 403 for customers, 409 if the payment is not pending.
pub async fn confirm(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<ConfirmRequest>,
) -> Result<Json<Value>, AppError> {
    let outcome = payments::confirm_payment(&state, &caller, request.order_id).await?;
    Ok(Json(outcome_body(&outcome)))
}
