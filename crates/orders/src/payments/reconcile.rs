//! The reconciliation state machine.
//!
//! ```text
//! awaiting_payment ──card charge ok──────────────▶ payment_confirmed
//!        │         ──card charge fails──────────▶ awaiting_payment (unchanged)
//!        └──────── manual transfer declared ──▶ payment_submitted ──staff──▶ payment_confirmed
//! ```
//!
//! Each call re-reads the order, recomputes the amounts from the stored line
//! items, persists the transition and the amounts in one update, and only
//! then notifies.

use panaderia_core::{
    CartLineItem, OrderId, PaymentPath, PaymentStatus, PaymentType, PricingCalculator, Totals,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::{
    CardError, ChargeOutcome, ChargeRequest, PaymentError, PaymentIntent,
    generate_transfer_reference,
};
use crate::auth::Caller;
use crate::db::{Order, OrderPatch};
use crate::error::AppError;
use crate::notifications::{DispatchReport, Event, Notice};
use crate::services::orders::{OrderDraft, ValidDraft};
use crate::state::AppState;

const MAX_REFERENCE_LEN: usize = 64;
const MAX_POSTAL_CODE_LEN: usize = 12;

/// A payment confirmation for an existing order or a fresh cart.
#[derive(Debug, Clone)]
pub struct ReconcileRequest {
    /// Existing order to pay. Updated in place, never duplicated.
    pub order_id: Option<OrderId>,
    /// Cart for a new order. Mutually exclusive with `order_id`.
    pub draft: Option<OrderDraft>,
    pub intent: PaymentIntent,
}

/// Result of a reconciliation call.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub order: Order,
    /// The order was already paid; nothing was charged or written.
    pub already_confirmed: bool,
    pub notifications: Option<DispatchReport>,
}

enum Target {
    Existing(OrderId),
    New(ValidDraft),
}

/// Confirm payment for an order through a card token or a manual transfer.
///
/// # Errors
///
/// - `BadRequest` for invalid input or items still awaiting a price
/// - `Forbidden` if a customer targets an order they do not own
/// - `NotFound` if `order_id` does not exist
/// - `PaymentFailed` if the charge did not go through
#[instrument(
    skip(state, caller, request),
    fields(
        caller = %caller.subject,
        method = intent_name(&request.intent),
        order_id = tracing::field::Empty
    )
)]
pub async fn reconcile(
    state: &AppState,
    caller: &Caller,
    request: ReconcileRequest,
) -> Result<ReconcileOutcome, AppError> {
    let intent = normalize_intent(request.intent)?;

    let target = match (request.order_id, request.draft) {
        (Some(_), Some(_)) => {
            return Err(AppError::BadRequest(
                "send either order_id or an order, not both".to_string(),
            ));
        }
        (None, None) => {
            return Err(AppError::BadRequest("order_id or order is required".to_string()));
        }
        (Some(id), None) => Target::Existing(id),
        (None, Some(draft)) => Target::New(draft.validate(caller)?),
    };

    let order = match target {
        Target::Existing(id) => {
            tracing::Span::current().record("order_id", id.as_i32());
            let order = state
                .store()
                .get_order(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
            caller.require_owner_or_staff(order.is_owned_by(&caller.subject))?;

            if order.payment_state().is_confirmed() {
                info!(order_id = %id, "Payment already confirmed, nothing to do");
                return Ok(ReconcileOutcome {
                    order,
                    already_confirmed: true,
                    notifications: None,
                });
            }
            order
        }
        Target::New(draft) => {
            let totals = authoritative_totals(state, &draft.items, intent.path())?;
            let (payment_type, payment_reference) = match &intent {
                PaymentIntent::Card { .. } => (PaymentType::Card, None),
                PaymentIntent::Manual { reference } => (
                    PaymentType::Zelle,
                    Some(reference.clone().unwrap_or_else(generate_transfer_reference)),
                ),
            };
            let billing_postal_code = match &intent {
                PaymentIntent::Card {
                    billing_postal_code,
                    ..
                } => billing_postal_code.clone(),
                PaymentIntent::Manual { .. } => None,
            };
            let new_order = draft.into_new_order(
                totals,
                payment_type,
                PaymentStatus::Pending,
                payment_reference,
                billing_postal_code,
            );
            let order = state.store().insert_order(&new_order).await?;
            tracing::Span::current().record("order_id", order.id.as_i32());
            info!(order_id = %order.id, payment_type = %order.payment_type, "Order created for payment");

            // A manual transfer on a new order is fully described by the insert.
            if matches!(intent, PaymentIntent::Manual { .. }) {
                let notifications = notify(state, Event::PaymentSubmitted, &order).await;
                return Ok(ReconcileOutcome {
                    order,
                    already_confirmed: false,
                    notifications: Some(notifications),
                });
            }
            order
        }
    };

    let totals = authoritative_totals(state, &order.items, intent.path())?;

    let (patch, event) = match &intent {
        PaymentIntent::Card {
            token,
            billing_postal_code,
        } => {
            let charge = charge_card(state, &order, token, &totals).await?;
            (
                OrderPatch {
                    payment_type: Some(PaymentType::Card),
                    payment_status: Some(PaymentStatus::Completed),
                    payment_reference: Some(charge.id),
                    amounts: Some(totals),
                    billing_postal_code: billing_postal_code.clone(),
                    ..Default::default()
                },
                Event::OrderReceived,
            )
        }
        PaymentIntent::Manual { reference } => (
            OrderPatch {
                payment_type: Some(PaymentType::Zelle),
                payment_status: Some(PaymentStatus::Pending),
                payment_reference: Some(
                    reference
                        .clone()
                        .or_else(|| order.payment_reference.clone())
                        .unwrap_or_else(generate_transfer_reference),
                ),
                amounts: Some(totals),
                ..Default::default()
            },
            Event::PaymentSubmitted,
        ),
    };

    let order = state.store().update_order(order.id, &patch).await?;
    info!(
        order_id = %order.id,
        payment_state = %order.payment_state(),
        total = %order.total,
        "Payment reconciled"
    );

    let notifications = notify(state, event, &order).await;
    Ok(ReconcileOutcome {
        order,
        already_confirmed: false,
        notifications: Some(notifications),
    })
}

/// Staff confirmation that a declared payment arrived.
///
/// # Errors
///
/// - `Forbidden` for non-staff callers
/// - `NotFound` if the order does not exist
/// - `Conflict` if the payment is not pending
#[instrument(skip(state, caller), fields(caller = %caller.subject, order_id = %id))]
pub async fn confirm_payment(
    state: &AppState,
    caller: &Caller,
    id: OrderId,
) -> Result<ReconcileOutcome, AppError> {
    caller.require_staff()?;

    let order = state
        .store()
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    if order.payment_status != PaymentStatus::Pending {
        return Err(PaymentError::NotPending(order.payment_status).into());
    }
    if order.payment_type == PaymentType::Card {
        return Err(PaymentError::ChargeRequired.into());
    }

    let patch = OrderPatch {
        payment_status: Some(PaymentStatus::Completed),
        ..Default::default()
    };
    let order = state.store().update_order(id, &patch).await?;
    info!(order_id = %id, confirmed_by = %caller.subject, "Manual payment confirmed");

    let notifications = notify(state, Event::PaymentConfirmed, &order).await;
    Ok(ReconcileOutcome {
        order,
        already_confirmed: false,
        notifications: Some(notifications),
    })
}

const fn intent_name(intent: &PaymentIntent) -> &'static str {
    match intent {
        PaymentIntent::Card { .. } => "card",
        PaymentIntent::Manual { .. } => "manual",
    }
}

/// Trim caller-supplied strings and reject the unusable ones.
fn normalize_intent(intent: PaymentIntent) -> Result<PaymentIntent, AppError> {
    match intent {
        PaymentIntent::Card {
            token,
            billing_postal_code,
        } => {
            let token = token.trim().to_string();
            if token.is_empty() {
                return Err(AppError::BadRequest("payment token is required".to_string()));
            }
            let billing_postal_code = billing_postal_code
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty());
            if billing_postal_code
                .as_ref()
                .is_some_and(|c| c.len() > MAX_POSTAL_CODE_LEN)
            {
                return Err(AppError::BadRequest("billing postal code is too long".to_string()));
            }
            Ok(PaymentIntent::Card {
                token,
                billing_postal_code,
            })
        }
        PaymentIntent::Manual { reference } => {
            let reference = reference
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty());
            if reference.as_ref().is_some_and(|r| r.len() > MAX_REFERENCE_LEN) {
                return Err(AppError::BadRequest("transfer reference is too long".to_string()));
            }
            Ok(PaymentIntent::Manual { reference })
        }
    }
}

/// Totals from the stored items, never from client-supplied amounts.
fn authoritative_totals(
    state: &AppState,
    items: &[CartLineItem],
    path: PaymentPath,
) -> Result<Totals, PaymentError> {
    let calculator = PricingCalculator::new(items, path, state.config().tax_rate);
    if calculator.has_pending_price(false) {
        return Err(PaymentError::PricePending);
    }
    let totals = calculator.totals();
    if totals.total() <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount(
            "order total must be greater than zero".to_string(),
        ));
    }
    Ok(totals)
}

async fn charge_card(
    state: &AppState,
    order: &Order,
    token: &str,
    totals: &Totals,
) -> Result<ChargeOutcome, PaymentError> {
    let amount_cents = totals
        .total_cents()
        .ok_or_else(|| PaymentError::InvalidAmount(totals.total().to_string()))?;
    let request = ChargeRequest::new(
        token,
        amount_cents,
        &state.config().stripe.currency,
        format!("Order #{}", order.id),
    );

    let result = state.card().charge(&request).await.and_then(|outcome| {
        if outcome.is_success() {
            Ok(outcome)
        } else {
            Err(match outcome.failure_message {
                Some(message) => CardError::Declined(message),
                None => CardError::Unsuccessful(outcome.status),
            })
        }
    });

    result.map_err(|e| {
        warn!(order_id = %order.id, error = %e, "Card charge failed");
        PaymentError::Declined {
            message: e.to_string(),
            order_id: order.id,
        }
    })
}

async fn notify(state: &AppState, event: Event, order: &Order) -> DispatchReport {
    state
        .dispatcher()
        .dispatch(event, Notice::Order(order), order.language)
        .await
}

