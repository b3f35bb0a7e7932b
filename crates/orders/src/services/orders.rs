//! Order submission, reads and fulfillment status.

use chrono::NaiveDate;
use panaderia_core::{
    CartLineItem, Language, OrderId, OrderStatus, PaymentPath, PaymentStatus, PaymentType,
    PricingCalculator, Section, Totals, codec,
};
use serde::Deserialize;
use tracing::{info, instrument};

use super::{CustomerInput, non_blank, resolve_owner};
use crate::auth::Caller;
use crate::db::models::CustomerContact;
use crate::db::{NewOrder, Order, OrderPatch};
use crate::error::AppError;
use crate::notifications::{DispatchReport, Event, Notice};
use crate::state::AppState;

const MAX_ITEMS: usize = 100;
const MAX_NOTES_LEN: usize = 4_000;

/// A cart as submitted by a client.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderDraft {
    pub customer: CustomerInput,
    /// Customer the order belongs to. Only staff may set someone else.
    #[serde(default)]
    pub owner_id: Option<String>,
    pub items: Vec<CartLineItem>,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default)]
    pub pickup_date: Option<NaiveDate>,
    #[serde(default)]
    pub pickup_time: Option<String>,
    #[serde(default)]
    pub special_requests: Option<String>,
}

/// A draft that passed validation. Nothing has been persisted yet.
#[derive(Debug, Clone)]
pub struct ValidDraft {
    pub owner_id: Option<String>,
    pub customer: CustomerContact,
    pub items: Vec<CartLineItem>,
    pub language: Language,
    pub pickup_date: Option<NaiveDate>,
    pub pickup_time: Option<String>,
    pub special_requests: Option<String>,
}

impl OrderDraft {
    /// Validate identity and items before any store or provider call.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for malformed input, `Forbidden` if a customer
    /// names another owner.
    pub fn validate(self, caller: &Caller) -> Result<ValidDraft, AppError> {
        let customer = self.customer.validate()?;
        let owner_id = resolve_owner(caller, self.owner_id.as_deref())?;

        if self.items.is_empty() {
            return Err(AppError::BadRequest("order has no items".to_string()));
        }
        if self.items.len() > MAX_ITEMS {
            return Err(AppError::BadRequest(format!("order has more than {MAX_ITEMS} items")));
        }
        for item in &self.items {
            item.validate()
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
        }

        let special_requests = non_blank(self.special_requests.as_deref());
        if special_requests.is_some_and(|s| s.len() > MAX_NOTES_LEN) {
            return Err(AppError::BadRequest("special requests are too long".to_string()));
        }
        // Stored through the codec so customer text never reads as metadata.
        let special_requests = special_requests
            .map(|s| codec::encode(&[Section::CustomerNotes(s.to_string())]));

        Ok(ValidDraft {
            owner_id,
            customer,
            items: self.items,
            language: self.language.unwrap_or_default(),
            pickup_date: self.pickup_date,
            pickup_time: non_blank(self.pickup_time.as_deref()).map(String::from),
            special_requests,
        })
    }
}

impl ValidDraft {
    /// Record to insert, with amounts computed by the caller.
    #[must_use]
    pub fn into_new_order(
        self,
        totals: Totals,
        payment_type: PaymentType,
        payment_status: PaymentStatus,
        payment_reference: Option<String>,
        billing_postal_code: Option<String>,
    ) -> NewOrder {
        NewOrder {
            owner_id: self.owner_id,
            customer: self.customer,
            billing_postal_code,
            language: self.language,
            items: self.items,
            totals,
            pickup_date: self.pickup_date,
            pickup_time: self.pickup_time,
            special_requests: self.special_requests,
            status: OrderStatus::Received,
            payment_type,
            payment_status,
            payment_reference,
        }
    }
}

/// Create-or-update request. With `order_id` the order is changed in place.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRequest {
    #[serde(default)]
    pub order_id: Option<OrderId>,
    /// Payment path used to price the cart; card unless stated.
    #[serde(default)]
    pub payment_method: Option<PaymentPath>,
    #[serde(flatten)]
    pub draft: OrderDraft,
}

/// Payment type implied by a cart: a quote until every item has a price.
const fn payment_type_for(path: PaymentPath, pending_price: bool) -> PaymentType {
    match (pending_price, path) {
        (true, _) => PaymentType::ManualQuote,
        (false, PaymentPath::Card) => PaymentType::Card,
        (false, PaymentPath::ManualTransfer) => PaymentType::Zelle,
    }
}

const fn path_for(payment_type: PaymentType) -> PaymentPath {
    match payment_type {
        PaymentType::Card => PaymentPath::Card,
        PaymentType::Zelle | PaymentType::ManualQuote => PaymentPath::ManualTransfer,
    }
}

/// Persist a cart as an unpaid order, or replace the cart of an existing one.
///
/// No payment is taken and nobody is notified.
///
/// # Errors
///
/// - `BadRequest` for invalid input
/// - `Forbidden` if a customer targets an order they do not own
/// - `NotFound` if `order_id` does not exist
/// - `Conflict` if the order is already paid, or a customer targets an order
///   priced by a quote
#[instrument(skip(state, caller, request), fields(caller = %caller.subject, order_id = ?request.order_id))]
pub async fn create_or_update(
    state: &AppState,
    caller: &Caller,
    request: OrderRequest,
) -> Result<Order, AppError> {
    let draft = request.draft.validate(caller)?;
    let tax_rate = state.config().tax_rate;

    let Some(id) = request.order_id else {
        let path = request.payment_method.unwrap_or(PaymentPath::Card);
        let calculator = PricingCalculator::new(&draft.items, path, tax_rate);
        let payment_type = payment_type_for(path, calculator.has_pending_price(false));
        let totals = calculator.totals();

        let order = state
            .store()
            .insert_order(&draft.into_new_order(
                totals,
                payment_type,
                PaymentStatus::Pending,
                None,
                None,
            ))
            .await?;
        info!(order_id = %order.id, payment_type = %order.payment_type, total = %order.total, "Order created");
        return Ok(order);
    };

    let existing = state
        .store()
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    caller.require_owner_or_staff(existing.is_owned_by(&caller.subject))?;
    if existing.payment_state().is_confirmed() {
        return Err(AppError::Conflict(
            "order is already paid and can no longer change".to_string(),
        ));
    }
    if existing.is_quote_priced() && !caller.is_staff() {
        return Err(AppError::Conflict(
            "order was priced by a quote and only staff can change it".to_string(),
        ));
    }

    let path = request
        .payment_method
        .unwrap_or_else(|| path_for(existing.payment_type));
    let calculator = PricingCalculator::new(&draft.items, path, tax_rate);
    let patch = OrderPatch {
        customer: Some(draft.customer),
        language: Some(draft.language),
        amounts: Some(calculator.totals()),
        payment_type: Some(payment_type_for(path, calculator.has_pending_price(false))),
        pickup_date: draft.pickup_date,
        pickup_time: draft.pickup_time,
        special_requests: draft.special_requests,
        items: Some(draft.items),
        ..Default::default()
    };

    let order = state.store().update_order(id, &patch).await?;
    info!(order_id = %order.id, total = %order.total, "Order updated");
    Ok(order)
}

/// Fetch an order the caller may see.
///
/// # Errors
///
/// Returns `NotFound` or `Forbidden`.
pub async fn get(state: &AppState, caller: &Caller, id: OrderId) -> Result<Order, AppError> {
    let order = state
        .store()
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    caller.require_owner_or_staff(order.is_owned_by(&caller.subject))?;
    Ok(order)
}

/// Move an order forward through fulfillment. Staff only.
///
/// Reaching `ready` notifies the customer.
///
/// # Errors
///
/// - `Forbidden` for non-staff callers
/// - `NotFound` if the order does not exist
/// - `Conflict` if the move is not forward
#[instrument(skip(state, caller), fields(caller = %caller.subject, order_id = %id, status = %status))]
pub async fn update_status(
    state: &AppState,
    caller: &Caller,
    id: OrderId,
    status: OrderStatus,
) -> Result<(Order, Option<DispatchReport>), AppError> {
    caller.require_staff()?;

    let existing = state
        .store()
        .get_order(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id}")))?;
    if !existing.status.can_transition_to(status) {
        return Err(AppError::Conflict(format!(
            "cannot move order from {} to {status}",
            existing.status
        )));
    }

    let patch = OrderPatch {
        status: Some(status),
        ..Default::default()
    };
    let order = state.store().update_order(id, &patch).await?;
    info!(order_id = %id, from = %existing.status, to = %status, "Order status changed");

    let notifications = if status == OrderStatus::Ready {
        Some(
            state
                .dispatcher()
                .dispatch(Event::ReadyForPickup, Notice::Order(&order), order.language)
                .await,
        )
    } else {
        None
    };
    Ok((order, notifications))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_price_makes_a_quote_order() {
        assert_eq!(payment_type_for(PaymentPath::Card, true), PaymentType::ManualQuote);
        assert_eq!(payment_type_for(PaymentPath::Card, false), PaymentType::Card);
        assert_eq!(
            payment_type_for(PaymentPath::ManualTransfer, false),
            PaymentType::Zelle
        );
    }

    #[test]
    fn test_path_follows_payment_type() {
        assert_eq!(path_for(PaymentType::Card), PaymentPath::Card);
        assert_eq!(path_for(PaymentType::Zelle), PaymentPath::ManualTransfer);
        assert_eq!(path_for(PaymentType::ManualQuote), PaymentPath::ManualTransfer);
    }
}
