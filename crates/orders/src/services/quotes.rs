//! Quote workflow: submission, staff response, finalization into an order.

use chrono::{NaiveDate, Utc};
use panaderia_core::{
    CartLineItem, Language, MAX_UNIT_PRICE, OrderStatus, PaymentPath, PaymentStatus,
    PaymentType, PricingCalculator, QuoteId, QuoteStatus, Section, codec,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, instrument};

use super::{CustomerInput, non_blank, resolve_owner};
use crate::auth::Caller;
use crate::db::{NewOrder, NewQuote, Order, Quote, QuotePatch};
use crate::error::AppError;
use crate::notifications::{DispatchReport, Event, Notice};
use crate::state::AppState;

const ACCEPTED_STATUS_MESSAGE: &str = "Cotización aceptada, pendiente de pago";
const MAX_TEXT_LEN: usize = 4_000;

/// Quote state-machine violations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuoteError {
    /// A `responded` quote needs a positive estimate.
    #[error("estimated_price greater than zero is required to respond")]
    PriceRequired,

    /// The estimate is above what a single item may cost.
    #[error("estimated_price is above the {max} limit", max = MAX_UNIT_PRICE)]
    PriceTooHigh,

    /// Staff may only answer `responded` or `rejected`.
    #[error("invalid quote response: {0}")]
    InvalidResponse(String),

    /// Finalize needs a quote that staff priced and the customer has not accepted.
    #[error("quote is {0}, not responded")]
    NotResponded(QuoteStatus),

    /// The quote was already accepted or rejected.
    #[error("quote is already {0}")]
    AlreadyClosed(QuoteStatus),
}

/// Customer's quote request.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteSubmission {
    pub customer: CustomerInput,
    #[serde(default)]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default)]
    pub occasion: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub budget: Option<String>,
    #[serde(default)]
    pub servings: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub pickup_date: Option<NaiveDate>,
    #[serde(default)]
    pub pickup_time: Option<String>,
}

/// Staff answer to a quote.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteResponse {
    pub quote_id: QuoteId,
    pub status: QuoteStatus,
    #[serde(default)]
    pub estimated_price: Option<Decimal>,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

/// Customer acceptance of a priced quote.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteFinalization {
    pub quote_id: QuoteId,
    /// Extra instructions to carry onto the order.
    #[serde(default)]
    pub notes: Option<String>,
}

fn optional_text(value: Option<&str>, field: &str) -> Result<Option<String>, AppError> {
    match non_blank(value) {
        Some(text) if text.len() > MAX_TEXT_LEN => {
            Err(AppError::BadRequest(format!("{field} is too long")))
        }
        other => Ok(other.map(String::from)),
    }
}

/// Record a new quote request.
///
/// # Errors
///
/// Returns `BadRequest` for invalid input; a phone number is required.
#[instrument(skip(state, caller, submission), fields(caller = %caller.subject))]
pub async fn submit(
    state: &AppState,
    caller: &Caller,
    submission: QuoteSubmission,
) -> Result<(Quote, DispatchReport), AppError> {
    let customer = submission.customer.validate()?;
    if customer.phone.is_none() {
        return Err(AppError::BadRequest("customer phone is required for a quote".to_string()));
    }
    if submission.servings == Some(0) {
        return Err(AppError::BadRequest("servings must be at least 1".to_string()));
    }

    let new_quote = NewQuote {
        owner_id: resolve_owner(caller, submission.owner_id.as_deref())?,
        customer,
        language: submission.language.unwrap_or_default(),
        occasion: optional_text(submission.occasion.as_deref(), "occasion")?,
        theme: optional_text(submission.theme.as_deref(), "theme")?,
        budget: optional_text(submission.budget.as_deref(), "budget")?,
        servings: submission.servings,
        description: optional_text(submission.description.as_deref(), "description")?,
        photo_url: optional_text(submission.photo_url.as_deref(), "photo_url")?,
        pickup_date: submission.pickup_date,
        pickup_time: optional_text(submission.pickup_time.as_deref(), "pickup_time")?,
    };

    let quote = state.store().insert_quote(&new_quote).await?;
    info!(quote_id = %quote.id, reference = %quote.reference_code(), "Quote submitted");

    let report = state
        .dispatcher()
        .dispatch(Event::QuoteSubmitted, Notice::Quote(&quote), quote.language)
        .await;
    Ok((quote, report))
}

/// Price or decline a quote. Staff only.
///
/// A priced quote may be re-priced until the customer finalizes it.
///
/// # Errors
///
/// - `Forbidden` for non-staff callers
/// - `NotFound` if the quote does not exist
/// - `BadRequest` for a missing price or an unsupported status
/// - `Conflict` if the quote is already accepted or rejected
#[instrument(skip(state, caller, response), fields(caller = %caller.subject, quote_id = %response.quote_id, status = %response.status))]
pub async fn respond(
    state: &AppState,
    caller: &Caller,
    response: QuoteResponse,
) -> Result<(Quote, DispatchReport), AppError> {
    caller.require_staff()?;

    let admin_notes = optional_text(response.admin_notes.as_deref(), "admin_notes")?;
    let now = Utc::now();
    let patch = match response.status {
        QuoteStatus::Responded => match response.estimated_price {
            Some(price) if price > MAX_UNIT_PRICE => return Err(QuoteError::PriceTooHigh.into()),
            Some(price) if price > Decimal::ZERO => {
                QuotePatch::respond(price.round_dp(2), admin_notes, now)
            }
            _ => return Err(QuoteError::PriceRequired.into()),
        },
        QuoteStatus::Rejected => QuotePatch::reject(admin_notes, now),
        other => {
            return Err(QuoteError::InvalidResponse(format!(
                "staff cannot set a quote to {other}"
            ))
            .into());
        }
    };

    let current = state
        .store()
        .get_quote(response.quote_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("quote {}", response.quote_id)))?;
    if matches!(current.status, QuoteStatus::Accepted | QuoteStatus::Rejected) {
        return Err(QuoteError::AlreadyClosed(current.status).into());
    }

    let quote = state.store().update_quote(current.id, &patch).await?;
    info!(
        quote_id = %quote.id,
        status = %quote.status,
        estimated_price = ?quote.estimated_price,
        "Quote answered"
    );

    let report = state
        .dispatcher()
        .dispatch(Event::QuoteResponded, Notice::Quote(&quote), quote.language)
        .await;
    Ok((quote, report))
}

/// Accept a priced quote and turn it into a payable order.
///
/// The order carries one line item at the estimate and the quote's reference
/// code inside its encoded `special_requests`.
///
/// # Errors
///
/// - `Forbidden` if the caller neither owns the quote nor is staff
/// - `NotFound` if the quote does not exist
/// - `Conflict` if the quote is not `responded`
///
/// The quote is claimed before the order is written, so a retry or a racing
/// caller can never produce a second order for it.
#[instrument(skip(state, caller, request), fields(caller = %caller.subject, quote_id = %request.quote_id))]
pub async fn finalize(
    state: &AppState,
    caller: &Caller,
    request: QuoteFinalization,
) -> Result<(Order, Quote, DispatchReport), AppError> {
    let notes = optional_text(request.notes.as_deref(), "notes")?;

    let quote = state
        .store()
        .get_quote(request.quote_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("quote {}", request.quote_id)))?;
    caller.require_owner_or_staff(quote.is_owned_by(&caller.subject))?;

    let price = match (quote.status, quote.estimated_price) {
        (QuoteStatus::Responded, Some(price)) => price,
        (QuoteStatus::Accepted | QuoteStatus::Rejected, _) => {
            return Err(QuoteError::AlreadyClosed(quote.status).into());
        }
        (status, _) => return Err(QuoteError::NotResponded(status).into()),
    };

    // Claim the quote first. Only one caller can move it out of `responded`,
    // so only one order is ever written for it.
    let quote = state
        .store()
        .update_quote(quote.id, &QuotePatch::accept(price))
        .await?;

    let new_order = order_from_quote(state, &quote, price, notes.as_deref());
    let order = match state.store().insert_order(&new_order).await {
        Ok(order) => order,
        Err(e) => {
            if let Err(reopen) = state
                .store()
                .update_quote(quote.id, &QuotePatch::reopen(price))
                .await
            {
                error!(
                    quote_id = %quote.id,
                    error = %reopen,
                    "Quote accepted but has no order and could not be reopened"
                );
            }
            return Err(e.into());
        }
    };
    info!(quote_id = %quote.id, order_id = %order.id, total = %order.total, "Quote finalized");

    let report = state
        .dispatcher()
        .dispatch(Event::PaymentReady, Notice::Order(&order), order.language)
        .await;
    Ok((order, quote, report))
}

/// Fetch a quote the caller may see.
///
/// # Errors
///
/// Returns `NotFound` or `Forbidden`.
pub async fn get(state: &AppState, caller: &Caller, id: QuoteId) -> Result<Quote, AppError> {
    let quote = state
        .store()
        .get_quote(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("quote {id}")))?;
    caller.require_owner_or_staff(quote.is_owned_by(&caller.subject))?;
    Ok(quote)
}

fn order_from_quote(state: &AppState, quote: &Quote, price: Decimal, notes: Option<&str>) -> NewOrder {
    let mut item = CartLineItem::priced(item_name(quote), price, 1);
    item.photo_url.clone_from(&quote.photo_url);
    if let Some(theme) = &quote.theme {
        item.customization.insert("theme".to_string(), theme.clone());
    }
    if let Some(servings) = quote.servings {
        item.customization
            .insert("servings".to_string(), servings.to_string());
    }

    // Not charged yet; the card path adds tax when the customer pays.
    let items = vec![item];
    let totals = PricingCalculator::new(&items, PaymentPath::ManualTransfer, state.config().tax_rate)
        .totals();

    // Metadata leads; customer text follows and notes close the field.
    let mut sections = vec![
        Section::Reference(quote.reference_code()),
        Section::Status(ACCEPTED_STATUS_MESSAGE.to_string()),
        Section::Pickup {
            date: quote.pickup_date.map(|d| d.to_string()),
            time: quote.pickup_time.clone(),
        },
        Section::Separator,
    ];
    if let Some(description) = &quote.description {
        sections.push(Section::Text(description.clone()));
    }
    if let Some(notes) = notes {
        sections.push(Section::CustomerNotes(notes.to_string()));
    }

    NewOrder {
        owner_id: quote.owner_id.clone(),
        customer: quote.customer.clone(),
        billing_postal_code: None,
        language: quote.language,
        items,
        totals,
        pickup_date: quote.pickup_date,
        pickup_time: quote.pickup_time.clone(),
        special_requests: Some(codec::encode(&sections)),
        status: OrderStatus::Received,
        payment_type: PaymentType::ManualQuote,
        payment_status: PaymentStatus::Pending,
        payment_reference: None,
    }
}

fn item_name(quote: &Quote) -> String {
    let kind = match quote.language {
        Language::Es => "Pastel personalizado",
        Language::En => "Custom cake",
    };
    match &quote.occasion {
        Some(occasion) => format!("{kind} ({occasion})"),
        None => kind.to_string(),
    }
}
