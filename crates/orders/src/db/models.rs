//! Order and quote records.

use chrono::{DateTime, NaiveDate, Utc};
use panaderia_core::codec::{self, DecodedMetadata};
use panaderia_core::{
    CartLineItem, Email, Language, OrderId, OrderStatus, PaymentState, PaymentStatus,
    PaymentType, Phone, QuoteId, QuoteStatus, Totals,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order columns that older deployments may not have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionalColumn {
    /// `orders.billing_postal_code`
    BillingPostalCode,
    /// `orders.language`
    Language,
}

impl OptionalColumn {
    /// Every optional order column.
    pub const ALL: [Self; 2] = [Self::BillingPostalCode, Self::Language];

    /// Column name in the `orders` table.
    #[must_use]
    pub const fn column_name(self) -> &'static str {
        match self {
            Self::BillingPostalCode => "billing_postal_code",
            Self::Language => "language",
        }
    }

    /// Look up an optional column by name.
    #[must_use]
    pub fn from_column_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.column_name() == name)
    }
}

/// Values a write carries for the optional columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionalValues {
    pub billing_postal_code: Option<String>,
    pub language: Option<Language>,
}

impl OptionalValues {
    /// Whether the write carries a value for `column`.
    #[must_use]
    pub const fn carries(&self, column: OptionalColumn) -> bool {
        match column {
            OptionalColumn::BillingPostalCode => self.billing_postal_code.is_some(),
            OptionalColumn::Language => self.language.is_some(),
        }
    }
}

/// Contact identity of a customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerContact {
    pub name: String,
    pub email: Option<Email>,
    pub phone: Option<Phone>,
}

/// A persisted, payable order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    /// Subject of the customer credential that owns this order.
    pub owner_id: Option<String>,
    pub customer: CustomerContact,
    pub billing_postal_code: Option<String>,
    pub language: Language,
    /// Snapshot of the cart at write time.
    pub items: Vec<CartLineItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub pickup_date: Option<NaiveDate>,
    pub pickup_time: Option<String>,
    /// Free text; structured parts are read through [`Order::metadata`].
    pub special_requests: Option<String>,
    pub status: OrderStatus,
    pub payment_type: PaymentType,
    pub payment_status: PaymentStatus,
    /// Charge id for card payments, transfer reference for manual ones.
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Stored amounts.
    #[must_use]
    pub fn totals(&self) -> Totals {
        Totals::new(self.subtotal, self.tax)
    }

    /// Reconciliation state derived from the payment columns.
    #[must_use]
    pub const fn payment_state(&self) -> PaymentState {
        PaymentState::derive(self.payment_type, self.payment_status)
    }

    /// Whether staff set the price: a quote order with no item left pending.
    #[must_use]
    pub fn is_quote_priced(&self) -> bool {
        self.payment_type == PaymentType::ManualQuote
            && !self.items.iter().any(CartLineItem::is_price_pending)
    }

    /// Structured metadata embedded in `special_requests`.
    #[must_use]
    pub fn metadata(&self) -> DecodedMetadata {
        codec::decode(self.special_requests.as_deref())
    }

    /// Whether `subject` owns this order.
    #[must_use]
    pub fn is_owned_by(&self, subject: &str) -> bool {
        self.owner_id.as_deref() == Some(subject)
    }

    /// Restore values that were written while their column was omitted.
    pub fn reattach(&mut self, omitted: &[OptionalColumn], values: &OptionalValues) {
        for column in omitted {
            match column {
                OptionalColumn::BillingPostalCode => {
                    if let Some(code) = &values.billing_postal_code {
                        self.billing_postal_code = Some(code.clone());
                    }
                }
                OptionalColumn::Language => {
                    if let Some(language) = values.language {
                        self.language = language;
                    }
                }
            }
        }
    }

    /// Blank out columns the schema does not have.
    pub fn clear_omitted(&mut self, omitted: &[OptionalColumn]) {
        for column in omitted {
            match column {
                OptionalColumn::BillingPostalCode => self.billing_postal_code = None,
                OptionalColumn::Language => self.language = Language::default(),
            }
        }
    }
}

/// Fields for a new order. The store assigns the id and timestamps.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub owner_id: Option<String>,
    pub customer: CustomerContact,
    pub billing_postal_code: Option<String>,
    pub language: Language,
    pub items: Vec<CartLineItem>,
    pub totals: Totals,
    pub pickup_date: Option<NaiveDate>,
    pub pickup_time: Option<String>,
    pub special_requests: Option<String>,
    pub status: OrderStatus,
    pub payment_type: PaymentType,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
}

impl NewOrder {
    /// Values carried for the optional columns.
    #[must_use]
    pub fn optional_values(&self) -> OptionalValues {
        OptionalValues {
            billing_postal_code: self.billing_postal_code.clone(),
            language: Some(self.language),
        }
    }
}

/// Partial update of an order. `None` leaves a field unchanged.
///
/// `items` and `amounts` are written in the same statement as the payment
/// fields, so a reader never sees a new status with stale amounts.
#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    pub customer: Option<CustomerContact>,
    pub billing_postal_code: Option<String>,
    pub language: Option<Language>,
    pub items: Option<Vec<CartLineItem>>,
    pub amounts: Option<Totals>,
    pub pickup_date: Option<NaiveDate>,
    pub pickup_time: Option<String>,
    pub special_requests: Option<String>,
    pub status: Option<OrderStatus>,
    pub payment_type: Option<PaymentType>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_reference: Option<String>,
}

impl OrderPatch {
    /// Values carried for the optional columns.
    #[must_use]
    pub fn optional_values(&self) -> OptionalValues {
        OptionalValues {
            billing_postal_code: self.billing_postal_code.clone(),
            language: self.language,
        }
    }

    /// Whether the patch changes nothing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.customer.is_none()
            && self.billing_postal_code.is_none()
            && self.language.is_none()
            && self.items.is_none()
            && self.amounts.is_none()
            && self.pickup_date.is_none()
            && self.pickup_time.is_none()
            && self.special_requests.is_none()
            && self.status.is_none()
            && self.payment_type.is_none()
            && self.payment_status.is_none()
            && self.payment_reference.is_none()
    }

    /// Apply the patch to an in-memory record, skipping omitted columns.
    pub fn apply_to(&self, order: &mut Order, omitted: &[OptionalColumn]) {
        if let Some(customer) = &self.customer {
            order.customer = customer.clone();
        }
        if !omitted.contains(&OptionalColumn::BillingPostalCode)
            && let Some(code) = &self.billing_postal_code
        {
            order.billing_postal_code = Some(code.clone());
        }
        if !omitted.contains(&OptionalColumn::Language)
            && let Some(language) = self.language
        {
            order.language = language;
        }
        if let Some(items) = &self.items {
            order.items = items.clone();
        }
        if let Some(amounts) = self.amounts {
            order.subtotal = amounts.subtotal();
            order.tax = amounts.tax();
            order.total = amounts.total();
        }
        if let Some(date) = self.pickup_date {
            order.pickup_date = Some(date);
        }
        if let Some(time) = &self.pickup_time {
            order.pickup_time = Some(time.clone());
        }
        if let Some(text) = &self.special_requests {
            order.special_requests = Some(text.clone());
        }
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(payment_type) = self.payment_type {
            order.payment_type = payment_type;
        }
        if let Some(payment_status) = self.payment_status {
            order.payment_status = payment_status;
        }
        if let Some(reference) = &self.payment_reference {
            order.payment_reference = Some(reference.clone());
        }
    }
}

/// A customization quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub id: QuoteId,
    pub owner_id: Option<String>,
    pub customer: CustomerContact,
    pub language: Language,
    pub occasion: Option<String>,
    pub theme: Option<String>,
    pub budget: Option<String>,
    pub servings: Option<u32>,
    /// What the customer asked for, in their words.
    pub description: Option<String>,
    pub photo_url: Option<String>,
    pub pickup_date: Option<NaiveDate>,
    pub pickup_time: Option<String>,
    pub status: QuoteStatus,
    /// Set if and only if `status` is `responded` or `accepted`.
    pub estimated_price: Option<Decimal>,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl Quote {
    /// `QT-000123` style reference shown to customers and staff.
    #[must_use]
    pub fn reference_code(&self) -> String {
        self.id.reference_code()
    }

    /// Whether `subject` owns this quote.
    #[must_use]
    pub fn is_owned_by(&self, subject: &str) -> bool {
        self.owner_id.as_deref() == Some(subject)
    }
}

/// Fields for a new quote. New quotes always start `pending` with no price.
#[derive(Debug, Clone)]
pub struct NewQuote {
    pub owner_id: Option<String>,
    pub customer: CustomerContact,
    pub language: Language,
    pub occasion: Option<String>,
    pub theme: Option<String>,
    pub budget: Option<String>,
    pub servings: Option<u32>,
    pub description: Option<String>,
    pub photo_url: Option<String>,
    pub pickup_date: Option<NaiveDate>,
    pub pickup_time: Option<String>,
}

/// Status change of a quote.
///
/// Status and price are always written together so the price invariant holds
/// after every update. Build one with [`QuotePatch::respond`],
/// [`QuotePatch::reject`] or [`QuotePatch::accept`].
/// Quote transition. It applies only while the stored status is one of
/// `from`; otherwise the backend answers [`RepositoryError::Conflict`].
///
/// [`RepositoryError::Conflict`]: super::RepositoryError::Conflict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotePatch {
    pub from: &'static [QuoteStatus],
    pub status: QuoteStatus,
    pub estimated_price: Option<Decimal>,
    /// `None` leaves existing notes unchanged.
    pub admin_notes: Option<String>,
    /// `None` leaves the existing timestamp unchanged.
    pub responded_at: Option<DateTime<Utc>>,
}

/// Statuses staff may still answer.
const OPEN: &[QuoteStatus] = &[QuoteStatus::Pending, QuoteStatus::Responded];

impl QuotePatch {
    /// Staff priced the quote.
    #[must_use]
    pub fn respond(price: Decimal, admin_notes: Option<String>, at: DateTime<Utc>) -> Self {
        Self {
            from: OPEN,
            status: QuoteStatus::Responded,
            estimated_price: Some(price),
            admin_notes,
            responded_at: Some(at),
        }
    }

    /// Staff declined the quote; any previous price is cleared.
    #[must_use]
    pub const fn reject(admin_notes: Option<String>, at: DateTime<Utc>) -> Self {
        Self {
            from: OPEN,
            status: QuoteStatus::Rejected,
            estimated_price: None,
            admin_notes,
            responded_at: Some(at),
        }
    }

    /// Customer accepted the estimate.
    #[must_use]
    pub const fn accept(price: Decimal) -> Self {
        Self {
            from: &[QuoteStatus::Responded],
            status: QuoteStatus::Accepted,
            estimated_price: Some(price),
            admin_notes: None,
            responded_at: None,
        }
    }

    /// Undo an acceptance whose order could not be written.
    #[must_use]
    pub const fn reopen(price: Decimal) -> Self {
        Self {
            from: &[QuoteStatus::Accepted],
            status: QuoteStatus::Responded,
            estimated_price: Some(price),
            admin_notes: None,
            responded_at: None,
        }
    }

    /// Whether the transition may leave `current`.
    #[must_use]
    pub fn allows(&self, current: QuoteStatus) -> bool {
        self.from.contains(&current)
    }

    /// Apply the patch to an in-memory record.
    pub fn apply_to(&self, quote: &mut Quote) {
        quote.status = self.status;
        quote.estimated_price = self.estimated_price;
        if let Some(notes) = &self.admin_notes {
            quote.admin_notes = Some(notes.clone());
        }
        if let Some(at) = self.responded_at {
            quote.responded_at = Some(at);
        }
    }
}
