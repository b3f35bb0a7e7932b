//! Payment reconciliation.
//!
//! Two entry points converge on one order: a tokenized card charge and a
//! customer-declared manual transfer. Both are expressed as a
//! [`PaymentIntent`] and handled by [`reconcile::reconcile`], which re-reads
//! the order, recomputes the amounts from its stored items and writes back
//! only the fields that intent owns.

pub mod reconcile;
pub mod stripe;

use async_trait::async_trait;
use panaderia_core::{OrderId, PaymentPath, PaymentStatus};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use reconcile::{ReconcileOutcome, ReconcileRequest, confirm_payment, reconcile};
pub use stripe::StripeClient;

use crate::db::RepositoryError;

/// Status string the charge provider returns for a captured charge.
pub const SUCCEEDED: &str = "succeeded";

/// Errors from the charge provider.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CardError {
    /// The provider refused the card or token.
    #[error("{0}")]
    Declined(String),

    /// The provider did not answer in time. Treated as not charged.
    #[error("charge request timed out")]
    Timeout,

    /// HTTP request failed.
    #[error("charge request failed: {0}")]
    Request(String),

    /// Failed to parse response.
    #[error("charge response error: {0}")]
    Response(String),

    /// The provider answered with a status other than `succeeded`.
    #[error("charge not completed (status: {0})")]
    Unsuccessful(String),
}

/// A single charge against a single-use token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub token: String,
    pub amount_cents: i64,
    pub currency: String,
    /// Derived from the token; a replayed token maps to the same charge.
    pub idempotency_key: String,
    pub description: String,
}

impl ChargeRequest {
    /// Build a charge whose idempotency key is the SHA-256 of the token.
    #[must_use]
    pub fn new(token: &str, amount_cents: i64, currency: &str, description: String) -> Self {
        Self {
            token: token.to_string(),
            amount_cents,
            currency: currency.to_string(),
            idempotency_key: hex::encode(Sha256::digest(token.as_bytes())),
            description,
        }
    }
}

/// What the provider reported for a charge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChargeOutcome {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub failure_message: Option<String>,
}

impl ChargeOutcome {
    /// Only an explicit `succeeded` counts as payment.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == SUCCEEDED
    }
}

/// Charge provider.
#[async_trait]
pub trait CardProcessor: Send + Sync {
    /// Charge `amount_cents` against a single-use token.
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, CardError>;
}

/// How the customer intends to pay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentIntent {
    /// Tokenized card charge.
    Card {
        token: String,
        billing_postal_code: Option<String>,
    },
    /// Out-of-band transfer confirmed later by staff.
    Manual { reference: Option<String> },
}

impl PaymentIntent {
    /// Pricing path for this intent.
    #[must_use]
    pub const fn path(&self) -> PaymentPath {
        match self {
            Self::Card { .. } => PaymentPath::Card,
            Self::Manual { .. } => PaymentPath::ManualTransfer,
        }
    }
}

/// Reconciliation failures that are not plain store errors.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The charge did not go through; the order stays payable.
    #[error("{message}")]
    Declined { message: String, order_id: OrderId },

    /// Some stored line item has no price yet.
    #[error("order has items still awaiting a price")]
    PricePending,

    /// The recomputed total cannot be charged.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// A staff confirmation hit an order that is not awaiting one.
    #[error("payment is {0}, not pending")]
    NotPending(PaymentStatus),

    /// Card orders are only completed by a successful charge.
    #[error("card orders are confirmed by their charge")]
    ChargeRequired,

    /// Store failure.
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

/// Human-legible manual transfer reference, e.g. `ZL-7K2M9Q`.
#[must_use]
pub fn generate_transfer_reference() -> String {
    use rand::seq::IndexedRandom;

    // Excludes 0, O, 1 and I.
    const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::rng();
    let code: String = (0..6)
        .filter_map(|_| ALPHABET.choose(&mut rng).copied().map(char::from))
        .collect();
    format!("ZL-{code}")
}
