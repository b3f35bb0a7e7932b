//! Status enums for quotes, orders, payments, and callers.
//!
//! Every enum here is persisted as lowercase text; [`std::str::FromStr`] is the
//! inverse of `as_str` so the store can detect corrupted values.

use serde::{Deserialize, Serialize};

/// Implements `as_str`, `Display`, and `FromStr` for a fieldless enum from a
/// single variant/string table.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Persisted / wire representation.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", stringify!($name), ": {}"), s)),
                }
            }
        }
    };
}

/// Lifecycle of a customization quote.
///
/// `pending -> responded -> accepted`, or `pending -> rejected`. Staff may
/// re-respond to a quote they already priced; only finalize moves it to
/// `accepted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    #[default]
    Pending,
    Responded,
    Accepted,
    Rejected,
}

text_enum!(QuoteStatus {
    Pending => "pending",
    Responded => "responded",
    Accepted => "accepted",
    Rejected => "rejected",
});

impl QuoteStatus {
    /// Whether a quote in this status must carry an estimated price.
    #[must_use]
    pub const fn requires_price(&self) -> bool {
        matches!(self, Self::Responded | Self::Accepted)
    }
}

/// Fulfillment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Received,
    Ready,
    Delivered,
}

text_enum!(OrderStatus {
    Received => "received",
    Ready => "ready",
    Delivered => "delivered",
});

impl OrderStatus {
    /// Fulfillment only moves forward: `received -> ready -> delivered`.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Received, Self::Ready | Self::Delivered) | (Self::Ready, Self::Delivered)
        )
    }
}

/// How an order is being paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// Hosted-card tokenized charge.
    Card,
    /// Manual peer-to-peer bank transfer confirmed by staff.
    Zelle,
    /// Created from a quote; payment method not chosen yet.
    ManualQuote,
}

text_enum!(PaymentType {
    Card => "card",
    Zelle => "zelle",
    ManualQuote => "manual_quote",
});

/// Persisted payment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    /// Legacy synonym for `Completed` still present on older rows.
    Paid,
    Failed,
}

text_enum!(PaymentStatus {
    Pending => "pending",
    Completed => "completed",
    Paid => "paid",
    Failed => "failed",
});

/// Reconciliation state derived from `(payment_type, payment_status)`.
///
/// ```text
/// awaiting_payment -> payment_submitted -> payment_confirmed | payment_failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    AwaitingPayment,
    PaymentSubmitted,
    PaymentConfirmed,
    PaymentFailed,
}

impl PaymentState {
    /// Derive the reconciliation state of a stored order.
    #[must_use]
    pub const fn derive(payment_type: PaymentType, payment_status: PaymentStatus) -> Self {
        match (payment_type, payment_status) {
            (_, PaymentStatus::Completed | PaymentStatus::Paid) => Self::PaymentConfirmed,
            (_, PaymentStatus::Failed) => Self::PaymentFailed,
            (PaymentType::Zelle, PaymentStatus::Pending) => Self::PaymentSubmitted,
            (PaymentType::Card | PaymentType::ManualQuote, PaymentStatus::Pending) => {
                Self::AwaitingPayment
            }
        }
    }

    /// Whether funds have been confirmed for this order.
    #[must_use]
    pub const fn is_confirmed(&self) -> bool {
        matches!(self, Self::PaymentConfirmed)
    }
}

text_enum!(PaymentState {
    AwaitingPayment => "awaiting_payment",
    PaymentSubmitted => "payment_submitted",
    PaymentConfirmed => "payment_confirmed",
    PaymentFailed => "payment_failed",
});

/// Role carried by a caller's bearer credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Business owner.
    Owner,
    /// Bakery staff member.
    Employee,
    /// End customer.
    Customer,
}

text_enum!(Role {
    Owner => "owner",
    Employee => "employee",
    Customer => "customer",
});

impl Role {
    /// Owners and employees may act on behalf of any customer.
    #[must_use]
    pub const fn is_staff(&self) -> bool {
        matches!(self, Self::Owner | Self::Employee)
    }
}

/// Language used to render customer-facing notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    Es,
    En,
}

text_enum!(Language {
    Es => "es",
    En => "en",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_text_roundtrip() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            PaymentStatus::Paid,
            PaymentStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<PaymentStatus>().unwrap(), status);
        }
        assert_eq!("manual_quote".parse::<PaymentType>().unwrap(), PaymentType::ManualQuote);
        assert!("bitcoin".parse::<PaymentType>().is_err());
    }

    #[test]
    fn test_serde_matches_text() {
        let json = serde_json::to_string(&PaymentType::ManualQuote).unwrap();
        assert_eq!(json, "\"manual_quote\"");
        let json = serde_json::to_string(&PaymentState::PaymentSubmitted).unwrap();
        assert_eq!(json, "\"payment_submitted\"");
    }

    #[test]
    fn test_payment_state_derivation() {
        use PaymentStatus as S;
        use PaymentType as T;

        assert_eq!(PaymentState::derive(T::Card, S::Pending), PaymentState::AwaitingPayment);
        assert_eq!(
            PaymentState::derive(T::ManualQuote, S::Pending),
            PaymentState::AwaitingPayment
        );
        assert_eq!(PaymentState::derive(T::Zelle, S::Pending), PaymentState::PaymentSubmitted);
        assert_eq!(PaymentState::derive(T::Zelle, S::Completed), PaymentState::PaymentConfirmed);
        assert_eq!(PaymentState::derive(T::Card, S::Paid), PaymentState::PaymentConfirmed);
        assert_eq!(PaymentState::derive(T::Card, S::Failed), PaymentState::PaymentFailed);
    }

    #[test]
    fn test_order_status_moves_forward_only() {
        assert!(OrderStatus::Received.can_transition_to(OrderStatus::Ready));
        assert!(OrderStatus::Ready.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Ready));
        assert!(!OrderStatus::Ready.can_transition_to(OrderStatus::Ready));
    }

    #[test]
    fn test_quote_status_price_requirement() {
        assert!(QuoteStatus::Responded.requires_price());
        assert!(QuoteStatus::Accepted.requires_price());
        assert!(!QuoteStatus::Pending.requires_price());
        assert!(!QuoteStatus::Rejected.requires_price());
    }

    #[test]
    fn test_staff_roles() {
        assert!(Role::Owner.is_staff());
        assert!(Role::Employee.is_staff());
        assert!(!Role::Customer.is_staff());
    }
}
