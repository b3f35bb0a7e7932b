//! Cart line items.

use std::collections::BTreeMap;

use rust_decimal::{Decimal, dec};
use serde::{Deserialize, Serialize};

/// Highest unit price a cart may carry.
pub const MAX_UNIT_PRICE: Decimal = dec!(100_000);
/// Most units of one item in a single cart.
pub const MAX_QUANTITY: u32 = 1_000;

/// Validation errors for a [`CartLineItem`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LineItemError {
    /// The item name is empty.
    #[error("item name cannot be empty")]
    EmptyName,
    /// The quantity is zero.
    #[error("quantity for '{0}' must be at least 1")]
    ZeroQuantity(String),
    /// The unit price is negative.
    #[error("price for '{0}' cannot be negative")]
    NegativePrice(String),
    /// The unit price is above [`MAX_UNIT_PRICE`].
    #[error("price for '{0}' is above the {max} limit", max = MAX_UNIT_PRICE)]
    PriceTooHigh(String),
    /// The quantity is above [`MAX_QUANTITY`].
    #[error("quantity for '{0}' is above the {max} limit", max = MAX_QUANTITY)]
    QuantityTooLarge(String),
    /// A price-less item carries neither a label nor the pending flag.
    #[error("'{0}' has no price and is not marked as pending a quote")]
    UnlabelledPendingPrice(String),
}

/// One line of a cart, copied by value into an order at write time.
///
/// A `None` unit price means the item is awaiting a quote. Such items must
/// carry either `price_label` or `pending_price` so they never render as a
/// silent `$0.00`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    /// Display name (e.g. "Tres Leches").
    pub name: String,
    /// Unit price in dollars; `None` while the price is pending.
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    /// Number of units.
    pub quantity: u32,
    /// Free-form customization (flavor, filling, inscription, ...).
    #[serde(default)]
    pub customization: BTreeMap<String, String>,
    /// Pointer to a customer-uploaded reference photo.
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Human-readable price text shown instead of a number (e.g. "Desde $45").
    #[serde(default)]
    pub price_label: Option<String>,
    /// Explicit "price to be quoted" marker.
    #[serde(default)]
    pub pending_price: bool,
}

impl CartLineItem {
    /// A priced item with no customization.
    #[must_use]
    pub fn priced(name: impl Into<String>, unit_price: Decimal, quantity: u32) -> Self {
        Self {
            name: name.into(),
            unit_price: Some(unit_price),
            quantity,
            customization: BTreeMap::new(),
            photo_url: None,
            price_label: None,
            pending_price: false,
        }
    }

    /// An item whose price will be set by a quote.
    #[must_use]
    pub fn pending(name: impl Into<String>, quantity: u32) -> Self {
        Self {
            unit_price: None,
            pending_price: true,
            ..Self::priced(name, Decimal::ZERO, quantity)
        }
    }

    /// Validate the item's invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), LineItemError> {
        if self.name.trim().is_empty() {
            return Err(LineItemError::EmptyName);
        }
        if self.quantity == 0 {
            return Err(LineItemError::ZeroQuantity(self.name.clone()));
        }
        if self.quantity > MAX_QUANTITY {
            return Err(LineItemError::QuantityTooLarge(self.name.clone()));
        }
        match self.unit_price {
            Some(price) if price.is_sign_negative() && !price.is_zero() => {
                Err(LineItemError::NegativePrice(self.name.clone()))
            }
            Some(price) if price > MAX_UNIT_PRICE => {
                Err(LineItemError::PriceTooHigh(self.name.clone()))
            }
            None if !self.pending_price && self.price_label.is_none() => {
                Err(LineItemError::UnlabelledPendingPrice(self.name.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Whether this item still needs a price.
    #[must_use]
    pub const fn is_price_pending(&self) -> bool {
        self.unit_price.is_none()
    }

    /// `unit_price * quantity`, or zero while the price is pending.
    ///
    /// Saturates instead of overflowing; [`validate`](Self::validate) keeps
    /// real carts far below that point.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price.map_or(Decimal::ZERO, |price| {
            price.saturating_mul(Decimal::from(self.quantity))
        })
    }

    /// Price text for notifications and receipts.
    #[must_use]
    pub fn display_price(&self) -> String {
        match (&self.unit_price, &self.price_label) {
            (Some(price), _) => format!("${:.2}", price.round_dp(2)),
            (None, Some(label)) => label.clone(),
            (None, None) => "Pending quote".to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_line_total() {
        let item = CartLineItem::priced("Tres Leches", dec!(5.00), 2);
        assert_eq!(item.line_total(), dec!(10.00));
        assert_eq!(CartLineItem::pending("Custom cake", 1).line_total(), Decimal::ZERO);
    }

    #[test]
    fn test_validate_rejects_unlabelled_missing_price() {
        let mut item = CartLineItem::pending("Custom cake", 1);
        item.pending_price = false;
        assert_eq!(
            item.validate(),
            Err(LineItemError::UnlabelledPendingPrice("Custom cake".to_string()))
        );

        item.price_label = Some("Desde $45".to_string());
        assert!(item.validate().is_ok());
    }

    #[test]
    fn test_validate_quantity_and_price() {
        assert!(matches!(
            CartLineItem::priced("Concha", dec!(1.50), 0).validate(),
            Err(LineItemError::ZeroQuantity(_))
        ));
        assert!(matches!(
            CartLineItem::priced("Concha", dec!(-1), 1).validate(),
            Err(LineItemError::NegativePrice(_))
        ));
        assert!(matches!(
            CartLineItem::priced("  ", dec!(1), 1).validate(),
            Err(LineItemError::EmptyName)
        ));
    }

    #[test]
    fn test_validate_upper_bounds() {
        assert!(CartLineItem::priced("Pastel de boda", MAX_UNIT_PRICE, MAX_QUANTITY)
            .validate()
            .is_ok());
        assert!(matches!(
            CartLineItem::priced("Pastel", Decimal::MAX, 2).validate(),
            Err(LineItemError::PriceTooHigh(_))
        ));
        assert!(matches!(
            CartLineItem::priced("Concha", dec!(1.50), MAX_QUANTITY + 1).validate(),
            Err(LineItemError::QuantityTooLarge(_))
        ));
    }

    #[test]
    fn test_line_total_saturates() {
        let item = CartLineItem::priced("Pastel", Decimal::MAX, 2);
        assert_eq!(item.line_total(), Decimal::MAX);
    }

    #[test]
    fn test_display_price_never_reads_zero_when_pending() {
        assert_eq!(CartLineItem::pending("Custom cake", 1).display_price(), "Pending quote");
        let mut labelled = CartLineItem::pending("Custom cake", 1);
        labelled.price_label = Some("Desde $45".to_string());
        assert_eq!(labelled.display_price(), "Desde $45");
        assert_eq!(CartLineItem::priced("Flan", dec!(4.5), 1).display_price(), "$4.50");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let item: CartLineItem =
            serde_json::from_str(r#"{"name":"Tres Leches","unit_price":"5.00","quantity":2}"#)
                .unwrap();
        assert_eq!(item.unit_price, Some(dec!(5.00)));
        assert!(item.customization.is_empty());
        assert!(!item.pending_price);
    }
}
