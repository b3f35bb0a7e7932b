//! Pricing calculator for cart line items.
//!
//! The calculator is pure: the same items, payment path, and tax rate always
//! produce the same [`Totals`]. The orders service runs it when a cart is
//! submitted and again when payment is confirmed, against the stored line
//! item snapshot, so the customer-visible total always matches what is charged.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::types::CartLineItem;

/// Payment path that determines whether tax applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPath {
    /// Hosted-card tokenized charge; tax applies.
    Card,
    /// Zero-fee manual bank transfer; tax is always zero.
    ManualTransfer,
}

/// Subtotal, tax, and total for a set of line items.
///
/// Only constructible through [`Totals::new`], which derives `total` so the
/// `total == subtotal + tax` invariant cannot be broken by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    subtotal: Decimal,
    tax: Decimal,
    total: Decimal,
}

impl Totals {
    /// Build totals from a subtotal and tax amount.
    #[must_use]
    pub fn new(subtotal: Decimal, tax: Decimal) -> Self {
        Self {
            subtotal,
            tax,
            total: subtotal.saturating_add(tax),
        }
    }

    /// Totals of zero.
    #[must_use]
    pub fn zero() -> Self {
        Self::new(Decimal::ZERO, Decimal::ZERO)
    }

    /// Sum of known line totals.
    #[must_use]
    pub const fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    /// Tax on the subtotal.
    #[must_use]
    pub const fn tax(&self) -> Decimal {
        self.tax
    }

    /// `subtotal + tax`.
    #[must_use]
    pub const fn total(&self) -> Decimal {
        self.total
    }

    /// Total in integer cents, for the charge provider.
    ///
    /// Returns `None` if the total does not fit in an `i64` or is negative.
    #[must_use]
    pub fn total_cents(&self) -> Option<i64> {
        let cents = self.total.checked_mul(Decimal::ONE_HUNDRED)?.round();
        i64::try_from(cents).ok().filter(|c| *c >= 0)
    }
}

/// Computes totals over a cart.
#[derive(Debug, Clone, Copy)]
pub struct PricingCalculator<'a> {
    items: &'a [CartLineItem],
    path: PaymentPath,
    tax_rate: Decimal,
}

impl<'a> PricingCalculator<'a> {
    /// Create a calculator for `items` paid through `path`.
    ///
    /// `tax_rate` is a fraction (e.g. `0.0825` for 8.25%).
    #[must_use]
    pub const fn new(items: &'a [CartLineItem], path: PaymentPath, tax_rate: Decimal) -> Self {
        Self {
            items,
            path,
            tax_rate,
        }
    }

    /// Sum of `unit_price * quantity` over priced items. Pending items add zero.
    ///
    /// Saturates at `Decimal::MAX`, which no charge accepts.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items
            .iter()
            .map(CartLineItem::line_total)
            .fold(Decimal::ZERO, Decimal::saturating_add)
            .round_dp(2)
    }

    /// Tax at the fixed rate, rounded to cents; zero on the manual-transfer path.
    #[must_use]
    pub fn tax(&self) -> Decimal {
        match self.path {
            PaymentPath::ManualTransfer => Decimal::ZERO,
            PaymentPath::Card => self
                .subtotal()
                .saturating_mul(self.tax_rate)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        }
    }

    /// `subtotal() + tax()`.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.totals().total()
    }

    /// All three amounts at once.
    #[must_use]
    pub fn totals(&self) -> Totals {
        Totals::new(self.subtotal(), self.tax())
    }

    /// Whether any item still lacks a price.
    ///
    /// `superseded_by_priced_order` is true when an existing, already-priced
    /// order stands in for this cart; such an order never reads as pending,
    /// whatever flags its original cart items carried.
    #[must_use]
    pub fn has_pending_price(&self, superseded_by_priced_order: bool) -> bool {
        !superseded_by_priced_order && self.items.iter().any(CartLineItem::is_price_pending)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::dec;

    use super::*;

    fn rate() -> Decimal {
        dec!(0.0825)
    }

    fn cart() -> Vec<CartLineItem> {
        vec![
            CartLineItem::priced("Tres Leches", dec!(5.00), 2),
            CartLineItem::priced("Concha", dec!(1.25), 3),
        ]
    }

    #[test]
    fn test_tres_leches_manual_transfer_scenario() {
        let items = vec![CartLineItem::priced("Tres Leches", dec!(5.00), 2)];
        let calc = PricingCalculator::new(&items, PaymentPath::ManualTransfer, rate());
        assert_eq!(calc.subtotal(), dec!(10.00));
        assert_eq!(calc.tax(), dec!(0.00));
        assert_eq!(calc.total(), dec!(10.00));
    }

    #[test]
    fn test_card_path_applies_tax() {
        let items = cart();
        let calc = PricingCalculator::new(&items, PaymentPath::Card, rate());
        assert_eq!(calc.subtotal(), dec!(13.75));
        // 13.75 * 0.0825 = 1.134375 -> 1.13
        assert_eq!(calc.tax(), dec!(1.13));
        assert_eq!(calc.total(), dec!(14.88));
    }

    #[test]
    fn test_total_is_always_subtotal_plus_tax() {
        let carts = [
            cart(),
            vec![CartLineItem::priced("Pan de muerto", dec!(3.33), 7)],
            vec![
                CartLineItem::pending("Custom cake", 1),
                CartLineItem::priced("Flan", dec!(4.99), 1),
            ],
            vec![],
        ];
        for items in &carts {
            for path in [PaymentPath::Card, PaymentPath::ManualTransfer] {
                let calc = PricingCalculator::new(items, path, rate());
                assert_eq!(calc.total(), calc.subtotal() + calc.tax());
                if path == PaymentPath::ManualTransfer {
                    assert_eq!(calc.tax(), Decimal::ZERO);
                }
            }
        }
    }

    #[test]
    fn test_pending_items_contribute_zero() {
        let items = vec![
            CartLineItem::pending("Custom cake", 1),
            CartLineItem::priced("Flan", dec!(4.00), 1),
        ];
        let calc = PricingCalculator::new(&items, PaymentPath::Card, rate());
        assert_eq!(calc.subtotal(), dec!(4.00));
        assert!(calc.has_pending_price(false));
    }

    #[test]
    fn test_priced_order_supersedes_pending_flags() {
        let items = vec![CartLineItem::pending("Custom cake", 1)];
        let calc = PricingCalculator::new(&items, PaymentPath::Card, rate());
        assert!(calc.has_pending_price(false));
        assert!(!calc.has_pending_price(true));
    }

    #[test]
    fn test_tax_midpoint_rounds_away_from_zero() {
        // 10.00 * 0.0825 = 0.825 -> 0.83
        let items = vec![CartLineItem::priced("Pastel", dec!(10.00), 1)];
        let calc = PricingCalculator::new(&items, PaymentPath::Card, rate());
        assert_eq!(calc.tax(), dec!(0.83));
    }

    #[test]
    fn test_total_cents() {
        assert_eq!(Totals::new(dec!(14.88), dec!(0)).total_cents(), Some(1488));
        assert_eq!(Totals::new(dec!(10), dec!(0.83)).total_cents(), Some(1083));
        assert_eq!(Totals::new(dec!(-1), dec!(0)).total_cents(), None);
    }

    #[test]
    fn test_oversized_cart_saturates_instead_of_panicking() {
        let items = vec![
            CartLineItem::priced("Pastel", Decimal::MAX, 2),
            CartLineItem::priced("Flan", Decimal::MAX, 1),
        ];
        let calc = PricingCalculator::new(&items, PaymentPath::Card, rate());
        let totals = calc.totals();
        assert_eq!(totals.subtotal(), Decimal::MAX);
        assert_eq!(totals.total(), Decimal::MAX);
        assert_eq!(totals.total_cents(), None);
    }
}
