//! Order pricing with decimal arithmetic.
//!
//! All money values are [`Decimal`] in the store currency's major unit
//! (dollars, not cents). Rounding to cents happens once, on the tax line.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Sales tax applied to the order subtotal (8%).
pub const TAX_RATE: Decimal = Decimal::from_parts(8, 0, 0, false, 2);

/// Orders with a subtotal strictly above this ship for free.
pub const FREE_SHIPPING_THRESHOLD: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

/// Flat shipping fee charged at or below the free-shipping threshold.
pub const FLAT_SHIPPING_FEE: Decimal = Decimal::from_parts(1000, 0, 0, false, 2);

/// Errors converting an amount to gateway minor units.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    /// The amount is negative.
    #[error("amount cannot be negative")]
    Negative,
    /// The amount does not fit in an `i64` number of cents.
    #[error("amount is too large")]
    Overflow,
}

/// Extended price for a single line: `unit_price × quantity`.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: u32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Convert a major-unit amount into integer minor units (`round(amount × 100)`).
///
/// # Errors
///
/// Returns [`AmountError`] if the amount is negative or too large.
///
/// ```
/// use rust_decimal::Decimal;
/// use tradewind_core::to_minor_units;
///
/// assert_eq!(to_minor_units(Decimal::new(11880, 2)).unwrap(), 11880);
/// ```
pub fn to_minor_units(amount: Decimal) -> Result<i64, AmountError> {
    use rust_decimal::prelude::ToPrimitive;

    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(AmountError::Negative);
    }

    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(AmountError::Overflow)
}

/// Computed monetary totals for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Derive tax, shipping and total from a subtotal.
    ///
    /// ```
    /// use rust_decimal::Decimal;
    /// use tradewind_core::OrderTotals;
    ///
    /// let totals = OrderTotals::from_subtotal(Decimal::new(110, 0));
    /// assert_eq!(totals.tax, Decimal::new(880, 2));
    /// assert_eq!(totals.shipping, Decimal::ZERO);
    /// assert_eq!(totals.total, Decimal::new(11880, 2));
    /// ```
    #[must_use]
    pub fn from_subtotal(subtotal: Decimal) -> Self {
        let tax = (subtotal * TAX_RATE)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        let shipping = if subtotal > FREE_SHIPPING_THRESHOLD {
            Decimal::ZERO
        } else {
            FLAT_SHIPPING_FEE
        };

        Self {
            subtotal,
            tax,
            shipping,
            total: subtotal + tax + shipping,
        }
    }

    /// Compute totals from `(unit_price, quantity)` lines.
    #[must_use]
    pub fn compute<I>(lines: I) -> Self
    where
        I: IntoIterator<Item = (Decimal, u32)>,
    {
        let subtotal = lines
            .into_iter()
            .map(|(price, quantity)| line_total(price, quantity))
            .sum();
        Self::from_subtotal(subtotal)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dollars(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    #[test]
    fn test_constants() {
        assert_eq!(TAX_RATE, dollars(8));
        assert_eq!(FREE_SHIPPING_THRESHOLD, dollars(10_000));
        assert_eq!(FLAT_SHIPPING_FEE, dollars(1000));
    }

    #[test]
    fn test_worked_example() {
        // $30 x 2 + $50 x 1
        let totals = OrderTotals::compute([(dollars(3000), 2), (dollars(5000), 1)]);
        assert_eq!(totals.subtotal, dollars(11_000));
        assert_eq!(totals.tax, dollars(880));
        assert_eq!(totals.shipping, Decimal::ZERO);
        assert_eq!(totals.total, dollars(11_880));
        assert_eq!(to_minor_units(totals.total).unwrap(), 11_880);
    }

    #[test]
    fn test_shipping_threshold_is_strict() {
        let at_threshold = OrderTotals::from_subtotal(dollars(10_000));
        assert_eq!(at_threshold.shipping, FLAT_SHIPPING_FEE);

        let just_over = OrderTotals::from_subtotal(dollars(10_001));
        assert_eq!(just_over.shipping, Decimal::ZERO);
    }

    #[test]
    fn test_total_is_sum_of_parts() {
        for cents in [1, 999, 1299, 4999, 10_000, 10_001, 123_456] {
            let t = OrderTotals::from_subtotal(dollars(cents));
            assert_eq!(t.total, t.subtotal + t.tax + t.shipping);
        }
    }

    #[test]
    fn test_tax_rounds_to_cents() {
        // 12.99 * 0.08 = 1.0392
        let totals = OrderTotals::from_subtotal(dollars(1299));
        assert_eq!(totals.tax, dollars(104));
        assert_eq!(totals.total, dollars(1299 + 104 + 1000));
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(dollars(14_999), 3), dollars(44_997));
        assert_eq!(line_total(dollars(14_999), 0), Decimal::ZERO);
    }

    #[test]
    fn test_to_minor_units_rounds_half_up() {
        assert_eq!(to_minor_units(Decimal::new(10_005, 3)).unwrap(), 1001);
        assert_eq!(to_minor_units(Decimal::ZERO).unwrap(), 0);
        assert_eq!(to_minor_units(dollars(-1)), Err(AmountError::Negative));
    }
}
