use rust_decimal::{Decimal, RoundingStrategy};
use tracing::warn;

use crate::models::PricingUnit;

/// Subtotal for `quantity` units of a method priced at `rate`.
///
/// Unknown units are priced as a flat rate rather than rejected.
pub fn compute_subtotal(rate: Decimal, unit: PricingUnit, quantity: Decimal) -> Decimal {
    match unit {
        PricingUnit::Fixed | PricingUnit::Unknown => rate,
        PricingUnit::PerLevel | PricingUnit::PerKill | PricingUnit::PerItem | PricingUnit::PerHour => {
            money_mul(rate, quantity)
        }
    }
}

/// `a * b`, saturating at the `Decimal` bounds instead of overflowing
pub fn money_mul(a: Decimal, b: Decimal) -> Decimal {
    a.checked_mul(b).unwrap_or_else(|| {
        warn!(%a, %b, "Monetary multiplication overflowed, saturating");
        a.saturating_mul(b)
    })
}

/// `a + b`, saturating at the `Decimal` bounds instead of overflowing
pub fn money_add(a: Decimal, b: Decimal) -> Decimal {
    a.checked_add(b).unwrap_or_else(|| {
        warn!(%a, %b, "Monetary addition overflowed, saturating");
        a.saturating_add(b)
    })
}

/// `a - b`, saturating at the `Decimal` bounds instead of overflowing
pub fn money_sub(a: Decimal, b: Decimal) -> Decimal {
    a.checked_sub(b).unwrap_or_else(|| {
        warn!(%a, %b, "Monetary subtraction overflowed, saturating");
        a.saturating_sub(b)
    })
}

/// Round a monetary amount for display (2 dp, halves away from zero)
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
