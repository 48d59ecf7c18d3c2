//! Money amounts using decimal arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount in the store's settlement currency (INR).
///
/// Wraps [`rust_decimal::Decimal`] so order amounts, declared values and
/// collect-on-delivery amounts never go through floating point.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Wrap a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Get the underlying decimal value.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether this amount is strictly greater than zero.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Subtract `other`, clamping at zero.
    ///
    /// Used for outstanding-balance math where an over-payment must not
    /// produce a negative collectable amount.
    #[must_use]
    pub fn saturating_sub(&self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - other.0)
        }
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl From<i64> for Money {
    fn from(amount: i64) -> Self {
        Self(Decimal::from(amount))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_two_decimal_places() {
        assert_eq!(Money::from(600).to_string(), "600.00");
    }

    #[test]
    fn test_saturating_sub() {
        let total = Money::from(1000);
        let paid = Money::from(400);
        assert_eq!(total.saturating_sub(paid), Money::from(600));
        assert_eq!(paid.saturating_sub(total), Money::ZERO);
    }

    #[test]
    fn test_is_positive() {
        assert!(Money::from(1).is_positive());
        assert!(!Money::ZERO.is_positive());
    }
}
