use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A transaction amount rounded to cents. Direction lives on `TransactionType`,
/// so validated amounts are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::from(cents) / Decimal::from(100))
    }

    pub fn to_cents(self) -> i64 {
        let cents = (self.0 * Decimal::from(100)).round();
        cents.to_i64().unwrap_or(if cents.is_sign_negative() {
            i64::MIN
        } else {
            i64::MAX
        })
    }

    pub fn from_decimal(decimal: Decimal) -> Self {
        Money(decimal.round_dp(2))
    }

    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn cents_roundtrip() {
        assert_eq!(Money::from_cents(4821).to_cents(), 4821);
        assert_eq!(Money::from_cents(0).to_cents(), 0);
    }

    #[test]
    fn from_decimal_rounds_to_cents() {
        let m = Money::from_decimal(Decimal::from_str("12.345").unwrap());
        assert_eq!(m.to_cents(), 1234);
        assert_eq!(m.to_string(), "12.34");
    }

    #[test]
    fn negative_zero_is_not_negative() {
        let m = Money::from_decimal(Decimal::from_str("-0.00").unwrap());
        assert!(!m.is_negative());
        assert_eq!(m.to_cents(), 0);
        assert!(Money::from_cents(-1).is_negative());
    }
}
