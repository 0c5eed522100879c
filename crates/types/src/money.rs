//! Fixed-point currency amounts.
//!
//! Every monetary value in the system is an exact decimal rounded to two
//! places using round-half-up (`0.005` becomes `0.01`). Arithmetic on two
//! already-rounded amounts cannot reintroduce extra precision for addition
//! and subtraction, which are the only operations billing performs, so a
//! `Money` is always safe to compare for exact equality.

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Errors that can occur when constructing a [`Money`] value.
#[derive(Debug, thiserror::Error)]
pub enum MoneyError {
    /// The input was empty or not a decimal number
    #[error("not a valid decimal amount: '{0}'")]
    Unparseable(String),
}

/// An exact currency amount with two decimal places.
///
/// Construction always quantises to two decimal places with
/// round-half-up (midpoint away from zero), matching how the billing
/// engine settles visits. Negative amounts are representable so that
/// validation can report them explicitly rather than silently clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    /// The zero amount.
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Parses a decimal string into a `Money`, rounding to two places.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Unparseable` if the trimmed input is empty or
    /// not a plain decimal number.
    pub fn parse(input: &str) -> Result<Self, MoneyError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(MoneyError::Unparseable(input.to_owned()));
        }
        let raw =
            Decimal::from_str(trimmed).map_err(|_| MoneyError::Unparseable(input.to_owned()))?;
        Ok(Self::from_decimal(raw))
    }

    /// Creates a `Money` from an arbitrary decimal, rounding to two places.
    pub fn from_decimal(raw: Decimal) -> Self {
        let mut rounded = raw.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(2);
        Money(rounded)
    }

    /// Convenience constructor from an integer number of currency units.
    pub fn from_units(units: i64) -> Self {
        Self::from_decimal(Decimal::from(units))
    }

    /// Returns the underlying decimal amount (scale 2).
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether this amount is strictly below zero.
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        // Two scale-2 operands always produce a scale-2 sum.
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // Fully qualified: Decimal has inherent byte-level serialize and
        // deserialize methods that would otherwise shadow the serde traits.
        serde::Serialize::serialize(&self.0, serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = <Decimal as serde::Deserialize>::deserialize(deserializer)?;
        Ok(Money::from_decimal(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rounds_half_up_at_two_places() {
        // Midpoints round away from zero, not to even.
        assert_eq!(Money::parse("0.005").unwrap().to_string(), "0.01");
        assert_eq!(Money::parse("0.015").unwrap().to_string(), "0.02");
        assert_eq!(Money::parse("100.005").unwrap().to_string(), "100.01");
        assert_eq!(Money::parse("-0.005").unwrap().to_string(), "-0.01");
    }

    #[test]
    fn test_parse_preserves_exact_two_place_values() {
        assert_eq!(Money::parse("150.00").unwrap().to_string(), "150.00");
        assert_eq!(Money::parse("0.10").unwrap().to_string(), "0.10");
    }

    #[test]
    fn test_parse_rescales_to_two_places() {
        assert_eq!(Money::parse("100").unwrap().to_string(), "100.00");
        assert_eq!(Money::parse("3.5").unwrap().to_string(), "3.50");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in ["", "  ", "abc", "12.3.4", "NaN"] {
            assert!(
                Money::parse(input).is_err(),
                "'{input}' should not parse as money"
            );
        }
    }

    #[test]
    fn test_arithmetic_stays_exact() {
        let total = Money::parse("150.00").unwrap();
        let insurance = Money::parse("100.00").unwrap();
        let self_pay = total - insurance;
        assert_eq!(self_pay, Money::parse("50.00").unwrap());
        assert_eq!(insurance + self_pay, total);
    }

    #[test]
    fn test_serde_round_trip_quantises() {
        let money = Money::parse("150.00").unwrap();
        let json = serde_json::to_string(&money).expect("should serialise");
        assert_eq!(json, "\"150.00\"");

        // Wire input goes through the same quantisation as parsing.
        let back: Money = serde_json::from_str("\"100.005\"").expect("should deserialise");
        assert_eq!(back, Money::parse("100.01").unwrap());
    }

    #[test]
    fn test_negative_detection() {
        assert!(Money::parse("-0.01").unwrap().is_negative());
        assert!(!Money::ZERO.is_negative());
        assert!(!Money::parse("0.00").unwrap().is_negative());
    }
}
