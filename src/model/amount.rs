//! Amount type for monetary values exchanged with the expense service.
//!
//! The service sends decimals either as JSON strings (`"87.43"`) or, for aggregates, as JSON
//! numbers (`87.43`). We accept both, always send a plain decimal string back, and display amounts
//! as US currency.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Represents a dollar amount.
///
/// # Examples
///
/// Parsing user input, with or without a dollar sign and commas:
/// ```
/// # use expense_sync::model::Amount;
/// # use std::str::FromStr;
/// let a = Amount::from_str("$1,234.5").unwrap();
/// let b = Amount::from_str("1234.50").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "$1,234.50");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    /// The value rounded to cents, as sent to the service, e.g. `"87.40"`.
    pub fn to_wire(&self) -> String {
        let mut rounded = self.0.round_dp(2);
        rounded.rescale(2);
        rounded.to_string()
    }
}

/// An error that can occur when parsing strings into `Amount` values.
pub enum AmountError {
    Empty,
    Invalid(rust_decimal::Error),
}

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::Empty => f.write_str("Empty"),
            AmountError::Invalid(e) => Debug::fmt(e, f),
        }
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::Empty => f.write_str("An amount is required"),
            AmountError::Invalid(e) => Display::fmt(e, f),
        }
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AmountError::Empty => None,
            AmountError::Invalid(e) => Some(e),
        }
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AmountError::Empty);
        }

        // "-$50.00", "$50.00", "-50.00" and "50.00" are all accepted
        let without_dollar = if let Some(after_minus) = trimmed.strip_prefix('-') {
            match after_minus.strip_prefix('$') {
                Some(after_dollar) => format!("-{after_dollar}"),
                None => trimmed.to_string(),
            }
        } else if let Some(after_dollar) = trimmed.strip_prefix('$') {
            after_dollar.to_string()
        } else {
            trimmed.to_string()
        };

        let without_commas = without_dollar.replace(',', "");
        let value = Decimal::from_str(&without_commas).map_err(AmountError::Invalid)?;
        Ok(Amount(value))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (sign, num) = if self.is_negative() {
            ("-", self.0.abs())
        } else {
            ("", self.0)
        };
        write!(
            f,
            "{sign}${}",
            format_num::format_num!(",.2", num.to_f64().unwrap_or_default())
        )
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_wire())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Decimal's own deserializer accepts strings, integers and floats.
        <Decimal as Deserialize>::deserialize(deserializer).map(Amount)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_with_dollar_sign() {
        let amount = Amount::from_str("$50.00").unwrap();
        assert_eq!(amount.value(), dec("50.00"));
    }

    #[test]
    fn test_parse_negative_with_dollar_sign() {
        let amount = Amount::from_str("-$50.00").unwrap();
        assert_eq!(amount.value(), dec("-50.00"));
    }

    #[test]
    fn test_parse_empty_string_is_an_error() {
        let e = Amount::from_str("  ").unwrap_err();
        assert_eq!(e.to_string(), "An amount is required");
        assert!(Amount::from_str("").is_err());
    }

    #[test]
    fn test_parse_multiple_commas() {
        let amount = Amount::from_str("$1,234,567.89").unwrap();
        assert_eq!(amount.value(), dec("1234567.89"));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(Amount::from_str("twelve").is_err());
    }

    #[test]
    fn test_display_currency() {
        assert_eq!(Amount::new(dec("87.4")).to_string(), "$87.40");
        assert_eq!(Amount::new(dec("60000")).to_string(), "$60,000.00");
        assert_eq!(Amount::new(dec("-5.5")).to_string(), "-$5.50");
        assert_eq!(Amount::ZERO.to_string(), "$0.00");
    }

    #[test]
    fn test_serialize_plain_decimal_string() {
        let json = serde_json::to_string(&Amount::new(dec("87.4"))).unwrap();
        assert_eq!(json, "\"87.40\"");
    }

    #[test]
    fn test_deserialize_string_and_number() {
        let a: Amount = serde_json::from_str("\"123.45\"").unwrap();
        let b: Amount = serde_json::from_str("123.45").unwrap();
        let c: Amount = serde_json::from_str("12").unwrap();
        assert_eq!(a.value(), dec("123.45"));
        assert_eq!(b.value(), dec("123.45"));
        assert_eq!(c.value(), dec("12"));
    }

    #[test]
    fn test_sum() {
        let total: Amount = ["1.10", "2.20", "3.30"]
            .iter()
            .map(|s| Amount::from_str(s).unwrap())
            .sum();
        assert_eq!(total.value(), dec("6.60"));
    }
}
