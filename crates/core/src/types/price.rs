//! Type-safe price representation using decimal arithmetic.
//!
//! A [`Price`] is always strictly positive. Products, order line prices and
//! order totals all use it, so a record holding a zero or negative price cannot
//! be constructed and therefore never reaches a store.
//!
//! On the wire a price is a JSON number (`19.99`). Decimal strings (`"19.99"`)
//! are accepted on read for records written by older clients.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors that can occur when constructing a [`Price`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is zero or negative.
    #[error("price must be greater than zero, got {0}")]
    NotPositive(Decimal),
    /// Arithmetic on the amount overflowed.
    #[error("price arithmetic overflowed")]
    Overflow,
}

/// A strictly positive amount in the store currency (rupees).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(Decimal);

impl Price {
    /// Create a price from a decimal amount.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::NotPositive`] if `amount <= 0`.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount <= Decimal::ZERO {
            return Err(PriceError::NotPositive(amount));
        }
        Ok(Self(amount.normalize()))
    }

    /// Create a price from an amount in paise (hundredths).
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::NotPositive`] if `paise <= 0`.
    pub fn from_paise(paise: i64) -> Result<Self, PriceError> {
        Self::new(Decimal::new(paise, 2))
    }

    /// The decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::NotPositive`] for a zero quantity and
    /// [`PriceError::Overflow`] if the product does not fit a decimal.
    pub fn times(self, quantity: u32) -> Result<Self, PriceError> {
        let total = self
            .0
            .checked_mul(Decimal::from(quantity))
            .ok_or(PriceError::Overflow)?;
        Self::new(total)
    }

    /// Unit price recovered from a total over `quantity` units.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Overflow`] for a zero quantity.
    pub fn per_unit(self, quantity: u32) -> Result<Self, PriceError> {
        let unit = self
            .0
            .checked_div(Decimal::from(quantity))
            .ok_or(PriceError::Overflow)?;
        Self::new(unit)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "₹{:.2}", self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = PriceError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Plain `Decimal` deserialization accepts both numbers and strings.
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        Self::new(amount).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_and_negative() {
        assert!(matches!(
            Price::new(Decimal::ZERO),
            Err(PriceError::NotPositive(_))
        ));
        assert!(matches!(
            Price::from_paise(-100),
            Err(PriceError::NotPositive(_))
        ));
    }

    #[test]
    fn test_times_and_per_unit() {
        let unit = Price::from_paise(2_550).unwrap();
        let total = unit.times(3).unwrap();
        assert_eq!(total.amount(), Decimal::new(7_650, 2));
        assert_eq!(total.per_unit(3).unwrap(), unit);
        assert!(unit.times(0).is_err());
        assert!(unit.per_unit(0).is_err());
    }

    #[test]
    fn test_display() {
        let price = Price::from_paise(199_900).unwrap();
        assert_eq!(price.to_string(), "₹1999.00");
    }

    #[test]
    fn test_serializes_as_number() {
        let price = Price::from_paise(1_999).unwrap();
        assert_eq!(serde_json::to_string(&price).unwrap(), "19.99");
    }

    #[test]
    fn test_deserializes_number_or_string() {
        let a: Price = serde_json::from_str("19.99").unwrap();
        let b: Price = serde_json::from_str("\"19.99\"").unwrap();
        let c: Price = serde_json::from_str("100").unwrap();
        assert_eq!(a, b);
        assert_eq!(c.amount(), Decimal::from(100));
        assert!(serde_json::from_str::<Price>("0").is_err());
    }
}
