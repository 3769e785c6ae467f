//! Type-safe price representation using decimal arithmetic.
//!
//! Prices are fixed-point decimals in the store's single currency. All order
//! arithmetic goes through [`Price`] so totals never pick up floating-point
//! rounding drift.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Quantity;

/// Errors produced when constructing a [`Price`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceError {
    /// The amount is below zero.
    #[error("price cannot be negative: {0}")]
    Negative(Decimal),
    /// The text is not a decimal number.
    #[error("invalid price: {0:?}")]
    Invalid(String),
    /// Arithmetic left the representable range.
    #[error("price overflow")]
    Overflow,
}

/// A non-negative unit price or monetary total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a price, rejecting negative amounts.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Negative` if `amount < 0`.
    pub fn new(amount: Decimal) -> Result<Self, PriceError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative(amount));
        }
        Ok(Self(amount.normalize()))
    }

    /// Create a price from an integer count of cents.
    #[must_use]
    pub fn from_cents(cents: u64) -> Self {
        Self(Decimal::from(cents) / Decimal::ONE_HUNDRED)
    }

    /// The decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Price of `quantity` units at this unit price.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Overflow` if the product does not fit a `Decimal`.
    pub fn times(self, quantity: Quantity) -> Result<Self, PriceError> {
        self.0
            .checked_mul(Decimal::from(quantity.get()))
            .map(Self)
            .ok_or(PriceError::Overflow)
    }

    /// Sum of two prices.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Overflow` if the sum does not fit a `Decimal`.
    pub fn checked_add(self, other: Self) -> Result<Self, PriceError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(PriceError::Overflow)
    }

    /// Sum an iterator of prices.
    ///
    /// # Errors
    ///
    /// Returns `PriceError::Overflow` if any partial sum overflows.
    pub fn try_sum<I>(prices: I) -> Result<Self, PriceError>
    where
        I: IntoIterator<Item = Self>,
    {
        prices
            .into_iter()
            .try_fold(Self::ZERO, Self::checked_add)
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

impl FromStr for Price {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount =
            Decimal::from_str(s.trim()).map_err(|_| PriceError::Invalid(s.to_owned()))?;
        Self::new(amount)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_price_rejected() {
        let err = Price::new(Decimal::new(-1, 2)).unwrap_err();
        assert!(matches!(err, PriceError::Negative(_)));
    }

    #[test]
    fn test_negative_zero_is_zero() {
        let price = Price::new(Decimal::new(0, 2)).unwrap();
        assert_eq!(price, Price::ZERO);
    }

    #[test]
    fn test_times_is_exact() {
        // 0.10 * 3 must be exactly 0.30, not 0.30000000000000004
        let price: Price = "0.10".parse().unwrap();
        let total = price.times(Quantity::new(3).unwrap()).unwrap();
        assert_eq!(total.amount(), Decimal::new(30, 2));
        assert_eq!(total.to_string(), "0.30");
    }

    #[test]
    fn test_try_sum() {
        let prices = ["10.00", "0.01", "19.99"]
            .iter()
            .map(|p| p.parse::<Price>().unwrap());
        let total = Price::try_sum(prices).unwrap();
        assert_eq!(total, Price::from_cents(3000));
    }

    #[test]
    fn test_display_two_decimals() {
        assert_eq!(Price::from_cents(1000).to_string(), "10.00");
        assert_eq!(Price::from_cents(5).to_string(), "0.05");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(
            "ten dollars".parse::<Price>(),
            Err(PriceError::Invalid(_))
        ));
    }

    #[test]
    fn test_serde_rejects_negative() {
        let result: Result<Price, _> = serde_json::from_str("\"-5.00\"");
        assert!(result.is_err());
        let price: Price = serde_json::from_str("\"12.50\"").unwrap();
        assert_eq!(price, Price::from_cents(1250));
    }
}
