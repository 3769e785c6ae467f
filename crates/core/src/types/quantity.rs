//! Positive line-item quantities.

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned for quantities below one or out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuantityError {
    /// Quantity must be at least one.
    #[error("quantity must be at least 1 (got {0})")]
    NotPositive(i64),
    /// Quantity does not fit the supported range.
    #[error("quantity out of range")]
    Overflow,
}

/// A quantity of units on a cart line or order line. Always `>= 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// A single unit.
    pub const ONE: Self = Self(NonZeroU32::MIN);

    /// Create a quantity from a client-supplied number.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::NotPositive` for zero or negative values and
    /// `QuantityError::Overflow` for values beyond `u32::MAX`.
    pub fn new(value: i64) -> Result<Self, QuantityError> {
        if value < 1 {
            return Err(QuantityError::NotPositive(value));
        }
        u32::try_from(value)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or(QuantityError::Overflow)
    }

    /// The raw unit count.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Combine two quantities of the same product.
    ///
    /// # Errors
    ///
    /// Returns `QuantityError::Overflow` if the sum exceeds `u32::MAX`.
    pub fn checked_add(self, other: Self) -> Result<Self, QuantityError> {
        self.0
            .checked_add(other.get())
            .map(Self)
            .ok_or(QuantityError::Overflow)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.get()
    }
}

impl From<Quantity> for i64 {
    fn from(quantity: Quantity) -> Self {
        Self::from(quantity.get())
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_and_negative() {
        assert_eq!(Quantity::new(0), Err(QuantityError::NotPositive(0)));
        assert_eq!(Quantity::new(-3), Err(QuantityError::NotPositive(-3)));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert_eq!(
            Quantity::new(i64::from(u32::MAX) + 1),
            Err(QuantityError::Overflow)
        );
    }

    #[test]
    fn test_checked_add() {
        let two = Quantity::new(2).unwrap();
        let three = Quantity::new(3).unwrap();
        assert_eq!(two.checked_add(three).unwrap().get(), 5);

        let max = Quantity::new(i64::from(u32::MAX)).unwrap();
        assert_eq!(max.checked_add(Quantity::ONE), Err(QuantityError::Overflow));
    }

    #[test]
    fn test_serde() {
        let q: Quantity = serde_json::from_str("4").unwrap();
        assert_eq!(q.get(), 4);
        assert_eq!(serde_json::to_string(&q).unwrap(), "4");
        assert!(serde_json::from_str::<Quantity>("0").is_err());
    }
}
