//! # Credit Amounts — Non-Negative Decimals
//!
//! `CreditAmount` wraps a `rust_decimal::Decimal` that is guaranteed
//! non-negative at construction. Issuer balances, purchase amounts, and
//! debit/refund magnitudes all use this type, so a negative balance is
//! unrepresentable — the ledger's floor check reduces to `checked_sub`
//! returning `None`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A non-negative decimal credit amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct CreditAmount(Decimal);

impl CreditAmount {
    /// Create an amount, rejecting negative values.
    pub fn new(value: Decimal) -> Result<Self, CoreError> {
        if value.is_sign_negative() {
            return Err(CoreError::NegativeAmount(value));
        }
        Ok(Self(value))
    }

    /// The zero amount.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Whether this amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Construct from whole credits (integer convenience, used widely in tests).
    pub fn from_credits(credits: u64) -> Self {
        Self(Decimal::from(credits))
    }

    /// The inner decimal value.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Checked addition. `None` on decimal overflow.
    pub fn checked_add(&self, other: CreditAmount) -> Option<CreditAmount> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Checked subtraction. `None` when `other` exceeds `self` — this is
    /// the balance floor check.
    pub fn checked_sub(&self, other: CreditAmount) -> Option<CreditAmount> {
        if other.0 > self.0 {
            return None;
        }
        self.0.checked_sub(other.0).map(Self)
    }
}

impl TryFrom<Decimal> for CreditAmount {
    type Error = CoreError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CreditAmount> for Decimal {
    fn from(amount: CreditAmount) -> Self {
        amount.0
    }
}

impl std::fmt::Display for CreditAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative() {
        assert!(CreditAmount::new(Decimal::new(-1, 0)).is_err());
    }

    #[test]
    fn zero_is_zero() {
        assert!(CreditAmount::zero().is_zero());
        assert!(!CreditAmount::from_credits(1).is_zero());
    }

    #[test]
    fn checked_sub_floors_at_zero() {
        let five = CreditAmount::from_credits(5);
        let three = CreditAmount::from_credits(3);
        assert_eq!(five.checked_sub(three), Some(CreditAmount::from_credits(2)));
        assert_eq!(three.checked_sub(five), None);
    }

    #[test]
    fn checked_sub_to_exactly_zero() {
        let five = CreditAmount::from_credits(5);
        assert_eq!(five.checked_sub(five), Some(CreditAmount::zero()));
    }

    #[test]
    fn checked_add_accumulates() {
        let a = CreditAmount::from_credits(2);
        let b = CreditAmount::from_credits(3);
        assert_eq!(a.checked_add(b), Some(CreditAmount::from_credits(5)));
    }

    #[test]
    fn serde_rejects_negative_decimal() {
        let result: Result<CreditAmount, _> = serde_json::from_str("-3");
        assert!(result.is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let amount = CreditAmount::from_credits(42);
        let json = serde_json::to_string(&amount).unwrap();
        let back: CreditAmount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }

    #[test]
    fn fractional_amounts_supported() {
        let half = CreditAmount::new(Decimal::new(5, 1)).unwrap();
        assert_eq!(half.to_string(), "0.5");
    }
}
