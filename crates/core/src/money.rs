use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// A monetary amount in a single currency.
///
/// Amounts are kept as `f64` in major units; the platform only ever compares,
/// subtracts and scales budgets, never accumulates long ledgers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    pub currency: String,
}

impl Money {
    pub fn new(amount: f64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    pub fn zero(currency: impl Into<String>) -> Self {
        Self::new(0.0, currency)
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0.0
    }

    pub fn same_currency(&self, other: &Money) -> bool {
        self.currency.eq_ignore_ascii_case(&other.currency)
    }

    /// `self - other`, failing when the currencies differ.
    pub fn checked_sub(&self, other: &Money) -> Result<Money, CoreError> {
        if !self.same_currency(other) {
            return Err(CoreError::CurrencyMismatch {
                left: self.currency.clone(),
                right: other.currency.clone(),
            });
        }
        Ok(Money::new(self.amount - other.amount, self.currency.clone()))
    }

    /// Scale the amount, keeping the currency.
    pub fn scaled(&self, factor: f64) -> Money {
        Money::new(self.amount * factor, self.currency.clone())
    }

    /// Clamp negative amounts to zero.
    pub fn non_negative(self) -> Money {
        if self.amount < 0.0 {
            Money::zero(self.currency)
        } else {
            self
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.amount, self.currency)
    }
}
