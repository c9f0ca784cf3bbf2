//! Integer-cent amounts
//!
//! Deductible and out-of-pocket figures travel through the pipeline as whole
//! cents. Payer files carry them as decimal dollars, so this module owns the
//! exact conversion in both directions using rust_decimal; no floating point
//! is involved at any step.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when converting amounts
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount {0} has sub-cent precision")]
    SubCentPrecision(String),

    #[error("Overflow during calculation")]
    Overflow,
}

/// A monetary amount in whole US cents
///
/// # Example
///
/// ```rust
/// use core_kernel::Cents;
///
/// let amount = Cents::parse_dollars("12.34").unwrap();
/// assert_eq!(amount, Cents::new(1234));
/// assert_eq!(amount.to_dollars_string(), "12.34");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cents(i64);

impl Cents {
    /// Zero cents
    pub const ZERO: Cents = Cents(0);

    /// Creates an amount from a whole number of cents
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the raw number of cents
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if the amount is negative (a reversal)
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Converts to a decimal dollar value with exactly two places
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Renders as decimal dollars, e.g. `1234` -> `"12.34"`, `-5` -> `"-0.05"`
    pub fn to_dollars_string(&self) -> String {
        self.to_decimal().to_string()
    }

    /// Converts an exact decimal dollar value into cents
    ///
    /// # Errors
    ///
    /// Returns `AmountError::SubCentPrecision` if the value carries a
    /// non-zero fraction of a cent, and `AmountError::Overflow` if it does
    /// not fit in an `i64` number of cents.
    pub fn from_decimal(dollars: Decimal) -> Result<Self, AmountError> {
        let scaled = dollars
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or(AmountError::Overflow)?;
        if scaled.fract() != Decimal::ZERO {
            return Err(AmountError::SubCentPrecision(dollars.to_string()));
        }
        scaled.to_i64().map(Cents).ok_or(AmountError::Overflow)
    }

    /// Parses a decimal dollar string such as `"12.34"`, `"-5"` or `"+0.50"`
    pub fn parse_dollars(input: &str) -> Result<Self, AmountError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(AmountError::InvalidAmount("empty amount".to_string()));
        }
        let dollars = Decimal::from_str(trimmed.trim_start_matches('+'))
            .map_err(|_| AmountError::InvalidAmount(trimmed.to_string()))?;
        Self::from_decimal(dollars)
    }

    /// Checked addition
    pub fn checked_add(self, other: Cents) -> Option<Cents> {
        self.0.checked_add(other.0).map(Cents)
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 0 {
            write!(f, "-${}", Cents(-self.0).to_dollars_string())
        } else {
            write!(f, "${}", self.to_dollars_string())
        }
    }
}

impl From<i64> for Cents {
    fn from(cents: i64) -> Self {
        Cents(cents)
    }
}

impl From<Cents> for i64 {
    fn from(cents: Cents) -> i64 {
        cents.0
    }
}

impl Add for Cents {
    type Output = Cents;

    fn add(self, other: Cents) -> Cents {
        Cents(self.0 + other.0)
    }
}

impl Sub for Cents {
    type Output = Cents;

    fn sub(self, other: Cents) -> Cents {
        Cents(self.0 - other.0)
    }
}

impl Neg for Cents {
    type Output = Cents;

    fn neg(self) -> Cents {
        Cents(-self.0)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Cents>>(iter: I) -> Cents {
        iter.fold(Cents::ZERO, |acc, c| acc + c)
    }
}

impl<'a> Sum<&'a Cents> for Cents {
    fn sum<I: Iterator<Item = &'a Cents>>(iter: I) -> Cents {
        iter.copied().sum()
    }
}
