//! # Money Module
//!
//! Provides the `Money` type used for customer balances, risk limits,
//! unit costs and selling prices.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  A customer balance is the sum of every sale, payment and credit note  │
//! │  ever recorded against it. With floats:                                 │
//! │    0.1 + 0.2 = 0.30000000000000004                                      │
//! │  and the running balance drifts away from its own history.             │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    "200.50" is parsed straight to 20050 cents, no float in between.    │
//! │    Replaying the ledger always reproduces the stored balance exactly.  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::Money;
//!
//! let sale = Money::parse("200").unwrap();
//! let payment = Money::parse("50.25").unwrap();
//! assert_eq!((sale - payment).cents(), 14975);
//! assert_eq!((sale - payment).to_string(), "149.75");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;
use thiserror::Error;
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// Signed: customer balances go negative when the customer is in credit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

/// Failure to read a decimal amount.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyParseError {
    #[error("amount is empty")]
    Empty,

    #[error("amount is not a number")]
    NotANumber,

    #[error("amount has more than two decimal places")]
    TooPrecise,

    #[error("amount is out of range")]
    OutOfRange,
}

impl Money {
    /// Creates a Money value from cents.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }

    /// Multiplies by a stock quantity (inventory valuation).
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let unit_cost = Money::from_cents(250);
    /// assert_eq!(unit_cost.checked_mul_quantity(4), Some(Money::from_cents(1000)));
    /// ```
    pub fn checked_mul_quantity(self, qty: i64) -> Option<Money> {
        self.0.checked_mul(qty).map(Money)
    }

    /// Parses a decimal string such as `"200"`, `"-3.7"` or `"1250.05"`.
    ///
    /// At most two fraction digits are accepted; nothing is rounded.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::parse("12.5").unwrap().cents(), 1250);
    /// assert!(Money::parse("12.555").is_err());
    /// assert!(Money::parse("abc").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Money, MoneyParseError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(MoneyParseError::Empty);
        }

        let (negative, digits) = match s.as_bytes()[0] {
            b'-' => (true, &s[1..]),
            b'+' => (false, &s[1..]),
            _ => (false, s),
        };

        let (whole, fraction) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(MoneyParseError::NotANumber);
        }
        if !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(MoneyParseError::NotANumber);
        }
        if fraction.len() > 2 {
            return Err(MoneyParseError::TooPrecise);
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| MoneyParseError::OutOfRange)?
        };
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| MoneyParseError::NotANumber)? * 10,
            _ => fraction.parse().map_err(|_| MoneyParseError::NotANumber)?,
        };

        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction))
            .ok_or(MoneyParseError::OutOfRange)?;

        Ok(Money(if negative { -cents } else { cents }))
    }

    /// Reads an amount from a JSON value: a number or a decimal string.
    ///
    /// Numbers go through their decimal text form, so `200.5` is read as
    /// exactly 20050 cents.
    pub fn from_json(value: &serde_json::Value) -> Result<Money, MoneyParseError> {
        match value {
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i.checked_mul(100)
                        .map(Money)
                        .ok_or(MoneyParseError::OutOfRange)
                } else {
                    Money::parse(&n.to_string())
                }
            }
            serde_json::Value::String(s) => Money::parse(s),
            serde_json::Value::Null => Err(MoneyParseError::Empty),
            _ => Err(MoneyParseError::NotANumber),
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering, e.g. `-370.00`. Currency symbols are left to
/// the presentation layer.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor_part())
    }
}

impl FromStr for Money {
    type Err = MoneyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_whole_and_fractional() {
        assert_eq!(Money::parse("200").unwrap().cents(), 20000);
        assert_eq!(Money::parse("200.5").unwrap().cents(), 20050);
        assert_eq!(Money::parse("200.05").unwrap().cents(), 20005);
        assert_eq!(Money::parse(".75").unwrap().cents(), 75);
        assert_eq!(Money::parse(" -3.70 ").unwrap().cents(), -370);
        assert_eq!(Money::parse("+1").unwrap().cents(), 100);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Money::parse(""), Err(MoneyParseError::Empty));
        assert_eq!(Money::parse("-"), Err(MoneyParseError::NotANumber));
        assert_eq!(Money::parse("."), Err(MoneyParseError::NotANumber));
        assert_eq!(Money::parse("1e3"), Err(MoneyParseError::NotANumber));
        assert_eq!(Money::parse("1.2.3"), Err(MoneyParseError::NotANumber));
        assert_eq!(Money::parse("0.001"), Err(MoneyParseError::TooPrecise));
        assert_eq!(
            Money::parse("99999999999999999999"),
            Err(MoneyParseError::OutOfRange)
        );
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Money::from_json(&json!(200)).unwrap().cents(), 20000);
        assert_eq!(Money::from_json(&json!(200.5)).unwrap().cents(), 20050);
        assert_eq!(Money::from_json(&json!(0.1)).unwrap().cents(), 10);
        assert_eq!(Money::from_json(&json!("49.99")).unwrap().cents(), 4999);
        assert!(Money::from_json(&json!(null)).is_err());
        assert!(Money::from_json(&json!(true)).is_err());
        assert!(Money::from_json(&json!(1.005)).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(13000).to_string(), "130.00");
        assert_eq!(Money::from_cents(-37000).to_string(), "-370.00");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
    }

    #[test]
    fn test_arithmetic() {
        let mut balance = Money::zero();
        balance += Money::from_cents(20000);
        balance -= Money::from_cents(5000);
        assert_eq!(balance, Money::from_cents(15000));
        assert_eq!(-balance, Money::from_cents(-15000));

        let total: Money = [100, 200, 300].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 600);

        assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
    }
}
