//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Storage vs. Transport
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  WHERE AMOUNTS LIVE                                                     │
//! │                                                                         │
//! │  SQLite columns          Money              Annotation text             │
//! │  ──────────────          ─────              ───────────────             │
//! │  total_cents = 5000  ──► Money(5000) ──►    "50.00"                     │
//! │                                                                         │
//! │  "Amount Paid Today: €30.00" ──► parse_decimal("30.00") ──► Money(3000) │
//! │                                                                         │
//! │  Arithmetic is always integer. Decimal text only exists at the edges.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::money::Money;
//!
//! let paid = Money::parse_decimal("30.00").unwrap();
//! let remaining = Money::from_cents(2000);
//! assert_eq!((paid + remaining).to_decimal_string(), "50.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative values for refunds and corrections
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **No float constructor**: decimal text goes through [`Money::parse_decimal`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

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

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit should be negative:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Parses base-currency decimal text into Money.
    ///
    /// Accepts an optional leading `-`, digits, and an optional fractional
    /// part. Fractions beyond two places are rounded half-up. Returns `None`
    /// for anything else (currency symbols, thousands separators, empty
    /// input) and on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::parse_decimal("30").unwrap().cents(), 3000);
    /// assert_eq!(Money::parse_decimal("12.5").unwrap().cents(), 1250);
    /// assert_eq!(Money::parse_decimal("0.125").unwrap().cents(), 13);
    /// assert!(Money::parse_decimal("€3").is_none());
    /// ```
    pub fn parse_decimal(text: &str) -> Option<Money> {
        let text = text.trim();
        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let (whole, fraction) = match body.split_once('.') {
            Some((w, f)) => (w, f),
            None => (body, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        if !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }

        let mut cents: i64 = 0;
        for digit in whole.bytes() {
            cents = cents.checked_mul(10)?.checked_add(i64::from(digit - b'0'))?;
        }
        cents = cents.checked_mul(100)?;

        let mut places = fraction.bytes();
        let tenths = places.next().map_or(0, |d| i64::from(d - b'0'));
        let hundredths = places.next().map_or(0, |d| i64::from(d - b'0'));
        let round_up = places.next().is_some_and(|d| d >= b'5');

        cents = cents.checked_add(tenths * 10 + hundredths)?;
        if round_up {
            cents = cents.checked_add(1)?;
        }

        Some(Money(if negative { -cents } else { cents }))
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Renders the value as plain decimal text with two places, e.g. `"30.00"`.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{}.{:02}", sign, self.dollars().abs(), self.cents_part())
    }

    /// Sum, or `None` when it does not fit in `i64` cents.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(3000).checked_add(Money::from_cents(2000)), Some(Money::from_cents(5000)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
    /// ```
    #[inline]
    pub const fn checked_add(self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies money by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering. Currency symbols are a presentation concern.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
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

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.dollars(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_from_major_minor() {
        assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display_is_plain_decimal() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(0).to_string(), "0.00");
    }

    #[test]
    fn test_parse_decimal_accepts_plain_numbers() {
        assert_eq!(Money::parse_decimal("30").map(|m| m.cents()), Some(3000));
        assert_eq!(Money::parse_decimal("30.").map(|m| m.cents()), Some(3000));
        assert_eq!(Money::parse_decimal(".5").map(|m| m.cents()), Some(50));
        assert_eq!(Money::parse_decimal("20.05").map(|m| m.cents()), Some(2005));
        assert_eq!(Money::parse_decimal(" 7.1 ").map(|m| m.cents()), Some(710));
        assert_eq!(Money::parse_decimal("-4.25").map(|m| m.cents()), Some(-425));
    }

    #[test]
    fn test_parse_decimal_rounds_half_up() {
        assert_eq!(Money::parse_decimal("0.125").map(|m| m.cents()), Some(13));
        assert_eq!(Money::parse_decimal("0.124").map(|m| m.cents()), Some(12));
        assert_eq!(Money::parse_decimal("9.999").map(|m| m.cents()), Some(1000));
    }

    #[test]
    fn test_parse_decimal_rejects_garbage() {
        assert!(Money::parse_decimal("").is_none());
        assert!(Money::parse_decimal(".").is_none());
        assert!(Money::parse_decimal("€30").is_none());
        assert!(Money::parse_decimal("1,000.00").is_none());
        assert!(Money::parse_decimal("12.3.4").is_none());
        assert!(Money::parse_decimal("99999999999999999999").is_none());
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
        assert_eq!(vec![a, b, b].into_iter().sum::<Money>().cents(), 2000);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let negative = Money::from_cents(-100);
        assert!(negative.is_negative());
        assert_eq!(negative.abs().cents(), 100);
    }
}
