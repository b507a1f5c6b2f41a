//! # Money Module
//!
//! Provides the `Money` type used for every drawer balance, ledger amount
//! and discrepancy in the engine.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  RECONCILIATION NEEDS EXACT ARITHMETIC                                  │
//! │                                                                         │
//! │  A shift closes with:                                                   │
//! │    expected = opening + Σ cash in − Σ cash out                          │
//! │    discrepancy = counted − expected                                     │
//! │                                                                         │
//! │  With floats, a perfectly counted drawer can report a                   │
//! │  discrepancy of -0.0000000001 and trigger an alert.                     │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units (paise)                              │
//! │    ₹1,450.00 is stored as 145000                                        │
//! │    Every sum and difference is exact                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use till_core::money::Money;
//!
//! let opening = Money::from_major(1000);        // ₹1000.00
//! let sale = Money::from_major_minor(499, 50);  // ₹499.50
//! let balance = opening + sale;
//! assert_eq!(balance.minor(), 149_950);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

/// Number of minor units in one major unit (paise per rupee).
pub const MINOR_PER_MAJOR: i64 = 100;

/// A monetary value in the smallest currency unit (paise).
///
/// ## Design Decisions
/// - **i64 (signed)**: discrepancies and net positions can be negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Serialized as a bare integer**: the JSON wire value is minor units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// let amount = Money::from_minor(1099); // ₹10.99
    /// assert_eq!(amount.minor(), 1099);
    /// ```
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Creates a Money value from whole major units (rupees).
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * MINOR_PER_MAJOR)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -₹5.50.
    ///
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(10, 99).minor(), 1099);
    /// assert_eq!(Money::from_major_minor(-5, 50).minor(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * MINOR_PER_MAJOR - minor)
        } else {
            Money(major * MINOR_PER_MAJOR + minor)
        }
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns the whole major-unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / MINOR_PER_MAJOR
    }

    /// Returns the minor-unit remainder (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % MINOR_PER_MAJOR).abs()
    }

    /// Zero.
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

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Multiplies by a count (notes in a drawer slot, for example).
    ///
    /// Returns `None` on overflow so a malicious denomination count cannot
    /// wrap around to a plausible total.
    ///
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// let note = Money::from_major(500);
    /// assert_eq!(note.checked_times(3), Some(Money::from_major(1500)));
    /// assert_eq!(note.checked_times(i64::MAX), None);
    /// ```
    #[inline]
    pub fn checked_times(&self, count: i64) -> Option<Money> {
        self.0.checked_mul(count).map(Money)
    }

    /// Checked addition.
    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows money as `₹1234.50`, or `-₹10.00` for a shortfall.
///
/// ## Note
/// For logs and error messages. Dashboards format from the raw minor units.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}₹{}.{:02}", sign, self.major().abs(), self.minor_part())
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

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, count: i64) -> Self {
        Money(self.0 * count)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor_and_parts() {
        let money = Money::from_minor(1099);
        assert_eq!(money.minor(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor_part(), 99);
    }

    #[test]
    fn test_from_major() {
        assert_eq!(Money::from_major(1450).minor(), 145_000);
        assert_eq!(Money::from_major(0), Money::zero());
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_minor(145_000).to_string(), "₹1450.00");
        assert_eq!(Money::from_minor(-1000).to_string(), "-₹10.00");
        assert_eq!(Money::from_minor(5).to_string(), "₹0.05");
        assert_eq!(Money::zero().to_string(), "₹0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_major(1000);
        let b = Money::from_major(50);

        assert_eq!(a + b, Money::from_major(1050));
        assert_eq!(a - b, Money::from_major(950));
        assert_eq!(b - a, Money::from_major(-950));
        assert_eq!(-b, Money::from_major(-50));
        assert_eq!(b * 3, Money::from_major(150));
    }

    #[test]
    fn test_sum() {
        let amounts = vec![Money::from_major(600), Money::from_major(200), Money::from_major(200)];
        let total: Money = amounts.iter().sum();
        assert_eq!(total, Money::from_major(1000));

        let empty: Vec<Money> = Vec::new();
        assert_eq!(empty.into_iter().sum::<Money>(), Money::zero());
    }

    #[test]
    fn test_sign_checks() {
        assert!(Money::zero().is_zero());
        assert!(Money::from_minor(1).is_positive());
        assert!(Money::from_minor(-1).is_negative());
        assert_eq!(Money::from_minor(-550).abs(), Money::from_minor(550));
    }

    #[test]
    fn test_checked_operations() {
        assert_eq!(Money::from_minor(i64::MAX).checked_add(Money::from_minor(1)), None);
        assert_eq!(Money::from_major(2000).checked_times(0), Some(Money::zero()));
    }
}
