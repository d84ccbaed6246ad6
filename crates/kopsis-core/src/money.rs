//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  With floats a 33% scholarship on Rp 100.000 is 33000.000000000004,    │
//! │  and a student balance slowly drifts away from the sum of its bills.   │
//! │                                                                         │
//! │  OUR SOLUTION: whole rupiah in an i64                                  │
//! │    Discounts are rounded once, half-up, when a liability is priced.    │
//! │    Every later step is exact integer addition and subtraction.         │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use kopsis_core::money::Money;
//!
//! let fee = Money::from_rupiah(250_000);
//! let half = fee.percentage(50);
//! assert_eq!(half.rupiah(), 125_000);
//! assert_eq!(fee.to_string(), "Rp 250.000");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary amount in whole rupiah (the smallest unit the school bills in).
///
/// ## Design Decisions
/// - **i64 (signed)**: ledger deltas are negative when a payment is reversed
/// - **Single field tuple struct**: zero-cost wrapper, serialises as a number
///
/// ## Where Money Flows
/// ```text
/// Variant.amount ──► Liability.original_amount ──► − discount ──► Liability.amount
///                                                                      │
/// Payment.amount ──► Liability.paid_amount ──► Student.total_paid      │
///                                                                      ▼
///                                      Student.balance = Σ (amount − paid)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from whole rupiah.
    #[inline]
    pub const fn from_rupiah(rupiah: i64) -> Self {
        Money(rupiah)
    }

    /// Returns the value in whole rupiah.
    #[inline]
    pub const fn rupiah(&self) -> i64 {
        self.0
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

    /// Clamps negative values to zero.
    #[inline]
    pub const fn non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            Money(self.0)
        }
    }

    /// Addition that reports overflow instead of wrapping or panicking.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(sum) => Some(Money(sum)),
            None => None,
        }
    }

    /// Returns `percent`% of this amount, rounded half-up to whole rupiah.
    ///
    /// ## Implementation
    /// Integer math: `(amount * percent + 50) / 100`, widened to i128 so a
    /// large template amount cannot overflow.
    ///
    /// ## Example
    /// ```rust
    /// use kopsis_core::money::Money;
    ///
    /// assert_eq!(Money::from_rupiah(100_000).percentage(20).rupiah(), 20_000);
    /// // 33% of 10.001 = 3300.33 → 3300
    /// assert_eq!(Money::from_rupiah(10_001).percentage(33).rupiah(), 3_300);
    /// // 50% of 5 = 2.5 → 3
    /// assert_eq!(Money::from_rupiah(5).percentage(50).rupiah(), 3);
    /// ```
    pub fn percentage(&self, percent: u8) -> Money {
        let scaled = self.0 as i128 * percent as i128;
        let rounded = if scaled >= 0 {
            (scaled + 50) / 100
        } else {
            (scaled - 50) / 100
        };
        Money(rounded as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Formats as Indonesian rupiah with `.` thousands separators.
///
/// This is for logs and audit descriptions; the frontend does its own
/// locale formatting.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}Rp {}", sign, grouped)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl From<i64> for Money {
    fn from(rupiah: i64) -> Self {
        Money(rupiah)
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
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
