// Currency amounts in integer minor units and rupiah display formatting.
//
// Cost figures are whole sen (1/100 rupiah). Floating point only appears
// where a man-month fraction is multiplied by a monthly rate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

/// Minor units per rupiah.
pub const MINOR_PER_MAJOR: i64 = 100;

/// An amount of money in minor units (sen). Arithmetic saturates at the
/// `i64` bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    pub const fn from_major(major: i64) -> Self {
        Money(major.saturating_mul(MINOR_PER_MAJOR))
    }

    /// Convert a floating-point rupiah amount, rounding half away from zero
    /// to the nearest sen. Non-finite input maps to zero.
    pub fn from_major_f64(major: f64) -> Self {
        Self::from_minor_f64(major * MINOR_PER_MAJOR as f64)
    }

    fn from_minor_f64(minor: f64) -> Self {
        if minor.is_finite() {
            // `as` clamps out-of-range floats to i64::MIN / i64::MAX.
            Money(minor.round() as i64)
        } else {
            Money(0)
        }
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn as_major_f64(self) -> f64 {
        self.0 as f64 / MINOR_PER_MAJOR as f64
    }

    /// Multiply by a fractional rate (e.g. 0.25 for a 25% markup), rounding
    /// the result to the nearest sen.
    pub fn scale(self, rate: f64) -> Money {
        Self::from_minor_f64(self.0 as f64 * rate)
    }

    /// Whole rupiah, rounded half away from zero.
    pub fn whole_rupiah(self) -> i64 {
        let half = MINOR_PER_MAJOR / 2;
        if self.0 >= 0 {
            self.0.saturating_add(half) / MINOR_PER_MAJOR
        } else {
            self.0.saturating_sub(half) / MINOR_PER_MAJOR
        }
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_idr(*self))
    }
}

/// Format as Indonesian rupiah: `Rp 13.950.000` (dot thousands separator,
/// no decimals).
pub fn format_idr(amount: Money) -> String {
    let whole = amount.whole_rupiah();
    let digits = whole.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    if whole < 0 {
        format!("-Rp {grouped}")
    } else {
        format!("Rp {grouped}")
    }
}
