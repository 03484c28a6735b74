//! Exact fixed-point money arithmetic.
//!
//! Monetary values are **integer minor units** (two decimal places) in an
//! `i64`, never binary floating point. Percentage math goes through [`Rate`]
//! (basis points), with an explicit [`RoundingMode`] where rounding can occur.

use core::fmt;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_object::ValueObject;

/// Rounding behavior for operations that may lose precision.
///
/// `HalfUp` rounds halves away from zero (the bookkeeping default);
/// `Down` truncates toward zero.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    #[default]
    HalfUp,
    Down,
}

/// A signed amount in minor currency units (e.g. ngwee).
///
/// Addition and subtraction are exact; `a + b - b == a` holds for every pair
/// that does not overflow `i64`. Use the `checked_*` forms wherever an input
/// has not already been validated.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    /// Amount from raw minor units.
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    /// Amount from whole major units (e.g. kwacha).
    pub const fn from_major(major: i64) -> Self {
        Self(major * 100)
    }

    /// Raw value in minor units.
    pub const fn minor(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub const fn abs(self) -> Money {
        Money(self.0.abs())
    }

    pub fn min(self, other: Money) -> Money {
        Money(self.0.min(other.0))
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    pub fn checked_neg(self) -> Option<Money> {
        self.0.checked_neg().map(Money)
    }

    /// Multiply by a rate, rounding half away from zero at minor-unit
    /// precision. Intermediate math is `i128`, so the only failure mode is a
    /// result outside `i64`.
    pub fn mul_rate(self, rate: Rate) -> Option<Money> {
        self.mul_rate_with(rate, RoundingMode::HalfUp)
    }

    /// Multiply by a rate with an explicit rounding mode.
    pub fn mul_rate_with(self, rate: Rate, mode: RoundingMode) -> Option<Money> {
        let numerator = (self.0 as i128) * (rate.bps() as i128);
        let minor = round_div(numerator, Rate::SCALE as i128, mode);
        i64::try_from(minor).ok().map(Money)
    }

    /// Divide by a positive integer, rounding half away from zero.
    ///
    /// Returns `None` for a non-positive divisor or on overflow.
    pub fn div_round(self, divisor: i64) -> Option<Money> {
        self.div_round_with(divisor, RoundingMode::HalfUp)
    }

    /// Divide by a positive integer with an explicit rounding mode.
    pub fn div_round_with(self, divisor: i64, mode: RoundingMode) -> Option<Money> {
        if divisor <= 0 {
            return None;
        }
        let minor = round_div(self.0 as i128, divisor as i128, mode);
        i64::try_from(minor).ok().map(Money)
    }
}

/// Signed division with rounding; `divisor` must be positive.
fn round_div(numerator: i128, divisor: i128, mode: RoundingMode) -> i128 {
    debug_assert!(divisor > 0);
    let negative = numerator < 0;
    let abs = numerator.unsigned_abs();
    let d = divisor as u128;
    let q = match mode {
        RoundingMode::HalfUp => (abs + d / 2) / d,
        RoundingMode::Down => abs / d,
    };
    let q = q as i128;
    if negative { -q } else { q }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for Money {
    type Err = DomainError;

    /// Parse a decimal string (`"123.45"`, `"-7"`, `"0.5"`) into minor units.
    ///
    /// At most two fractional digits are accepted; `"12.345"` is rejected
    /// rather than rounded.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::validation(format!("invalid amount: {s:?}"));

        let trimmed = s.trim();
        let (sign, rest) = match trimmed.strip_prefix('-') {
            Some(stripped) => (-1i64, stripped),
            None => (1i64, trimmed),
        };
        if rest.is_empty() {
            return Err(invalid());
        }

        let (units_str, frac_str) = match rest.split_once('.') {
            Some((u, f)) => (u, f),
            None => (rest, ""),
        };
        if units_str.is_empty() || !units_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if !frac_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let units: i64 = units_str.parse().map_err(|_| invalid())?;
        let frac: i64 = match frac_str.len() {
            0 => 0,
            1 => frac_str.parse::<i64>().map_err(|_| invalid())? * 10,
            2 => frac_str.parse().map_err(|_| invalid())?,
            _ => {
                return Err(DomainError::validation(format!(
                    "too many decimal places: {s:?}"
                )));
            }
        };

        units
            .checked_mul(100)
            .and_then(|v| v.checked_add(frac))
            .and_then(|v| v.checked_mul(sign))
            .map(Money)
            .ok_or_else(|| DomainError::validation(format!("amount out of range: {s:?}")))
    }
}

/// A percentage expressed in basis points (1/100th of a percent).
///
/// Exact by construction; there is no floating point anywhere in rate math.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(u32);

impl ValueObject for Rate {}

impl Rate {
    /// Basis points per whole (10_000 bps == 100%).
    pub const SCALE: u32 = 10_000;

    pub const ZERO: Rate = Rate(0);

    pub const fn from_bps(bps: u32) -> Self {
        Self(bps)
    }

    pub const fn from_percent(percent: u32) -> Self {
        Self(percent * 100)
    }

    pub const fn bps(self) -> u32 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn display_formats_minor_units() {
        assert_eq!(Money::new(0).to_string(), "0.00");
        assert_eq!(Money::new(5).to_string(), "0.05");
        assert_eq!(Money::new(123_45).to_string(), "123.45");
        assert_eq!(Money::new(-123_45).to_string(), "-123.45");
    }

    #[test]
    fn parse_round_trips_display() {
        for raw in [0i64, 1, 99, 100, 12_345, -12_345, 70_00] {
            let m = Money::new(raw);
            assert_eq!(m.to_string().parse::<Money>().unwrap(), m);
        }
    }

    #[test]
    fn parse_rejects_more_than_two_decimals() {
        assert!("12.345".parse::<Money>().is_err());
        assert!("0.001".parse::<Money>().is_err());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("".parse::<Money>().is_err());
        assert!("-".parse::<Money>().is_err());
        assert!("12a.00".parse::<Money>().is_err());
        assert!(".50".parse::<Money>().is_err());
    }

    #[test]
    fn mul_rate_rounds_half_up() {
        // 0.01 * 50% = 0.005 → rounds to 0.01
        assert_eq!(
            Money::new(1).mul_rate(Rate::from_percent(50)).unwrap(),
            Money::new(1)
        );
        // truncating mode drops the half
        assert_eq!(
            Money::new(1)
                .mul_rate_with(Rate::from_percent(50), RoundingMode::Down)
                .unwrap(),
            Money::ZERO
        );
        assert_eq!(
            Money::from_major(200).mul_rate(Rate::from_percent(20)).unwrap(),
            Money::from_major(40)
        );
    }

    #[test]
    fn mul_rate_is_symmetric_for_negatives() {
        let rate = Rate::from_bps(3_333);
        let pos = Money::new(1_000).mul_rate(rate).unwrap();
        let neg = Money::new(-1_000).mul_rate(rate).unwrap();
        assert_eq!(pos, -neg);
    }

    #[test]
    fn div_round_requires_positive_divisor() {
        assert_eq!(Money::new(100).div_round(3).unwrap(), Money::new(33));
        assert_eq!(Money::new(100).div_round(0), None);
        assert_eq!(Money::new(100).div_round(-4), None);
    }

    proptest! {
        /// `a + b - b == a` exactly, for all pairs that fit in the checked ops.
        #[test]
        fn add_then_sub_is_identity(a in -1_000_000_000i64..1_000_000_000, b in -1_000_000_000i64..1_000_000_000) {
            let a = Money::new(a);
            let b = Money::new(b);
            let sum = a.checked_add(b).unwrap();
            prop_assert_eq!(sum.checked_sub(b).unwrap(), a);
        }

        /// Summing thousands of line amounts accumulates no representable error.
        #[test]
        fn repeated_addition_matches_integer_sum(amounts in prop::collection::vec(0i64..10_000_000, 1..200)) {
            let mut total = Money::ZERO;
            for &a in &amounts {
                total = total.checked_add(Money::new(a)).unwrap();
            }
            prop_assert_eq!(total.minor(), amounts.iter().sum::<i64>());
        }
    }
}
