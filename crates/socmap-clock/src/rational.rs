//! Exact non-negative rationals for frequency and phase arithmetic.
//!
//! Values are always stored in lowest terms with a non-zero denominator.
//! Products and comparisons go through `u128` so no intermediate overflows.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Greatest common divisor. `gcd(0, 0)` is 0.
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn gcd_u128(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Least common multiple, or `None` on overflow.
pub fn lcm(a: u64, b: u64) -> Option<u64> {
    if a == 0 || b == 0 {
        return Some(0);
    }
    (a / gcd(a, b)).checked_mul(b)
}

/// An exact fraction `numer / denom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRatio", into = "RawRatio")]
pub struct Ratio {
    numer: u64,
    denom: u64,
}

#[derive(Serialize, Deserialize)]
struct RawRatio {
    numer: u64,
    denom: u64,
}

impl TryFrom<RawRatio> for Ratio {
    type Error = String;

    fn try_from(raw: RawRatio) -> Result<Self, Self::Error> {
        Ratio::new(raw.numer, raw.denom).ok_or_else(|| "ratio denominator is zero".to_string())
    }
}

impl From<Ratio> for RawRatio {
    fn from(r: Ratio) -> Self {
        RawRatio {
            numer: r.numer,
            denom: r.denom,
        }
    }
}

impl Ratio {
    pub const ZERO: Ratio = Ratio { numer: 0, denom: 1 };
    pub const ONE: Ratio = Ratio { numer: 1, denom: 1 };

    /// Build a reduced ratio. `None` if `denom` is zero.
    pub fn new(numer: u64, denom: u64) -> Option<Self> {
        if denom == 0 {
            return None;
        }
        let g = gcd(numer, denom).max(1);
        Some(Self {
            numer: numer / g,
            denom: denom / g,
        })
    }

    pub const fn integer(n: u64) -> Self {
        Self { numer: n, denom: 1 }
    }

    pub fn numer(&self) -> u64 {
        self.numer
    }

    pub fn denom(&self) -> u64 {
        self.denom
    }

    pub fn is_zero(&self) -> bool {
        self.numer == 0
    }

    pub fn is_integer(&self) -> bool {
        self.denom == 1
    }

    /// The integer value, if this ratio is whole.
    pub fn to_integer(&self) -> Option<u64> {
        self.is_integer().then_some(self.numer)
    }

    /// Reduce a `u128` fraction and narrow it back to `u64`.
    fn from_wide(numer: u128, denom: u128) -> Option<Self> {
        if denom == 0 {
            return None;
        }
        let g = gcd_u128(numer, denom).max(1);
        Some(Self {
            numer: u64::try_from(numer / g).ok()?,
            denom: u64::try_from(denom / g).ok()?,
        })
    }

    /// Exact product, or `None` if the reduced result does not fit.
    pub fn checked_mul(self, rhs: Ratio) -> Option<Ratio> {
        Self::from_wide(
            self.numer as u128 * rhs.numer as u128,
            self.denom as u128 * rhs.denom as u128,
        )
    }

    /// Exact quotient, or `None` when dividing by zero or on overflow.
    pub fn checked_div(self, rhs: Ratio) -> Option<Ratio> {
        Self::from_wide(
            self.numer as u128 * rhs.denom as u128,
            self.denom as u128 * rhs.numer as u128,
        )
    }

    pub fn checked_add(self, rhs: Ratio) -> Option<Ratio> {
        let numer = (self.numer as u128 * rhs.denom as u128)
            .checked_add(rhs.numer as u128 * self.denom as u128)?;
        Self::from_wide(numer, self.denom as u128 * rhs.denom as u128)
    }

    /// `self - rhs`, or `None` if the result would be negative.
    pub fn checked_sub(self, rhs: Ratio) -> Option<Ratio> {
        let lhs = self.numer as u128 * rhs.denom as u128;
        let sub = rhs.numer as u128 * self.denom as u128;
        Self::from_wide(lhs.checked_sub(sub)?, self.denom as u128 * rhs.denom as u128)
    }

    /// Absolute difference.
    pub fn abs_diff(self, rhs: Ratio) -> Option<Ratio> {
        if self >= rhs {
            self.checked_sub(rhs)
        } else {
            rhs.checked_sub(self)
        }
    }

    /// Remainder modulo a positive integer (used to normalise phase angles).
    pub fn rem_integer(self, modulus: u64) -> Ratio {
        if modulus == 0 {
            return self;
        }
        let span = modulus as u128 * self.denom as u128;
        let numer = self.numer as u128 % span;
        // numer < span keeps the reduced value within u64.
        Self::from_wide(numer, self.denom as u128).unwrap_or(Ratio::ZERO)
    }

    /// Smallest integer not less than this value.
    pub fn ceil(&self) -> u64 {
        self.numer.div_ceil(self.denom)
    }

    /// Largest integer not greater than this value.
    pub fn floor(&self) -> u64 {
        self.numer / self.denom
    }
}

impl PartialOrd for Ratio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ratio {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.numer as u128 * other.denom as u128).cmp(&(other.numer as u128 * self.denom as u128))
    }
}

impl From<u64> for Ratio {
    fn from(n: u64) -> Self {
        Ratio::integer(n)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denom == 1 {
            write!(f, "{}", self.numer)
        } else {
            write!(f, "{}/{}", self.numer, self.denom)
        }
    }
}

/// Error parsing a ratio from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid ratio '{0}': expected N or N/D with D > 0")]
pub struct ParseRatioError(String);

impl FromStr for Ratio {
    type Err = ParseRatioError;

    /// Accepts `"N"` or `"N/D"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseRatioError(s.to_string());
        let s = s.trim();
        match s.split_once('/') {
            Some((n, d)) => {
                let n = n.trim().parse().map_err(|_| err())?;
                let d = d.trim().parse().map_err(|_| err())?;
                Ratio::new(n, d).ok_or_else(err)
            }
            None => s.parse().map(Ratio::integer).map_err(|_| err()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(n: u64, d: u64) -> Ratio {
        Ratio::new(n, d).unwrap()
    }

    #[test]
    fn reduces_on_construction() {
        let x = r(80_000_000, 100_000_000);
        assert_eq!((x.numer(), x.denom()), (4, 5));
        assert_eq!(r(0, 7), Ratio::ZERO);
        assert!(Ratio::new(1, 0).is_none());
    }

    #[test]
    fn gcd_and_lcm() {
        assert_eq!(gcd(100, 80), 20);
        assert_eq!(gcd(0, 9), 9);
        assert_eq!(lcm(4, 6), Some(12));
        assert_eq!(lcm(u64::MAX, u64::MAX - 1), None);
    }

    #[test]
    fn arithmetic_is_exact() {
        assert_eq!(r(4, 5).checked_mul(r(1, 2)), Some(r(2, 5)));
        assert_eq!(r(2, 5).checked_div(r(4, 5)), Some(r(1, 2)));
        assert_eq!(r(1, 3).checked_add(r(1, 6)), Some(r(1, 2)));
        assert_eq!(r(1, 3).checked_sub(r(1, 2)), None);
        assert_eq!(r(1, 3).abs_diff(r(1, 2)), Some(r(1, 6)));
    }

    #[test]
    fn large_products_do_not_overflow() {
        let big = Ratio::integer(u64::MAX);
        let half = r(1, 2);
        assert_eq!(big.checked_mul(half), Some(r(u64::MAX, 2)));
        assert_eq!(big.checked_mul(Ratio::integer(2)), None);
    }

    #[test]
    fn ordering_uses_cross_multiplication() {
        assert!(r(1, 3) < r(1, 2));
        assert!(r(2, 4) == r(1, 2));
        assert!(r(999_999, 1_000_000) < Ratio::ONE);
    }

    #[test]
    fn modulo_normalises() {
        assert_eq!(Ratio::integer(450).rem_integer(360), Ratio::integer(90));
        assert_eq!(r(721, 2).rem_integer(360), r(1, 2));
        assert_eq!(Ratio::integer(360).rem_integer(360), Ratio::ZERO);
    }

    #[test]
    fn ceil_and_floor() {
        assert_eq!(r(7, 2).ceil(), 4);
        assert_eq!(r(7, 2).floor(), 3);
        assert_eq!(Ratio::integer(5).ceil(), 5);
    }

    #[test]
    fn parse_and_display() {
        assert_eq!("45/2".parse::<Ratio>().unwrap(), r(45, 2));
        assert_eq!("270".parse::<Ratio>().unwrap(), Ratio::integer(270));
        assert!("1/0".parse::<Ratio>().is_err());
        assert!("abc".parse::<Ratio>().is_err());
        assert_eq!(r(45, 2).to_string(), "45/2");
        assert_eq!(Ratio::integer(90).to_string(), "90");
    }

    #[test]
    fn serde_rejects_zero_denominator() {
        let ok: Ratio = serde_json::from_str(r#"{"numer":2,"denom":4}"#).unwrap();
        assert_eq!(ok, r(1, 2));
        assert!(serde_json::from_str::<Ratio>(r#"{"numer":1,"denom":0}"#).is_err());
    }
}
