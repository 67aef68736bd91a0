//! Signed fixed-point decimal with 30 fractional digits.
//!
//! A [`Dec`] is `sign × magnitude × 10⁻³⁰` where the magnitude is a `U256`.
//! Products are formed in full 512-bit width before rescaling, so
//! multiplication and division never lose high bits; the only precision loss
//! anywhere is the final truncation toward zero at the 30th fractional digit.
//!
//! ## Consensus-critical
//!
//! All operations are deterministic. `exp` and `ln` are truncated series
//! whose term counts depend only on their inputs. Changing the scale, the
//! pinned `ln 2` mantissa, or the truncation direction is a hard fork.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use primitive_types::{U256, U512};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::MathError;
use crate::int::Int;

/// Number of fractional decimal digits carried by every [`Dec`].
pub const DECIMAL_PLACES: u32 = 30;

/// `ln 2` truncated to 30 fractional digits.
const LN2_MANTISSA: &str = "693147180559945309417232121458";

/// Largest argument accepted by [`Dec::exp`]; `e^108` is still representable,
/// anything meaningfully larger is not.
const MAX_EXP_INPUT: i64 = 108;

/// Below this argument `e^x` truncates to zero at 30 fractional digits.
const MIN_EXP_INPUT: i64 = -150;

/// Hard cap on series iterations. The series below converge in well under a
/// hundred terms; hitting the cap would indicate a logic error, not an input.
const MAX_SERIES_TERMS: u32 = 500;

fn scale() -> U256 {
    U256::exp10(DECIMAL_PLACES as usize)
}

fn scale_512() -> U512 {
    U512::from(scale())
}

fn ln2() -> Dec {
    // Pinned constant; the literal is well-formed by construction.
    Dec::from_raw(U256::from_dec_str(LN2_MANTISSA).expect("pinned ln2 mantissa"), false)
}

/// Narrow a 512-bit intermediate back to 256 bits, or fail on overflow.
fn narrow(wide: U512) -> Result<U256, MathError> {
    if wide > U512::from(U256::MAX) {
        return Err(MathError::Overflow);
    }
    let mut bytes = [0u8; 64];
    wide.to_big_endian(&mut bytes);
    Ok(U256::from_big_endian(&bytes[32..]))
}

/// Signed fixed-point decimal, scale 10⁻³⁰.
///
/// Zero is always stored non-negative so that `Eq` and `Ord` see a single
/// representation of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dec {
    neg: bool,
    mag: U256,
}

impl Dec {
    /// Build from a raw scaled magnitude. Internal and test use.
    pub fn from_raw(mag: U256, neg: bool) -> Self {
        if mag.is_zero() {
            Dec { neg: false, mag }
        } else {
            Dec { neg, mag }
        }
    }

    pub fn zero() -> Self {
        Dec { neg: false, mag: U256::zero() }
    }

    pub fn one() -> Self {
        Dec { neg: false, mag: scale() }
    }

    pub fn is_zero(&self) -> bool {
        self.mag.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.neg && !self.mag.is_zero()
    }

    pub fn abs(&self) -> Self {
        Dec::from_raw(self.mag, false)
    }

    pub fn neg(&self) -> Self {
        Dec::from_raw(self.mag, !self.neg)
    }

    pub fn lt(&self, other: &Dec) -> bool {
        self < other
    }

    /// Exact addition. Fails only on magnitude overflow.
    pub fn checked_add(&self, other: &Dec) -> Result<Dec, MathError> {
        if self.neg == other.neg {
            let mag = self.mag.checked_add(other.mag).ok_or(MathError::Overflow)?;
            Ok(Dec::from_raw(mag, self.neg))
        } else if self.mag >= other.mag {
            Ok(Dec::from_raw(self.mag - other.mag, self.neg))
        } else {
            Ok(Dec::from_raw(other.mag - self.mag, other.neg))
        }
    }

    /// Exact subtraction. Fails only on magnitude overflow.
    pub fn checked_sub(&self, other: &Dec) -> Result<Dec, MathError> {
        self.checked_add(&other.neg())
    }

    /// Multiplication with a full 512-bit intermediate product, truncated
    /// toward zero at the 30th fractional digit.
    pub fn checked_mul(&self, other: &Dec) -> Result<Dec, MathError> {
        let wide = self.mag.full_mul(other.mag) / scale_512();
        let mag = narrow(wide)?;
        Ok(Dec::from_raw(mag, self.neg != other.neg))
    }

    /// Division truncating toward zero. Fails with [`MathError::DivideByZero`]
    /// on a zero divisor.
    pub fn checked_quo(&self, other: &Dec) -> Result<Dec, MathError> {
        if other.mag.is_zero() {
            return Err(MathError::DivideByZero);
        }
        let wide = U512::from(self.mag) * scale_512() / U512::from(other.mag);
        let mag = narrow(wide)?;
        Ok(Dec::from_raw(mag, self.neg != other.neg))
    }

    /// Truncate toward zero into an [`Int`].
    pub fn trim(&self) -> Result<Int, MathError> {
        let whole = self.mag / scale();
        if whole > U256::from(u128::MAX) {
            return Err(MathError::Overflow);
        }
        let unsigned = whole.low_u128();
        if self.neg {
            if unsigned > i128::MAX as u128 + 1 {
                return Err(MathError::Overflow);
            }
            // -(i128::MIN) does not exist as a positive i128, handle directly.
            if unsigned == i128::MAX as u128 + 1 {
                return Ok(Int::new(i128::MIN));
            }
            Ok(Int::new(-(unsigned as i128)))
        } else {
            if unsigned > i128::MAX as u128 {
                return Err(MathError::Overflow);
            }
            Ok(Int::new(unsigned as i128))
        }
    }

    /// True when the value is an exact integer (no fractional part).
    pub fn is_integer(&self) -> bool {
        (self.mag % scale()).is_zero()
    }

    /// Integer power by square-and-multiply.
    pub fn powi(&self, mut exp: u64) -> Result<Dec, MathError> {
        let mut result = Dec::one();
        let mut base = *self;
        while exp > 0 {
            if exp & 1 == 1 {
                result = result.checked_mul(&base)?;
            }
            exp >>= 1;
            if exp > 0 {
                base = base.checked_mul(&base)?;
            }
        }
        Ok(result)
    }

    /// General power. Integer-valued exponents route through [`Dec::powi`] so
    /// rational powers whose exact value fits 30 fractional digits stay
    /// exact; fractional exponents use `exp(exponent · ln(base))` and require
    /// a positive base.
    pub fn pow(&self, exponent: &Dec) -> Result<Dec, MathError> {
        if exponent.is_integer() {
            let whole = exponent.mag / scale();
            if whole > U256::from(u64::MAX) {
                return Err(MathError::Overflow);
            }
            let n = whole.low_u64();
            let powed = self.powi(n)?;
            if exponent.is_negative() {
                return Dec::one().checked_quo(&powed);
            }
            return Ok(powed);
        }
        if self.is_zero() {
            if exponent.is_negative() {
                return Err(MathError::DivideByZero);
            }
            return Ok(Dec::zero());
        }
        if self.is_negative() {
            return Err(MathError::InvalidInput(
                "negative base with fractional exponent".to_string(),
            ));
        }
        self.ln()?.checked_mul(exponent)?.exp()
    }

    /// Natural exponential.
    ///
    /// Range-reduces `x = k·ln2 + r` with `|r| < ln 2`, sums the Taylor
    /// series for `e^r` until a term truncates to zero, then shifts the
    /// result by `2^k`. Arguments above 108 overflow; arguments below −150
    /// truncate to zero.
    pub fn exp(&self) -> Result<Dec, MathError> {
        if self.is_zero() {
            return Ok(Dec::one());
        }
        if *self > Dec::from(MAX_EXP_INPUT) {
            return Err(MathError::Overflow);
        }
        if *self < Dec::from(MIN_EXP_INPUT) {
            return Ok(Dec::zero());
        }

        let k_int = self.checked_quo(&ln2())?.trim()?;
        let k = k_int.raw();
        let r = self.checked_sub(&Dec::from(k).checked_mul(&ln2())?)?;

        let mut sum = Dec::one();
        let mut term = Dec::one();
        for n in 1..MAX_SERIES_TERMS {
            term = term.checked_mul(&r)?.checked_quo(&Dec::from(n as u64))?;
            if term.is_zero() {
                break;
            }
            sum = sum.checked_add(&term)?;
        }

        // Apply the 2^k factor with exact binary shifts.
        if k >= 0 {
            let shift = k as u32;
            if shift >= 256 || sum.mag.bits() as u32 + shift > 256 {
                return Err(MathError::Overflow);
            }
            Ok(Dec::from_raw(sum.mag << shift, false))
        } else {
            let shift = k.unsigned_abs();
            if shift >= 256 {
                return Ok(Dec::zero());
            }
            Ok(Dec::from_raw(sum.mag >> (shift as u32), false))
        }
    }

    /// Natural logarithm of a positive value.
    ///
    /// Range-reduces into `[1, 2)` with exact binary shifts, then sums the
    /// `atanh` series `ln y = 2·Σ t^(2i+1)/(2i+1)` with `t = (y−1)/(y+1)`
    /// until a term truncates to zero, and restores `k·ln 2`.
    pub fn ln(&self) -> Result<Dec, MathError> {
        if self.is_zero() || self.is_negative() {
            return Err(MathError::NonPositiveLog);
        }

        let one = scale();
        let two = one << 1u32;
        let mut y = self.mag;
        let mut k: i64 = 0;
        while y >= two {
            y = y >> 1u32;
            k += 1;
        }
        while y < one {
            y = y << 1u32;
            k -= 1;
        }

        let y = Dec::from_raw(y, false);
        let t = y
            .checked_sub(&Dec::one())?
            .checked_quo(&y.checked_add(&Dec::one())?)?;
        let t_sq = t.checked_mul(&t)?;

        let mut sum = t;
        let mut term = t;
        let mut n: u64 = 3;
        for _ in 0..MAX_SERIES_TERMS {
            term = term.checked_mul(&t_sq)?;
            let contribution = term.checked_quo(&Dec::from(n))?;
            if contribution.is_zero() {
                break;
            }
            sum = sum.checked_add(&contribution)?;
            n += 2;
        }

        let series = sum.checked_add(&sum)?;
        series.checked_add(&Dec::from(k).checked_mul(&ln2())?)
    }
}

impl Ord for Dec {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_negative(), other.is_negative()) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => self.mag.cmp(&other.mag),
            (true, true) => other.mag.cmp(&self.mag),
        }
    }
}

impl PartialOrd for Dec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<u64> for Dec {
    fn from(value: u64) -> Self {
        Dec::from_raw(U256::from(value) * scale(), false)
    }
}

impl From<i64> for Dec {
    fn from(value: i64) -> Self {
        Dec::from_raw(U256::from(value.unsigned_abs()) * scale(), value < 0)
    }
}

impl From<i128> for Dec {
    fn from(value: i128) -> Self {
        Dec::from_raw(U256::from(value.unsigned_abs()) * scale(), value < 0)
    }
}

impl From<&Int> for Dec {
    fn from(value: &Int) -> Self {
        Dec::from(value.raw())
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.mag / scale();
        let frac = self.mag % scale();
        let sign = if self.is_negative() { "-" } else { "" };
        if frac.is_zero() {
            return write!(f, "{sign}{whole}");
        }
        let frac_str =
            format!("{:0>width$}", frac.to_string(), width = DECIMAL_PLACES as usize);
        write!(f, "{sign}{whole}.{}", frac_str.trim_end_matches('0'))
    }
}

impl FromStr for Dec {
    type Err = MathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (neg, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        if body.is_empty() {
            return Err(MathError::InvalidInput(format!("empty decimal: {s:?}")));
        }
        let (whole_str, frac_str) = match body.split_once('.') {
            Some((w, fr)) => (w, fr),
            None => (body, ""),
        };
        if whole_str.is_empty() && frac_str.is_empty() {
            return Err(MathError::InvalidInput(format!("empty decimal: {s:?}")));
        }
        if frac_str.len() > DECIMAL_PLACES as usize {
            return Err(MathError::InvalidInput(format!(
                "more than {DECIMAL_PLACES} fractional digits: {s:?}"
            )));
        }
        let whole = if whole_str.is_empty() {
            U256::zero()
        } else {
            U256::from_dec_str(whole_str)
                .map_err(|_| MathError::InvalidInput(format!("bad integer part: {s:?}")))?
        };
        let frac = if frac_str.is_empty() {
            U256::zero()
        } else {
            let padded = format!("{frac_str:0<width$}", width = DECIMAL_PLACES as usize);
            U256::from_dec_str(&padded)
                .map_err(|_| MathError::InvalidInput(format!("bad fractional part: {s:?}")))?
        };
        let mag = whole
            .checked_mul(scale())
            .and_then(|w| w.checked_add(frac))
            .ok_or(MathError::Overflow)?;
        Ok(Dec::from_raw(mag, neg))
    }
}

impl Serialize for Dec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Dec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Dec::from_str(&s).map_err(de::Error::custom)
    }
}
