//! Checked signed integer token amounts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MathError;

/// Signed integer amount in the base denom.
///
/// 128 bits leave ~38 decimal digits of headroom over any realistic supply.
/// All arithmetic is checked; overflow is a hard error, never a wrap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Int(i128);

impl Int {
    pub const fn new(value: i128) -> Self {
        Int(value)
    }

    pub const fn zero() -> Self {
        Int(0)
    }

    pub const fn raw(&self) -> i128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn abs(&self) -> Result<Int, MathError> {
        self.0.checked_abs().map(Int).ok_or(MathError::Overflow)
    }

    pub fn checked_add(&self, other: &Int) -> Result<Int, MathError> {
        self.0.checked_add(other.0).map(Int).ok_or(MathError::Overflow)
    }

    pub fn checked_sub(&self, other: &Int) -> Result<Int, MathError> {
        self.0.checked_sub(other.0).map(Int).ok_or(MathError::Overflow)
    }

    pub fn checked_mul(&self, other: &Int) -> Result<Int, MathError> {
        self.0.checked_mul(other.0).map(Int).ok_or(MathError::Overflow)
    }
}

impl From<i64> for Int {
    fn from(value: i64) -> Self {
        Int(value as i128)
    }
}

impl From<u64> for Int {
    fn from(value: u64) -> Self {
        Int(value as i128)
    }
}

impl fmt::Display for Int {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Int {
    type Err = MathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i128>()
            .map(Int)
            .map_err(|_| MathError::InvalidInput(format!("bad integer: {s:?}")))
    }
}
