//! Arithmetic error taxonomy.
//!
//! Every failure here is fatal to the block that triggered it: the caller is
//! expected to propagate it and let the surrounding transaction roll back.

use thiserror::Error;

/// Errors produced by [`crate::Dec`] and [`crate::Int`] arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    /// A result exceeded the representable range. Never wraps silently.
    #[error("arithmetic overflow")]
    Overflow,

    /// Division or modulo by zero.
    #[error("division by zero")]
    DivideByZero,

    /// `ln` of zero or a negative value.
    #[error("logarithm of a non-positive value")]
    NonPositiveLog,

    /// Malformed numeric literal or an operand outside the operation's
    /// domain (e.g. a negative base with a fractional exponent).
    #[error("invalid numeric input: {0}")]
    InvalidInput(String),
}
