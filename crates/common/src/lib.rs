//! # Cortex Common — Deterministic Numerics
//!
//! Shared numeric primitives for the Cortex chain. Everything in this crate
//! is consensus-critical: identical inputs MUST produce bit-identical outputs
//! on every host, so there is no floating point anywhere and every operation
//! either succeeds exactly or fails with a typed [`MathError`].
//!
//! | Module | Provides |
//! |--------|----------|
//! | `dec`  | [`Dec`] — signed fixed-point decimal, 30 fractional digits |
//! | `int`  | [`Int`] — checked signed 128-bit token amount |
//! | `error`| [`MathError`] — arithmetic error taxonomy |
//!
//! ## Determinism contract
//!
//! - Addition, subtraction and multiplication are exact up to truncation at
//!   the 30th fractional digit (truncation toward zero, never rounding).
//! - Division truncates toward zero and fails on a zero divisor.
//! - `exp`/`ln` are truncated series with power-of-two range reduction
//!   against a pinned `ln 2` constant; the iteration count is a pure function
//!   of the input, so results are reproducible across hosts.
//! - Overflow is a hard error, never a wrap.

pub mod dec;
pub mod error;
pub mod int;

pub use dec::{Dec, DECIMAL_PLACES};
pub use error::MathError;
pub use int::Int;
