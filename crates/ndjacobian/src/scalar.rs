//! Scalar trait for tensor element types.

use faer_traits::ComplexField;
use std::fmt::Debug;
use std::ops::{Add, Mul, Neg, Sub};

/// Trait for scalar types supported by ndjacobian tensors.
///
/// Wraps faer's `ComplexField` (needed for GEMM) together with the
/// arithmetic operators the element-wise kernels use.
pub trait Scalar:
    ComplexField
    + Copy
    + Debug
    + Default
    + PartialEq
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    /// Returns the additive identity (zero).
    fn zero() -> Self {
        Self::default()
    }

    /// Returns the multiplicative identity (one).
    fn one() -> Self;

    /// Embed a real `f64` value.
    fn from_f64(value: f64) -> Self;
}

impl Scalar for f64 {
    fn one() -> Self {
        1.0
    }

    fn from_f64(value: f64) -> Self {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_one() {
        assert_eq!(f64::zero(), 0.0);
        assert_eq!(f64::one(), 1.0);
    }

    #[test]
    fn test_from_f64() {
        assert_eq!(f64::from_f64(2.5), 2.5);
        assert_eq!(f64::from_f64(-3.0), -3.0);
    }
}
