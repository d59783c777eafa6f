//! Element-wise arithmetic kernels.
//!
//! Semantics follow NumPy: integer add/sub/mul wrap, modulo is floored
//! (result takes the divisor's sign), and division is only ever invoked on
//! floating-point buffers because the planner promotes its output dtype to
//! float. Kernels are oblivious to masks; null handling is layered on by
//! the executor, which unions input masks.

use serde::{Deserialize, Serialize};

use crate::traits::RasterElement;

/// The binary arithmetic operations a plan node can carry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

/// Per-type arithmetic semantics. Integers wrap like NumPy's fixed-width
/// types; floats follow IEEE rules.
pub trait NumOps: RasterElement {
    fn add(a: Self, b: Self) -> Self;
    fn sub(a: Self, b: Self) -> Self;
    fn mul(a: Self, b: Self) -> Self;
    fn div(a: Self, b: Self) -> Self;
    fn rem_floored(a: Self, b: Self) -> Self;
    fn pow(a: Self, b: Self) -> Self;
    fn neg(a: Self) -> Self;
}

macro_rules! impl_numops_signed {
    ($($T:ty),+) => {
        $(
            impl NumOps for $T {
                #[inline]
                fn add(a: Self, b: Self) -> Self { a.wrapping_add(b) }
                #[inline]
                fn sub(a: Self, b: Self) -> Self { a.wrapping_sub(b) }
                #[inline]
                fn mul(a: Self, b: Self) -> Self { a.wrapping_mul(b) }
                #[inline]
                fn div(a: Self, b: Self) -> Self {
                    if b == 0 { 0 } else { a.wrapping_div(b) }
                }
                #[inline]
                fn rem_floored(a: Self, b: Self) -> Self {
                    if b == 0 {
                        return 0;
                    }
                    let r = a.wrapping_rem(b);
                    if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r }
                }
                #[inline]
                fn pow(a: Self, b: Self) -> Self {
                    Self::from_f64_lossy((a as f64).powf(b as f64).round())
                }
                #[inline]
                fn neg(a: Self) -> Self { a.wrapping_neg() }
            }
        )+
    };
}

macro_rules! impl_numops_unsigned {
    ($($T:ty),+) => {
        $(
            impl NumOps for $T {
                #[inline]
                fn add(a: Self, b: Self) -> Self { a.wrapping_add(b) }
                #[inline]
                fn sub(a: Self, b: Self) -> Self { a.wrapping_sub(b) }
                #[inline]
                fn mul(a: Self, b: Self) -> Self { a.wrapping_mul(b) }
                #[inline]
                fn div(a: Self, b: Self) -> Self {
                    if b == 0 { 0 } else { a / b }
                }
                #[inline]
                fn rem_floored(a: Self, b: Self) -> Self {
                    if b == 0 { 0 } else { a % b }
                }
                #[inline]
                fn pow(a: Self, b: Self) -> Self {
                    Self::from_f64_lossy((a as f64).powf(b as f64).round())
                }
                #[inline]
                fn neg(a: Self) -> Self { a.wrapping_neg() }
            }
        )+
    };
}

macro_rules! impl_numops_float {
    ($($T:ty),+) => {
        $(
            impl NumOps for $T {
                #[inline]
                fn add(a: Self, b: Self) -> Self { a + b }
                #[inline]
                fn sub(a: Self, b: Self) -> Self { a - b }
                #[inline]
                fn mul(a: Self, b: Self) -> Self { a * b }
                #[inline]
                fn div(a: Self, b: Self) -> Self { a / b }
                #[inline]
                fn rem_floored(a: Self, b: Self) -> Self {
                    // Result carries the divisor's sign, like NumPy's mod.
                    a - b * (a / b).floor()
                }
                #[inline]
                fn pow(a: Self, b: Self) -> Self { a.powf(b) }
                #[inline]
                fn neg(a: Self) -> Self { -a }
            }
        )+
    };
}

impl_numops_signed!(i8, i16, i32, i64);
impl_numops_unsigned!(u8, u16, u32, u64);
impl_numops_float!(f32, f64);

#[inline]
fn apply<T: NumOps>(a: T, b: T, op: BinaryOp) -> T {
    match op {
        BinaryOp::Add => T::add(a, b),
        BinaryOp::Subtract => T::sub(a, b),
        BinaryOp::Multiply => T::mul(a, b),
        BinaryOp::Divide => T::div(a, b),
        BinaryOp::Modulo => T::rem_floored(a, b),
        BinaryOp::Power => T::pow(a, b),
    }
}

/// Element-wise `lhs op rhs` for two equal-length buffers.
pub fn binary_slices<T: NumOps>(lhs: &[T], rhs: &[T], op: BinaryOp) -> Vec<T> {
    debug_assert_eq!(lhs.len(), rhs.len());
    lhs.iter()
        .zip(rhs.iter())
        .map(|(&a, &b)| apply(a, b, op))
        .collect()
}

/// Element-wise `data op scalar` (or `scalar op data` when
/// `scalar_on_left` is set, which matters for the non-commutative ops).
pub fn binary_scalar<T: NumOps>(data: &[T], scalar: T, op: BinaryOp, scalar_on_left: bool) -> Vec<T> {
    if scalar_on_left {
        data.iter().map(|&v| apply(scalar, v, op)).collect()
    } else {
        data.iter().map(|&v| apply(v, scalar, op)).collect()
    }
}

/// Element-wise negation.
pub fn negate<T: NumOps>(data: &[T]) -> Vec<T> {
    data.iter().map(|&v| T::neg(v)).collect()
}

//==================================================================================
// Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_wraps_like_numpy() {
        let out = binary_slices::<u8>(&[200, 1], &[100, 2], BinaryOp::Add);
        assert_eq!(out, vec![44, 3]);
    }

    #[test]
    fn test_scalar_on_left_subtract() {
        let out = binary_scalar::<i32>(&[1, 2, 3], 10, BinaryOp::Subtract, true);
        assert_eq!(out, vec![9, 8, 7]);
    }

    #[test]
    fn test_floored_mod_signed() {
        // NumPy: -7 % 3 == 2, 7 % -3 == -2
        assert_eq!(i32::rem_floored(-7, 3), 2);
        assert_eq!(i32::rem_floored(7, -3), -2);
        assert_eq!(i32::rem_floored(7, 3), 1);
        assert_eq!(i32::rem_floored(-7, 0), 0);
    }

    #[test]
    fn test_floored_mod_float() {
        assert!((f64::rem_floored(-7.5, 3.0) - 1.5).abs() < 1e-12);
        assert!((f64::rem_floored(7.5, -3.0) - -1.5).abs() < 1e-12);
        assert!(f64::rem_floored(1.0, 0.0).is_nan());
    }

    #[test]
    fn test_int_pow() {
        let out = binary_scalar::<i64>(&[2, 3, 4], 3, BinaryOp::Power, false);
        assert_eq!(out, vec![8, 27, 64]);
    }

    #[test]
    fn test_float_division() {
        let out = binary_slices::<f64>(&[1.0, 4.0], &[2.0, 0.0], BinaryOp::Divide);
        assert_eq!(out[0], 0.5);
        assert!(out[1].is_infinite());
    }

    #[test]
    fn test_negate_unsigned_wraps() {
        assert_eq!(negate::<u8>(&[0, 1, 255]), vec![0, 255, 1]);
    }
}
