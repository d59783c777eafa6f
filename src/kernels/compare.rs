//! Element-wise comparison kernels, producing boolean (byte 0/1) buffers.
//!
//! Float comparisons follow IEEE semantics: any comparison against NaN is
//! false, except `ne`, which is true. This matches NumPy.

use serde::{Deserialize, Serialize};

use crate::traits::RasterElement;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[inline]
fn apply<T: RasterElement>(a: T, b: T, op: CmpOp) -> u8 {
    let res = match op {
        CmpOp::Eq => a == b,
        CmpOp::Ne => a != b,
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b,
        CmpOp::Gt => a > b,
        CmpOp::Ge => a >= b,
    };
    res as u8
}

pub fn compare_slices<T: RasterElement>(lhs: &[T], rhs: &[T], op: CmpOp) -> Vec<u8> {
    debug_assert_eq!(lhs.len(), rhs.len());
    lhs.iter()
        .zip(rhs.iter())
        .map(|(&a, &b)| apply(a, b, op))
        .collect()
}

pub fn compare_scalar<T: RasterElement>(
    data: &[T],
    scalar: T,
    op: CmpOp,
    scalar_on_left: bool,
) -> Vec<u8> {
    if scalar_on_left {
        data.iter().map(|&v| apply(scalar, v, op)).collect()
    } else {
        data.iter().map(|&v| apply(v, scalar, op)).collect()
    }
}
