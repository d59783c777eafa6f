//! Pure, stateless kernels for handling nullability.
//!
//! A mask is one byte per cell, 1 = null. Masks ride alongside data
//! through the pipeline: sources derive them from the nodata sentinel,
//! binary operations union them, and materialization writes the sentinel
//! back into masked cells.

use num_traits::AsPrimitive;

use crate::traits::RasterElement;

/// Builds a mask from a nodata sentinel: cells equal to the sentinel (or
/// NaN, when the sentinel is NaN) are null.
pub fn mask_from_null_value<T: RasterElement>(data: &[T], null_value: f64) -> Vec<u8> {
    if null_value.is_nan() {
        data.iter()
            .map(|&v| {
                let vf: f64 = v.as_();
                vf.is_nan() as u8
            })
            .collect()
    } else {
        let sentinel = T::from_f64_lossy(null_value);
        data.iter().map(|&v| (v == sentinel) as u8).collect()
    }
}

/// Unions two optional masks: a cell is null if it is null in either.
pub fn union(a: Option<&[u8]>, b: Option<&[u8]>) -> Option<Vec<u8>> {
    match (a, b) {
        (None, None) => None,
        (Some(m), None) | (None, Some(m)) => Some(m.to_vec()),
        (Some(ma), Some(mb)) => {
            debug_assert_eq!(ma.len(), mb.len());
            Some(
                ma.iter()
                    .zip(mb.iter())
                    .map(|(&x, &y)| (x != 0 || y != 0) as u8)
                    .collect(),
            )
        }
    }
}

/// Writes the nodata sentinel into masked cells, in place. This is the
/// "burn" step run at materialization and save time.
pub fn write_null_value<T: RasterElement>(data: &mut [T], mask: &[u8], null_value: f64) {
    debug_assert_eq!(data.len(), mask.len());
    let sentinel = T::from_f64_lossy(null_value);
    for (v, &m) in data.iter_mut().zip(mask.iter()) {
        if m != 0 {
            *v = sentinel;
        }
    }
}

/// True when no cell is masked; such masks are dropped to keep the fast
/// unmasked path.
pub fn is_all_valid(mask: &[u8]) -> bool {
    mask.iter().all(|&m| m == 0)
}
