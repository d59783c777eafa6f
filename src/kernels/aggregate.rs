//! Block aggregation (coarsening) kernel: each `fy x fx` block of input
//! cells reduces to one output cell. The caller trims ragged edges, so the
//! input window always covers whole blocks.

use num_traits::AsPrimitive;

use crate::traits::RasterElement;

use super::stats::{reduce_values, StatKind};

/// Reduces one band's window to block statistics.
///
/// Returns per-block values (still f64; the executor casts to the output
/// dtype) and a per-block null flag set only when a whole block is
/// null/NaN.
pub fn coarsen<T: RasterElement>(
    data: &[T],
    mask: Option<&[u8]>,
    in_cols: usize,
    fy: usize,
    fx: usize,
    stat: StatKind,
) -> (Vec<f64>, Vec<u8>) {
    let in_rows = data.len() / in_cols;
    let out_rows = in_rows / fy;
    let out_cols = in_cols / fx;

    let mut values = Vec::with_capacity(fy * fx);
    let mut out = Vec::with_capacity(out_rows * out_cols);
    let mut out_mask = Vec::with_capacity(out_rows * out_cols);

    for br in 0..out_rows {
        for bc in 0..out_cols {
            values.clear();
            for i in 0..fy {
                for j in 0..fx {
                    let idx = (br * fy + i) * in_cols + (bc * fx + j);
                    if mask.map(|m| m[idx] != 0).unwrap_or(false) {
                        continue;
                    }
                    let v: f64 = data[idx].as_();
                    if v.is_nan() {
                        continue;
                    }
                    values.push(v);
                }
            }
            if values.is_empty() {
                out.push(f64::NAN);
                out_mask.push(1);
            } else {
                out.push(reduce_values(&mut values, stat));
                out_mask.push(0);
            }
        }
    }
    (out, out_mask)
}
