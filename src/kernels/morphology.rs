//! Grey and binary morphology over rectangular footprints.
//!
//! Grey erosion/dilation take the window min/max; the executor pre-fills
//! padded and null cells with the dtype's MAX (erosion) or MIN (dilation)
//! so they never win. The binary variants run on validity buffers with the
//! border treated as invalid, which shrinks or grows the valid region the
//! same way the data is shrunk or grown.

use serde::{Deserialize, Serialize};

use crate::traits::RasterElement;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphOp {
    Erosion,
    Dilation,
}

/// Window min (erosion) or max (dilation) over a `(fr, fc)` footprint.
///
/// `padded` has shape `(out_rows + fr - 1, out_cols + fc - 1)` flattened
/// row-major with `padded_cols = out_cols + fc - 1`.
pub fn grey_morph<T: RasterElement>(
    padded: &[T],
    padded_cols: usize,
    out_rows: usize,
    out_cols: usize,
    fr: usize,
    fc: usize,
    op: MorphOp,
) -> Vec<T> {
    let mut out = Vec::with_capacity(out_rows * out_cols);
    for r in 0..out_rows {
        for c in 0..out_cols {
            let mut acc = padded[r * padded_cols + c];
            for i in 0..fr {
                for j in 0..fc {
                    let v = padded[(r + i) * padded_cols + (c + j)];
                    let keep = match op {
                        MorphOp::Erosion => v < acc,
                        MorphOp::Dilation => v > acc,
                    };
                    if keep {
                        acc = v;
                    }
                }
            }
            out.push(acc);
        }
    }
    out
}

/// Binary morphology on a 0/1 validity buffer: erosion keeps a cell valid
/// only when its whole window is valid; dilation marks it valid when any
/// window cell is.
pub fn binary_morph(
    padded: &[u8],
    padded_cols: usize,
    out_rows: usize,
    out_cols: usize,
    fr: usize,
    fc: usize,
    op: MorphOp,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(out_rows * out_cols);
    for r in 0..out_rows {
        for c in 0..out_cols {
            let mut acc = match op {
                MorphOp::Erosion => 1u8,
                MorphOp::Dilation => 0u8,
            };
            'window: for i in 0..fr {
                for j in 0..fc {
                    let v = padded[(r + i) * padded_cols + (c + j)];
                    match op {
                        MorphOp::Erosion if v == 0 => {
                            acc = 0;
                            break 'window;
                        }
                        MorphOp::Dilation if v != 0 => {
                            acc = 1;
                            break 'window;
                        }
                        _ => {}
                    }
                }
            }
            out.push(acc);
        }
    }
    out
}
