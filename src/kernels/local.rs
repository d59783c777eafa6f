//! Across-band ("local") reduction kernel: every pixel's band values
//! collapse to a single output band.

use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::RasterError;
use crate::traits::RasterElement;

use super::stats::{reduce_values, StatKind};

/// The reducers accepted by `local_stats`: the shared statistic set plus
/// the band-index reducers.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum LocalReducer {
    Stat(StatKind),
    /// Index (0-based) of the band holding the minimum valid value.
    MinBand,
    /// Index (0-based) of the band holding the maximum valid value.
    MaxBand,
}

impl LocalReducer {
    pub fn parse(name: &str) -> Result<Self, RasterError> {
        match name.to_ascii_lowercase().as_str() {
            "minband" => Ok(LocalReducer::MinBand),
            "maxband" => Ok(LocalReducer::MaxBand),
            other => Ok(LocalReducer::Stat(StatKind::parse(other)?)),
        }
    }
}

/// Reduces a `(bands, cells)` window to one band.
///
/// Returns per-cell f64 results plus a null flag set where every band is
/// null/NaN.
pub fn local_reduce<T: RasterElement>(
    data: &[T],
    mask: Option<&[u8]>,
    bands: usize,
    cells: usize,
    reducer: LocalReducer,
) -> (Vec<f64>, Vec<u8>) {
    debug_assert_eq!(data.len(), bands * cells);

    let mut out = Vec::with_capacity(cells);
    let mut out_mask = Vec::with_capacity(cells);
    let mut values = Vec::with_capacity(bands);

    for cell in 0..cells {
        values.clear();
        let mut extreme: Option<(f64, usize)> = None;
        for band in 0..bands {
            let idx = band * cells + cell;
            if mask.map(|m| m[idx] != 0).unwrap_or(false) {
                continue;
            }
            let v: f64 = data[idx].as_();
            if v.is_nan() {
                continue;
            }
            match reducer {
                LocalReducer::Stat(_) => values.push(v),
                LocalReducer::MinBand => {
                    if extreme.map(|(best, _)| v < best).unwrap_or(true) {
                        extreme = Some((v, band));
                    }
                }
                LocalReducer::MaxBand => {
                    if extreme.map(|(best, _)| v > best).unwrap_or(true) {
                        extreme = Some((v, band));
                    }
                }
            }
        }
        match reducer {
            LocalReducer::Stat(stat) => {
                if values.is_empty() {
                    out.push(f64::NAN);
                    out_mask.push(1);
                } else {
                    out.push(reduce_values(&mut values, stat));
                    out_mask.push(0);
                }
            }
            LocalReducer::MinBand | LocalReducer::MaxBand => match extreme {
                Some((_, band)) => {
                    out.push(band as f64);
                    out_mask.push(0);
                }
                None => {
                    out.push(f64::NAN);
                    out_mask.push(1);
                }
            },
        }
    }
    (out, out_mask)
}
