//! Range remapping: values in `[min, max)` become `new_value`, first
//! matching range wins, everything else passes through. Null cells are
//! left untouched (they stay masked).

use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};

use crate::traits::RasterElement;

/// One `[min, max) -> new_value` rule.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RangeMapping {
    pub min: f64,
    pub max: f64,
    pub new_value: f64,
}

pub fn remap_slice<T: RasterElement>(
    data: &[T],
    mask: Option<&[u8]>,
    mappings: &[RangeMapping],
) -> Vec<T> {
    let mut out = Vec::with_capacity(data.len());
    for (idx, &v) in data.iter().enumerate() {
        if mask.map(|m| m[idx] != 0).unwrap_or(false) {
            out.push(v);
            continue;
        }
        let vf: f64 = v.as_();
        let mut mapped = v;
        for m in mappings {
            if vf >= m.min && vf < m.max {
                mapped = T::from_f64_lossy(m.new_value);
                break;
            }
        }
        out.push(mapped);
    }
    out
}
