//! Dtype cast kernels with Rust `as` semantics (float-to-int saturates,
//! NaN becomes 0). Casting to Boolean is a non-zero test, like NumPy's
//! `astype(bool)`.

use num_traits::AsPrimitive;

use crate::error::Result;
use crate::traits::RasterElement;
use crate::types::RasterDataType;
use crate::utils::{safe_bytes_to_typed_slice, typed_slice_to_bytes};

use super::dispatch_dtype;

fn cast_slice<S, D>(src: &[S]) -> Vec<D>
where
    S: RasterElement + AsPrimitive<D>,
    D: RasterElement,
{
    src.iter().map(|&v| v.as_()).collect()
}

fn to_bool_slice<S: RasterElement>(src: &[S]) -> Vec<u8> {
    let zero = S::from_f64_lossy(0.0);
    src.iter().map(|&v| (v != zero) as u8).collect()
}

/// Casts an untyped tile buffer from one dtype to another. Returns a fresh
/// byte buffer in the destination dtype's layout.
pub fn cast_bytes(bytes: &[u8], from: RasterDataType, to: RasterDataType) -> Result<Vec<u8>> {
    if from == to {
        return Ok(bytes.to_vec());
    }
    dispatch_dtype!(from, S => {
        let src = safe_bytes_to_typed_slice::<S>(bytes)?;
        if to == RasterDataType::Boolean {
            return Ok(to_bool_slice(src));
        }
        dispatch_dtype!(to, D => {
            let out: Vec<D> = cast_slice::<S, D>(src);
            Ok(typed_slice_to_bytes(&out))
        })
    })
}
