//! Scalar operands for raster-vs-scalar operations.

use super::RasterDataType;

/// A typed scalar value, used wherever an operation accepts either a raster
/// or a plain number (arithmetic, `select`, null replacement, ...).
///
/// Scalars are "weak" with respect to dtype promotion: an integer scalar
/// adopts the raster's dtype, while a float scalar forces integer rasters
/// up to Float64.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    /// The value as f64, the common currency of the kernels.
    pub fn as_f64(&self) -> f64 {
        match self {
            Scalar::Int(v) => *v as f64,
            Scalar::Float(v) => *v,
            Scalar::Bool(v) => *v as u8 as f64,
        }
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, Scalar::Float(v) if v.is_nan())
    }

    /// The dtype a binary operation with this scalar promotes to, given the
    /// raster operand's dtype.
    pub fn promote_with(&self, raster_dtype: RasterDataType) -> RasterDataType {
        match self {
            Scalar::Bool(_) => raster_dtype,
            Scalar::Int(_) => {
                if raster_dtype.is_bool() {
                    RasterDataType::Int64
                } else {
                    raster_dtype
                }
            }
            Scalar::Float(_) => {
                if raster_dtype.is_float() {
                    raster_dtype
                } else {
                    RasterDataType::Float64
                }
            }
        }
    }

    /// The dtype this scalar carries on its own, for promotion between two
    /// scalar operands (e.g. both arms of `select`).
    pub fn dtype(&self) -> RasterDataType {
        match self {
            Scalar::Int(_) => RasterDataType::Int64,
            Scalar::Float(_) => RasterDataType::Float64,
            Scalar::Bool(_) => RasterDataType::Boolean,
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(v as i64)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<f32> for Scalar {
    fn from(v: f32) -> Self {
        Scalar::Float(v as f64)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}
