//! This module defines the canonical, type-safe representation of cell data
//! types used throughout the raster pipeline.

use crate::error::RasterError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The canonical, internal representation of a raster cell type.
///
/// This enum replaces a stringly-typed dtype system, enabling compile-time
/// checks and eliminating an entire class of runtime errors. Booleans are
/// stored as one byte per cell (0 or 1).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RasterDataType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Boolean,
}

impl RasterDataType {
    /// Parses the usual dtype spellings ("uint8", "i32", "float", ...),
    /// case-insensitively.
    pub fn parse(name: &str) -> Result<Self, RasterError> {
        use RasterDataType::*;
        match name.to_ascii_lowercase().as_str() {
            "uint8" | "u8" => Ok(UInt8),
            "uint16" | "u16" => Ok(UInt16),
            "uint32" | "u32" => Ok(UInt32),
            "uint64" | "u64" => Ok(UInt64),
            "int8" | "i8" => Ok(Int8),
            "int16" | "i16" => Ok(Int16),
            "int32" | "i32" => Ok(Int32),
            "int64" | "i64" | "int" => Ok(Int64),
            "float32" | "f32" => Ok(Float32),
            "float64" | "f64" | "float" => Ok(Float64),
            "bool" | "boolean" => Ok(Boolean),
            other => Err(RasterError::UnsupportedType(format!(
                "Cannot parse '{}' as a raster data type",
                other
            ))),
        }
    }

    /// The size of one cell in bytes.
    pub fn size_of(&self) -> usize {
        use RasterDataType::*;
        match self {
            Int8 | UInt8 | Boolean => 1,
            Int16 | UInt16 => 2,
            Int32 | UInt32 | Float32 => 4,
            Int64 | UInt64 | Float64 => 8,
        }
    }

    /// Returns `true` if the data type is a signed integer.
    pub fn is_signed_int(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    /// Returns `true` if the data type is an unsigned integer.
    pub fn is_unsigned_int(&self) -> bool {
        matches!(
            self,
            Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64
        )
    }

    /// Returns `true` for any integer type, signed or unsigned.
    pub fn is_int(&self) -> bool {
        self.is_signed_int() || self.is_unsigned_int()
    }

    /// Returns `true` if the data type is a floating-point number.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Self::Boolean)
    }

    /// Integer bit width; floats and booleans report their storage width.
    fn bits(&self) -> u32 {
        (self.size_of() * 8) as u32
    }

    /// The default sentinel written into masked cells when a raster is
    /// materialized or saved: NaN for floats, MIN for signed integers,
    /// MAX for unsigned integers, 0 for booleans.
    pub fn default_null_value(&self) -> f64 {
        use RasterDataType::*;
        match self {
            Float32 | Float64 => f64::NAN,
            Int8 => i8::MIN as f64,
            Int16 => i16::MIN as f64,
            Int32 => i32::MIN as f64,
            Int64 => i64::MIN as f64,
            UInt8 => u8::MAX as f64,
            UInt16 => u16::MAX as f64,
            UInt32 => u32::MAX as f64,
            UInt64 => u64::MAX as f64,
            Boolean => 0.0,
        }
    }

    /// The smallest unsigned type that can represent values `0..=n`.
    pub fn min_scalar_uint(n: u64) -> Self {
        if n <= u8::MAX as u64 {
            Self::UInt8
        } else if n <= u16::MAX as u64 {
            Self::UInt16
        } else if n <= u32::MAX as u64 {
            Self::UInt32
        } else {
            Self::UInt64
        }
    }

    /// Widens an unsigned type to the signed type that can also hold a
    /// default null sentinel, mirroring the dtype adjustment the original
    /// unique/band-index statistics perform on masked rasters.
    pub fn widen_for_null(&self) -> Self {
        use RasterDataType::*;
        match self {
            UInt8 | Int8 => Int16,
            UInt16 => Int32,
            UInt32 => Int64,
            other => *other,
        }
    }

    /// NumPy `promote_types` for the supported dtype set.
    ///
    /// Booleans promote to the other operand; same-kind integers take the
    /// wider width; mixed signed/unsigned takes the next signed width able
    /// to hold both (falling back to Float64 past Int64); int/float mixes
    /// stay Float32 only when the integer fits in 16 bits.
    pub fn promote(a: Self, b: Self) -> Self {
        use RasterDataType::*;
        if a == b {
            return a;
        }
        if a == Boolean {
            return b;
        }
        if b == Boolean {
            return a;
        }
        match (a.is_float(), b.is_float()) {
            (true, true) => {
                if a == Float64 || b == Float64 {
                    Float64
                } else {
                    Float32
                }
            }
            (true, false) | (false, true) => {
                let (f, i) = if a.is_float() { (a, b) } else { (b, a) };
                if f == Float32 && i.bits() <= 16 {
                    Float32
                } else {
                    Float64
                }
            }
            (false, false) => Self::promote_ints(a, b),
        }
    }

    fn promote_ints(a: Self, b: Self) -> Self {
        use RasterDataType::*;
        match (a.is_signed_int(), b.is_signed_int()) {
            (true, true) | (false, false) => {
                if a.bits() >= b.bits() {
                    a
                } else {
                    b
                }
            }
            _ => {
                let (s, u) = if a.is_signed_int() { (a, b) } else { (b, a) };
                if s.bits() > u.bits() {
                    return s;
                }
                // The unsigned operand is at least as wide; step up to the
                // next signed width that can hold it.
                match u {
                    UInt8 => Int16,
                    UInt16 => Int32,
                    UInt32 => Int64,
                    _ => Float64,
                }
            }
        }
    }

    /// Promotes to a floating-point result, as NumPy true division does.
    pub fn promote_to_float(a: Self, b: Self) -> Self {
        let p = Self::promote(a, b);
        if p.is_float() {
            p
        } else if p.bits() <= 16 && (a == Self::Float32 || b == Self::Float32) {
            Self::Float32
        } else {
            Self::Float64
        }
    }
}

/// Provides the canonical string representation for a `RasterDataType`.
impl fmt::Display for RasterDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // These string representations are part of the public contract.
        write!(f, "{:?}", self)
    }
}

#[cfg(feature = "gdal")]
impl RasterDataType {
    /// Converts a GDAL band type into a `RasterDataType`.
    pub fn from_gdal_type(gdal_type: gdal::raster::GdalDataType) -> Result<Self, RasterError> {
        use gdal::raster::GdalDataType as G;
        match gdal_type {
            G::UInt8 => Ok(Self::UInt8),
            G::UInt16 => Ok(Self::UInt16),
            G::UInt32 => Ok(Self::UInt32),
            G::Int8 => Ok(Self::Int8),
            G::Int16 => Ok(Self::Int16),
            G::Int32 => Ok(Self::Int32),
            G::Float32 => Ok(Self::Float32),
            G::Float64 => Ok(Self::Float64),
            dt => Err(RasterError::UnsupportedType(format!(
                "Cannot convert GDAL band type {:?} to RasterDataType",
                dt
            ))),
        }
    }
}
