//! This module defines the shared trait bound that links runtime
//! `RasterDataType` values to the primitive types the kernels are generic
//! over.

use num_traits::{AsPrimitive, FromPrimitive, NumCast, ToPrimitive};

use crate::types::RasterDataType;

/// The bound every cell type must satisfy to flow through the kernels:
/// plain-old-data (so tiles can be viewed as byte buffers), ordered,
/// and convertible to/from `f64`, the common currency of the statistics
/// kernels.
pub trait RasterElement:
    Copy
    + bytemuck::Pod
    + PartialOrd
    + PartialEq
    + NumCast
    + ToPrimitive
    + FromPrimitive
    + AsPrimitive<f64>
    + Send
    + Sync
    + 'static
{
    /// The dtype this primitive stores. (`u8` maps to `UInt8`; boolean
    /// tiles are built explicitly, not through this constant.)
    const DTYPE: RasterDataType;

    /// Converts from f64 with `as`-cast semantics (saturating, NaN -> 0).
    fn from_f64_lossy(v: f64) -> Self;
}

macro_rules! impl_raster_element {
    ($(($T:ty, $dtype:ident)),+ $(,)?) => {
        $(
            impl RasterElement for $T {
                const DTYPE: RasterDataType = RasterDataType::$dtype;

                #[inline]
                fn from_f64_lossy(v: f64) -> Self {
                    // `AsPrimitive<$T>` gives Rust `as` conversion semantics.
                    AsPrimitive::<$T>::as_(v)
                }
            }
        )+
    };
}

impl_raster_element!(
    (u8, UInt8),
    (u16, UInt16),
    (u32, UInt32),
    (u64, UInt64),
    (i8, Int8),
    (i16, Int16),
    (i32, Int32),
    (i64, Int64),
    (f32, Float32),
    (f64, Float64),
);
