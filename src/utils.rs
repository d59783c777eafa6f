//! This module provides a set of shared, low-level utility functions used
//! throughout the raster core.
//!
//! Its primary responsibilities are safe, validated conversions between raw
//! byte buffers and typed slices, so that tiles can be stored untyped and
//! viewed through whichever primitive type their dtype dictates.

use bytemuck;

use crate::error::RasterError;

/// Safely reinterprets a byte slice as a slice of a primitive type.
///
/// This is the primary gateway for converting raw tile bytes into a
/// workable, typed slice. It performs the alignment and length checks
/// before creating a zero-copy view of the data.
pub fn safe_bytes_to_typed_slice<T>(bytes: &[u8]) -> Result<&[T], RasterError>
where
    T: bytemuck::Pod,
{
    bytemuck::try_cast_slice(bytes)
        .map_err(|e| RasterError::InternalError(format!("Failed to cast byte slice: {}", e)))
}

/// Mutable counterpart of [`safe_bytes_to_typed_slice`].
pub fn safe_bytes_to_typed_slice_mut<T>(bytes: &mut [u8]) -> Result<&mut [T], RasterError>
where
    T: bytemuck::Pod,
{
    bytemuck::try_cast_slice_mut(bytes)
        .map_err(|e| RasterError::InternalError(format!("Failed to cast byte slice: {}", e)))
}

/// Copies a typed slice into a fresh byte vector.
pub fn typed_slice_to_bytes<T>(data: &[T]) -> Vec<u8>
where
    T: bytemuck::Pod,
{
    bytemuck::cast_slice(data).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_u32() {
        let original: Vec<u32> = vec![1, 2, 3, u32::MAX];
        let bytes = typed_slice_to_bytes(&original);
        assert_eq!(bytes.len(), 16);
        let back = safe_bytes_to_typed_slice::<u32>(&bytes).unwrap();
        assert_eq!(back, original.as_slice());
    }

    #[test]
    fn test_bad_length_is_rejected() {
        let bytes = [0u8; 7];
        assert!(safe_bytes_to_typed_slice::<u32>(&bytes).is_err());
    }
}
