// In: src/error.rs

//! This module defines the single, unified error type for the entire
//! raster-tools library. It uses the `thiserror` crate to provide
//! ergonomic, context-aware error handling.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterError {
    // =========================================================================
    // === High-Level, Semantic Errors (Specific to our library's logic)
    // =========================================================================
    #[error("Unsupported data type for this operation: {0}")]
    UnsupportedType(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: (usize, usize, usize),
        got: (usize, usize, usize),
    },

    #[error("Coordinate reference systems do not match: '{0}' vs '{1}'")]
    CrsMismatch(String, String),

    #[error("No raster cells intersect the requested bounds")]
    NoDataInBounds,

    #[error("Internal logic error (this is a bug): {0}")]
    InternalError(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the Arrow library while assembling
    /// zonal-statistics tables.
    #[error("Arrow operation failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// An error originating from the underlying I/O subsystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically during config parsing
    /// or plan debug dumps.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// An error from an ndarray shape conversion.
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// An error from a safe byte-casting operation failing.
    #[error("Byte slice casting error: {0}")]
    PodCast(String), // Manual `From` impl is needed as bytemuck::PodCastError doesn't impl Error

    /// An error originating from the GDAL library.
    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    // =========================================================================
    // === Low-Level Raster/Kernel Errors
    // =========================================================================
    #[error("Buffer length mismatch: expected a multiple of {0}, got {1}")]
    BufferMismatch(usize, usize),

    #[error("Could not find file: '{0}'")]
    FileNotFound(String),

    #[error("Could not determine file type for: '{0}'")]
    UnknownFileType(String),

    #[error("Input raster has invalid dimensions: {0}x{1}")]
    InvalidDimensions(usize, usize),

    #[error("Invalid tile shape: {0}x{1} (both sides must be positive)")]
    InvalidTileShape(usize, usize),

    #[error("Band index {0} is out of range for a raster with {1} band(s)")]
    BandOutOfRange(usize, usize),

    #[error("Plan evaluation failed at node '{node}': {source}")]
    EvalError {
        node: String,
        #[source]
        source: Box<RasterError>,
    },
}

// =============================================================================
// === Manual `From` Implementations ===
// =============================================================================

impl From<bytemuck::PodCastError> for RasterError {
    fn from(err: bytemuck::PodCastError) -> Self {
        RasterError::PodCast(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RasterError>;
