//! This file is the root of the `raster_tools` crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of the library (`raster`,
//!     `kernels`, `compute`, etc.) so the Rust compiler knows they exist.
//! 2.  Re-exporting the small public surface most callers need: the
//!     `Raster` type, the operation modules, and the shared vocabulary
//!     types.
//!
//! The crate provides lazy, tiled raster analysis: a `Raster` is a handle
//! onto a plan of operations that only computes when evaluated, tile by
//! tile and in parallel. GeoTIFF and vector I/O bind the native GDAL
//! library and live behind the `gdal` cargo feature.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
mod observability; // Make macros available throughout the crate

pub mod config;
pub mod general;
pub mod geo;
pub mod grid;
pub mod kernels;
pub mod raster;
pub mod types;
pub mod zonal;

mod compute;
mod error;
mod io;
mod null_handling;
mod traits;
mod utils;

#[cfg(feature = "gdal")]
pub mod vector;

#[cfg(test)]
mod general_tests;
#[cfg(test)]
mod raster_tests;

//==================================================================================
// 2. Public Surface
//==================================================================================
pub use compute::plan::Operand;
pub use config::{RasterConfig, TiffCompression, TiffWriteOptions};
pub use error::{RasterError, Result};
pub use general::{
    aggregate, band_concat, dilate, erode, local_stats, predict_model, regions, remap_range,
    select, Model,
};
pub use geo::{GeoTransform, RasterMeta};
pub use kernels::local::LocalReducer;
pub use kernels::stats::StatKind;
pub use observability::init_logging;
pub use raster::Raster;
pub use traits::RasterElement;
pub use types::{RasterDataType, Scalar};
pub use zonal::{zonal_stats, zonal_stats_with, ZONAL_STAT_FUNCS};

#[cfg(feature = "gdal")]
pub use vector::Vector;
#[cfg(feature = "gdal")]
pub use zonal::zonal_stats_vector;
