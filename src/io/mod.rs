//! Geospatial raster I/O. Everything here binds the native GDAL library
//! and is gated behind the `gdal` cargo feature.

#[cfg(feature = "gdal")]
pub mod geotiff;
