// In: src/config.rs

//! The single source of truth for raster-tools configuration.
//!
//! This module defines the unified `RasterConfig` struct, which is designed
//! to be created once at the application boundary (e.g., from a user's JSON
//! file) and then passed down through the system by reference. This
//! centralizes all settings and keeps the `Raster` type itself free of
//! evaluation policy.

use serde::{Deserialize, Serialize};

use crate::error::{RasterError, Result};

//==================================================================================
// I. Core Configuration Enums & Structs
//==================================================================================

/// GeoTIFF creation compression. Maps onto the GTiff driver's `COMPRESS`
/// creation option when saving.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TiffCompression {
    /// No compression. Fastest writes, largest files.
    None,

    /// **Default:** DEFLATE. A balance of speed and size that every reader
    /// understands.
    #[default]
    Deflate,

    /// LZW, for compatibility with older GIS tooling.
    Lzw,
}

impl TiffCompression {
    /// The value the GTiff driver expects for its `COMPRESS` option.
    pub fn as_creation_option(&self) -> &'static str {
        match self {
            TiffCompression::None => "NONE",
            TiffCompression::Deflate => "DEFLATE",
            TiffCompression::Lzw => "LZW",
        }
    }
}

/// Options applied when writing GeoTIFF output.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TiffWriteOptions {
    #[serde(default)]
    pub compression: TiffCompression,

    /// Write a tiled (rather than stripped) TIFF.
    #[serde(default = "default_true")]
    pub tiled: bool,

    /// Tile/block size for tiled output. Must be a multiple of 16 per the
    /// TIFF specification.
    #[serde(default = "default_block_size")]
    pub block_size: usize,
}

impl Default for TiffWriteOptions {
    fn default() -> Self {
        Self {
            compression: TiffCompression::default(),
            tiled: true,
            block_size: default_block_size(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_block_size() -> usize {
    256
}

/// The unified configuration for tile evaluation and I/O.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RasterConfig {
    /// Tile height used by the lazy evaluator.
    #[serde(default = "default_tile_side")]
    pub tile_rows: usize,

    /// Tile width used by the lazy evaluator.
    #[serde(default = "default_tile_side")]
    pub tile_cols: usize,

    /// Number of worker threads for tile evaluation. `None` uses the
    /// default Rayon pool (all available cores).
    #[serde(default)]
    pub threads: Option<usize>,

    #[serde(default)]
    pub tiff: TiffWriteOptions,
}

fn default_tile_side() -> usize {
    512
}

impl Default for RasterConfig {
    fn default() -> Self {
        Self {
            tile_rows: default_tile_side(),
            tile_cols: default_tile_side(),
            threads: None,
            tiff: TiffWriteOptions::default(),
        }
    }
}

impl RasterConfig {
    /// Parses a config from a JSON document. Missing fields fall back to
    /// their defaults, so `{}` is a valid input.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RasterConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tile_rows == 0 || self.tile_cols == 0 {
            return Err(RasterError::InvalidTileShape(self.tile_rows, self.tile_cols));
        }
        if self.tiff.tiled && self.tiff.block_size % 16 != 0 {
            return Err(RasterError::InvalidArgument(format!(
                "TIFF block size must be a multiple of 16, got {}",
                self.tiff.block_size
            )));
        }
        Ok(())
    }

    /// A config with a specific tile shape, mostly useful in tests to force
    /// multi-tile evaluation on small rasters.
    pub fn with_tile_shape(tile_rows: usize, tile_cols: usize) -> Self {
        Self {
            tile_rows,
            tile_cols,
            ..Self::default()
        }
    }
}
