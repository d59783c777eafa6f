//! GeoTIFF read/write through GDAL.
//!
//! Opening a raster captures only its metadata; pixels are read
//! tile-by-tile on demand during evaluation. GDAL dataset handles are not
//! `Sync`, so every read opens its own handle; the open cost is amortized
//! by the tile size.

use std::path::{Path, PathBuf};

use gdal::cpl::CslStringList;
use gdal::raster::Buffer;
use gdal::{Dataset, DriverManager};
use log::{debug, info};

use crate::compute::tile::Tile;
use crate::config::RasterConfig;
use crate::error::{RasterError, Result};
use crate::geo::{GeoTransform, RasterMeta};
use crate::grid::Window;
use crate::null_handling::mask;
use crate::raster::Raster;
use crate::types::RasterDataType;

const TIFF_EXTS: [&str; 2] = ["tif", "tiff"];

fn validate_tiff_path(path: &Path) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| RasterError::UnknownFileType(path.display().to_string()))?;
    if !TIFF_EXTS.contains(&ext.as_str()) {
        return Err(RasterError::UnknownFileType(path.display().to_string()));
    }
    Ok(())
}

/// Dispatches over the dtypes GDAL can hold in a band.
macro_rules! dispatch_gdal_dtype {
    ($dtype:expr, $T:ident => $body:expr) => {{
        use $crate::types::RasterDataType as __Dt;
        match $dtype {
            __Dt::UInt8 | __Dt::Boolean => {
                type $T = u8;
                $body
            }
            __Dt::UInt16 => {
                type $T = u16;
                $body
            }
            __Dt::UInt32 => {
                type $T = u32;
                $body
            }
            __Dt::Int8 => {
                type $T = i8;
                $body
            }
            __Dt::Int16 => {
                type $T = i16;
                $body
            }
            __Dt::Int32 => {
                type $T = i32;
                $body
            }
            __Dt::Float32 => {
                type $T = f32;
                $body
            }
            __Dt::Float64 => {
                type $T = f64;
                $body
            }
            other => {
                return Err(RasterError::UnsupportedType(format!(
                    "GDAL cannot store {} bands",
                    other
                )))
            }
        }
    }};
}

/// A GeoTIFF source read lazily, window by window.
#[derive(Debug)]
pub struct GeoTiffSource {
    path: PathBuf,
    meta: RasterMeta,
}

impl GeoTiffSource {
    pub fn open(path: impl AsRef<Path>) -> Result<GeoTiffSource> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(RasterError::FileNotFound(path.display().to_string()));
        }
        validate_tiff_path(path)?;

        info!("opening raster: {}", path.display());
        let dataset = Dataset::open(path)?;
        let band = dataset.rasterband(1)?;
        let cols = band.x_size();
        let rows = band.y_size();
        if rows == 0 || cols == 0 {
            return Err(RasterError::InvalidDimensions(rows, cols));
        }
        let dtype = RasterDataType::from_gdal_type(band.band_type())?;
        let meta = RasterMeta {
            bands: dataset.raster_count(),
            rows,
            cols,
            dtype,
            transform: GeoTransform(dataset.geo_transform()?),
            projection: dataset.projection(),
            null_value: band.no_data_value(),
        };
        debug!(
            "raster {}: {}x{}x{} {}, nodata {:?}",
            path.display(),
            meta.bands,
            meta.rows,
            meta.cols,
            meta.dtype,
            meta.null_value
        );
        Ok(GeoTiffSource {
            path: path.to_path_buf(),
            meta,
        })
    }

    pub fn meta(&self) -> &RasterMeta {
        &self.meta
    }

    /// Reads one window (all bands), deriving the mask from the nodata
    /// sentinel.
    pub fn read_window(&self, w: Window) -> Result<Tile> {
        let dataset = Dataset::open(&self.path)?;
        let (rows, cols) = (w.rows(), w.cols());
        let mut data: Vec<u8> = Vec::with_capacity(self.meta.bands * rows * cols * self.meta.dtype.size_of());
        let mut tile_mask: Option<Vec<u8>> = self.meta.null_value.map(|_| Vec::new());

        for band_idx in 1..=self.meta.bands {
            let band = dataset.rasterband(band_idx)?;
            dispatch_gdal_dtype!(self.meta.dtype, T => {
                let buffer = band.read_as::<T>(
                    (w.col0 as isize, w.row0 as isize),
                    (cols, rows),
                    (cols, rows),
                    None,
                )?;
                let band_data: Vec<T> = buffer.into_iter().collect();
                if let (Some(acc), Some(nv)) = (tile_mask.as_mut(), self.meta.null_value) {
                    acc.extend_from_slice(&mask::mask_from_null_value(&band_data, nv));
                }
                data.extend_from_slice(crate::utils::typed_slice_to_bytes(&band_data).as_slice());
            });
        }

        let mut tile = Tile::from_bytes(self.meta.dtype, self.meta.bands, rows, cols, data, None)?;
        tile.set_mask(tile_mask);
        Ok(tile)
    }
}

impl Raster {
    /// Opens a GeoTIFF as a lazy raster; pixels are read during
    /// evaluation.
    pub fn open(path: impl AsRef<Path>) -> Result<Raster> {
        let source = GeoTiffSource::open(path)?;
        let meta = source.meta().clone();
        Ok(Raster::from_plan(
            meta,
            crate::compute::plan::PlanNode::Source(crate::compute::plan::SourceKind::Dataset(
                std::sync::Arc::new(source),
            )),
        ))
    }

    /// Evaluates this raster and writes it as a GeoTIFF with the default
    /// configuration.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.save_with(path, &RasterConfig::default())
    }

    pub fn save_with(&self, path: impl AsRef<Path>, config: &RasterConfig) -> Result<()> {
        let path = path.as_ref();
        validate_tiff_path(path)?;
        config.validate()?;

        let evaluated = self.eval_with(config)?;
        let meta = evaluated.meta().clone();
        let tile = match evaluated.plan() {
            crate::compute::plan::PlanNode::Source(
                crate::compute::plan::SourceKind::Materialized(tile),
            ) => tile.clone(),
            _ => {
                return Err(RasterError::InternalError(
                    "eval did not produce a materialized raster".to_string(),
                ))
            }
        };

        info!("creating output raster: {}", path.display());
        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut options = CslStringList::new();
        options.add_string(&format!(
            "COMPRESS={}",
            config.tiff.compression.as_creation_option()
        ))?;
        if config.tiff.tiled {
            options.add_string("TILED=YES")?;
            options.add_string(&format!("BLOCKXSIZE={}", config.tiff.block_size))?;
            options.add_string(&format!("BLOCKYSIZE={}", config.tiff.block_size))?;
        }

        let path_str = path.display().to_string();
        dispatch_gdal_dtype!(meta.dtype, T => {
            let mut dataset = driver.create_with_band_type_with_options::<T, _>(
                &path_str,
                meta.cols,
                meta.rows,
                meta.bands,
                &options,
            )?;
            dataset.set_geo_transform(&meta.transform.0)?;
            if !meta.projection.is_empty() {
                dataset.set_projection(&meta.projection)?;
            }
            for band_idx in 1..=meta.bands {
                let mut band = dataset.rasterband(band_idx)?;
                let band_data = tile.typed_band::<T>(band_idx - 1)?;
                let mut buffer = Buffer::new((meta.cols, meta.rows), band_data.to_vec());
                band.write((0, 0), (meta.cols, meta.rows), &mut buffer)?;
                if let Some(nv) = meta.null_value {
                    band.set_no_data_value(Some(nv))?;
                }
            }
        });
        info!("wrote {} band(s) to {}", meta.bands, path.display());
        Ok(())
    }
}
