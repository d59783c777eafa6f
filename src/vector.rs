//! The vector/geometry bridge: open OGR-readable feature data and burn it
//! onto a raster grid. Gated behind the `gdal` cargo feature.

use std::path::{Path, PathBuf};

use gdal::raster::{rasterize, RasterizeOptions};
use gdal::vector::LayerAccess;
use gdal::{Dataset, DriverManager};
use log::{debug, info};

use crate::error::{RasterError, Result};
use crate::geo::RasterMeta;
use crate::raster::Raster;
use crate::types::RasterDataType;

/// A lazily opened vector dataset. Each operation opens its own GDAL
/// handle, mirroring the raster source discipline.
#[derive(Debug)]
pub struct Vector {
    path: PathBuf,
    feature_count: usize,
}

impl Vector {
    pub fn open(path: impl AsRef<Path>) -> Result<Vector> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(RasterError::FileNotFound(path.display().to_string()));
        }
        info!("opening vector: {}", path.display());
        let dataset = Dataset::open(path)?;
        let mut layer = dataset.layer(0)?;
        let feature_count = layer.features().count();
        debug!(
            "vector {}: {} feature(s) in layer 0",
            path.display(),
            feature_count
        );
        Ok(Vector {
            path: path.to_path_buf(),
            feature_count,
        })
    }

    pub fn len(&self) -> usize {
        self.feature_count
    }

    pub fn is_empty(&self) -> bool {
        self.feature_count == 0
    }

    /// Burns the features onto `template`'s grid: feature `i` becomes zone
    /// label `i + 1`, background stays 0. The result is a single-band
    /// Int32 raster sharing the template's georeferencing.
    pub fn rasterize(&self, template: &Raster, all_touched: bool) -> Result<Raster> {
        let meta = template.meta();
        let dataset = Dataset::open(&self.path)?;
        let mut layer = dataset.layer(0)?;

        // Burn into an in-memory dataset, then pull the labels back out.
        let driver = DriverManager::get_driver_by_name("MEM")?;
        let mut mem = driver.create_with_band_type::<i32, _>("", meta.cols, meta.rows, 1)?;
        mem.set_geo_transform(&meta.transform.0)?;
        if !meta.projection.is_empty() {
            mem.set_projection(&meta.projection)?;
        }

        for (i, feature) in layer.features().enumerate() {
            let geometry = feature.geometry().ok_or_else(|| {
                RasterError::InvalidArgument(format!("feature {} has no geometry", i))
            })?;
            let options = RasterizeOptions {
                all_touched,
                ..Default::default()
            };
            rasterize(
                &mut mem,
                &[1],
                std::slice::from_ref(geometry),
                &[(i + 1) as f64],
                Some(options),
            )?;
        }

        let band = mem.rasterband(1)?;
        let buffer = band.read_as::<i32>((0, 0), (meta.cols, meta.rows), (meta.cols, meta.rows), None)?;
        let labels: Vec<i32> = buffer.into_iter().collect();

        let out_meta = RasterMeta {
            bands: 1,
            rows: meta.rows,
            cols: meta.cols,
            dtype: RasterDataType::Int32,
            transform: meta.transform,
            projection: meta.projection.clone(),
            null_value: None,
        };
        let tile = crate::compute::tile::Tile::from_typed(
            RasterDataType::Int32,
            1,
            meta.rows,
            meta.cols,
            labels,
            None,
        )?;
        Raster::from_tile(tile, out_meta)
    }
}
