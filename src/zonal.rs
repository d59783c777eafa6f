//! Zonal statistics: reduce the cells of a data raster under each zone of
//! a categorical zone raster (or rasterized vector features) and return
//! the results as a columnar Arrow table.
//!
//! The computation is tile-parallel: each tile folds into per-zone
//! accumulators that merge associatively, so tiles can be processed in
//! any order.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array};
use arrow::record_batch::RecordBatch;
use arrow_schema::{DataType, Field, Schema};
use log::debug;
use rayon::prelude::*;

use crate::compute::executor;
use crate::config::RasterConfig;
use crate::error::{RasterError, Result};
use crate::grid::TileGrid;
use crate::kernels::dispatch_dtype;
use crate::kernels::stats::{median_in_place, StatKind, ValueCounts};
use crate::raster::Raster;

/// The set of statistic names `zonal_stats` accepts.
pub const ZONAL_STAT_FUNCS: [StatKind; 12] = [
    StatKind::Asm,
    StatKind::Count,
    StatKind::Entropy,
    StatKind::Max,
    StatKind::Mean,
    StatKind::Median,
    StatKind::Min,
    StatKind::Mode,
    StatKind::Std,
    StatKind::Sum,
    StatKind::Unique,
    StatKind::Var,
];

/// Running per-zone reduction state. Everything merges associatively.
#[derive(Debug, Clone)]
struct ZoneAccum {
    count: u64,
    sum: f64,
    sumsq: f64,
    min: f64,
    max: f64,
    counts: Option<ValueCounts>,
    values: Option<Vec<f64>>,
}

impl ZoneAccum {
    fn new(track_counts: bool, track_values: bool) -> Self {
        ZoneAccum {
            count: 0,
            sum: 0.0,
            sumsq: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            counts: track_counts.then(ValueCounts::new),
            values: track_values.then(Vec::new),
        }
    }

    fn add(&mut self, v: f64) {
        self.count += 1;
        self.sum += v;
        self.sumsq += v * v;
        self.min = self.min.min(v);
        self.max = self.max.max(v);
        if let Some(c) = self.counts.as_mut() {
            c.add(v);
        }
        if let Some(vals) = self.values.as_mut() {
            vals.push(v);
        }
    }

    fn merge(&mut self, other: &ZoneAccum) {
        self.count += other.count;
        self.sum += other.sum;
        self.sumsq += other.sumsq;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        if let (Some(a), Some(b)) = (self.counts.as_mut(), other.counts.as_ref()) {
            a.merge(b);
        }
        if let (Some(a), Some(b)) = (self.values.as_mut(), other.values.as_ref()) {
            a.extend_from_slice(b);
        }
    }

    fn finish(&mut self, stat: StatKind) -> f64 {
        use StatKind::*;
        if self.count == 0 {
            // A zone entirely outside the raster or fully null: count is a
            // plain zero, everything else is undefined.
            return if stat == Count { 0.0 } else { f64::NAN };
        }
        let n = self.count as f64;
        match stat {
            Count => n,
            Sum => self.sum,
            Mean => self.sum / n,
            Min => self.min,
            Max => self.max,
            Var => self.sumsq / n - (self.sum / n) * (self.sum / n),
            Std => (self.sumsq / n - (self.sum / n) * (self.sum / n)).max(0.0).sqrt(),
            Median => self
                .values
                .as_mut()
                .map(|v| median_in_place(v))
                .unwrap_or(f64::NAN),
            Mode => self
                .counts
                .as_ref()
                .and_then(ValueCounts::mode)
                .unwrap_or(f64::NAN),
            Unique => self
                .counts
                .as_ref()
                .map(|c| c.unique_count() as f64)
                .unwrap_or(f64::NAN),
            Entropy => self.counts.as_ref().map(ValueCounts::entropy).unwrap_or(f64::NAN),
            Asm => self.counts.as_ref().map(ValueCounts::asm).unwrap_or(f64::NAN),
            Prod => f64::NAN,
        }
    }
}

type BandAccums = Vec<HashMap<i64, ZoneAccum>>;

/// Computes statistics of `data` cells under each zone of `features`.
///
/// `features` must be a single-band integer raster on the same grid and
/// CRS as `data`; its positive values are zone labels. `zone_values`
/// fixes the zones (and row order) up front; when omitted, the distinct
/// positive labels found in the raster are used in ascending order.
///
/// Returns a `RecordBatch` with `zone` and `band` (1-based) columns plus
/// one Float64 column per requested statistic, ordered band-major.
pub fn zonal_stats(
    features: &Raster,
    data: &Raster,
    stats: &[StatKind],
    zone_values: Option<&[i64]>,
) -> Result<RecordBatch> {
    zonal_stats_with(features, data, stats, zone_values, &RasterConfig::default())
}

pub fn zonal_stats_with(
    features: &Raster,
    data: &Raster,
    stats: &[StatKind],
    zone_values: Option<&[i64]>,
    config: &RasterConfig,
) -> Result<RecordBatch> {
    if stats.is_empty() {
        return Err(RasterError::InvalidArgument(
            "no stat functions provided".to_string(),
        ));
    }
    if stats.contains(&StatKind::Prod) {
        return Err(RasterError::InvalidArgument(
            "prod is not a valid zonal statistic".to_string(),
        ));
    }
    if !features.dtype().is_int() {
        return Err(RasterError::InvalidArgument(
            "feature raster must be an integer type".to_string(),
        ));
    }
    if features.shape().0 != 1 {
        return Err(RasterError::InvalidArgument(
            "feature raster must have only 1 band".to_string(),
        ));
    }
    let (fm, dm) = (features.meta(), data.meta());
    if (fm.rows, fm.cols) != (dm.rows, dm.cols) {
        return Err(RasterError::ShapeMismatch {
            expected: dm.shape(),
            got: fm.shape(),
        });
    }
    if fm.projection != dm.projection {
        return Err(RasterError::CrsMismatch(
            fm.projection.clone(),
            dm.projection.clone(),
        ));
    }
    config.validate()?;

    let track_counts = stats.iter().any(StatKind::needs_counts);
    let track_values = stats.iter().any(StatKind::needs_values);
    let bands = dm.bands;
    let grid = TileGrid::new(dm.rows, dm.cols, config.tile_rows, config.tile_cols);
    debug!(
        "zonal_stats: {} band(s), {} tile(s), {} stat(s)",
        bands,
        grid.len(),
        stats.len()
    );

    // Fold each tile into per-band, per-zone accumulators, then merge.
    let partials: Vec<BandAccums> = (0..grid.len())
        .into_par_iter()
        .map(|i| -> Result<BandAccums> {
            let w = grid.window(i);
            let ftile = executor::eval_window(features, w)?;
            let dtile = executor::eval_window(data, w)?;
            let cells = w.cells();

            let labels: Vec<i64> = dispatch_dtype!(ftile.dtype(), T => {
                ftile
                    .typed::<T>()?
                    .iter()
                    .map(|&v| num_traits::ToPrimitive::to_i64(&v).unwrap_or(0))
                    .collect()
            });
            let flabel_mask = ftile.mask();

            let mut accums: BandAccums = Vec::with_capacity(bands);
            for band in 0..bands {
                let mut zone_map: HashMap<i64, ZoneAccum> = HashMap::new();
                let band_mask = dtile.mask_band(band);
                dispatch_dtype!(dtile.dtype(), T => {
                    let values = dtile.typed_band::<T>(band)?;
                    for cell in 0..cells {
                        let zone = labels[cell];
                        if zone <= 0 {
                            continue;
                        }
                        if flabel_mask.map(|m| m[cell] != 0).unwrap_or(false) {
                            continue;
                        }
                        if band_mask.map(|m| m[cell] != 0).unwrap_or(false) {
                            continue;
                        }
                        let v: f64 = num_traits::AsPrimitive::<f64>::as_(values[cell]);
                        if v.is_nan() {
                            continue;
                        }
                        zone_map
                            .entry(zone)
                            .or_insert_with(|| ZoneAccum::new(track_counts, track_values))
                            .add(v);
                    }
                });
                accums.push(zone_map);
            }
            Ok(accums)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut merged: BandAccums = vec![HashMap::new(); bands];
    for partial in &partials {
        for (band, zone_map) in partial.iter().enumerate() {
            for (zone, accum) in zone_map {
                merged[band]
                    .entry(*zone)
                    .and_modify(|a| a.merge(accum))
                    .or_insert_with(|| accum.clone());
            }
        }
    }

    // Fix the zone row order.
    let zones: Vec<i64> = match zone_values {
        Some(values) => values.iter().copied().filter(|&z| z > 0).collect(),
        None => {
            let mut set = BTreeSet::new();
            for zone_map in &merged {
                set.extend(zone_map.keys().copied());
            }
            set.into_iter().collect()
        }
    };

    build_batch(&zones, bands, stats, &mut merged, track_counts, track_values)
}

/// Zonal statistics under vector features: feature `i` is zone `i + 1`.
/// The features are burned onto the data raster's grid first; zones for
/// features that miss the raster entirely come back as NaN rows.
#[cfg(feature = "gdal")]
pub fn zonal_stats_vector(
    features: &crate::vector::Vector,
    data: &Raster,
    stats: &[StatKind],
    all_touched: bool,
) -> Result<RecordBatch> {
    let zones: Vec<i64> = (1..=features.len() as i64).collect();
    let zone_raster = features.rasterize(data, all_touched)?;
    zonal_stats(&zone_raster, data, stats, Some(zones.as_slice()))
}

fn build_batch(
    zones: &[i64],
    bands: usize,
    stats: &[StatKind],
    merged: &mut BandAccums,
    track_counts: bool,
    track_values: bool,
) -> Result<RecordBatch> {
    let rows = zones.len() * bands;
    let mut zone_col = Vec::with_capacity(rows);
    let mut band_col = Vec::with_capacity(rows);
    let mut stat_cols: Vec<Vec<f64>> = vec![Vec::with_capacity(rows); stats.len()];

    for band in 0..bands {
        for &zone in zones {
            zone_col.push(zone);
            band_col.push((band + 1) as i64);
            let mut accum = merged[band]
                .get(&zone)
                .cloned()
                .unwrap_or_else(|| ZoneAccum::new(track_counts, track_values));
            for (col, &stat) in stat_cols.iter_mut().zip(stats.iter()) {
                col.push(accum.finish(stat));
            }
        }
    }

    let mut fields = vec![
        Field::new("zone", DataType::Int64, false),
        Field::new("band", DataType::Int64, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(zone_col)),
        Arc::new(Int64Array::from(band_col)),
    ];
    for (col, stat) in stat_cols.into_iter().zip(stats.iter()) {
        fields.push(Field::new(stat.as_str(), DataType::Float64, true));
        columns.push(Arc::new(Float64Array::from(col)));
    }

    let schema = Arc::new(Schema::new(fields));
    Ok(RecordBatch::try_new(schema, columns)?)
}
