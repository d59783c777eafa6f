//! Generalization and local analysis operations on rasters: aggregation,
//! band concatenation, morphology, band-wise statistics, region labeling,
//! range remapping and conditional selection.

use ndarray::ArrayView2;

use crate::compute::executor;
use crate::compute::plan::{Operand, PlanNode};
use crate::compute::tile::Tile;
use crate::error::{RasterError, Result};
use crate::grid::Window;
use crate::kernels::dispatch_dtype;
use crate::kernels::local::LocalReducer;
use crate::kernels::morphology::MorphOp;
use crate::kernels::regions::label_regions;
use crate::kernels::stats::StatKind;
use crate::raster::Raster;
use crate::types::RasterDataType;

/// Aggregates cell values into a coarser grid, reducing each
/// `expand_cells.0 x expand_cells.1` block to one cell. Ragged edges are
/// trimmed, as in a boundary-trimming coarsen.
///
/// Valid statistics are the shared set minus `count`. Output dtype follows
/// the statistic: `mode`/`min`/`max` keep the input dtype, `unique` takes
/// the smallest unsigned type that can hold the block size (widened to a
/// signed type when the raster is masked), `entropy`/`asm` are Float64,
/// and the rest are Float32 for Float32 input and Float64 otherwise.
pub fn aggregate(raster: &Raster, expand_cells: (usize, usize), stat: StatKind) -> Result<Raster> {
    let (fy, fx) = expand_cells;
    if fy < 1 || fx < 1 {
        return Err(RasterError::InvalidArgument(
            "all expand_cells values must be >= 1".to_string(),
        ));
    }
    if fy == 1 && fx == 1 {
        return Err(RasterError::InvalidArgument(
            "expand_cells values cannot both be one".to_string(),
        ));
    }
    if stat == StatKind::Count {
        return Err(RasterError::InvalidArgument(
            "count is not a valid aggregation statistic".to_string(),
        ));
    }

    let meta_in = raster.meta();
    let out_rows = meta_in.rows / fy;
    let out_cols = meta_in.cols / fx;
    if out_rows == 0 || out_cols == 0 {
        return Err(RasterError::InvalidDimensions(out_rows, out_cols));
    }

    let masked = raster.is_masked();
    let out_dtype = aggregate_dtype(stat, raster.dtype(), (fy * fx) as u64, masked);

    let mut meta = meta_in.clone();
    meta.rows = out_rows;
    meta.cols = out_cols;
    meta.dtype = out_dtype;
    meta.transform = meta_in.transform.scaled(fy, fx);
    meta.null_value = masked.then(|| out_dtype.default_null_value());

    Ok(Raster::from_plan(
        meta,
        PlanNode::Aggregate {
            input: raster.clone(),
            factors: (fy, fx),
            stat,
        },
    ))
}

fn aggregate_dtype(
    stat: StatKind,
    input: RasterDataType,
    block: u64,
    masked: bool,
) -> RasterDataType {
    match stat {
        StatKind::Mode | StatKind::Min | StatKind::Max => input,
        StatKind::Unique => {
            let dt = RasterDataType::min_scalar_uint(block);
            if masked {
                dt.widen_for_null()
            } else {
                dt
            }
        }
        StatKind::Entropy | StatKind::Asm => RasterDataType::Float64,
        _ => {
            if input == RasterDataType::Float32 {
                RasterDataType::Float32
            } else {
                RasterDataType::Float64
            }
        }
    }
}

/// Joins rasters along the band dimension. All inputs must share x/y
/// dimensions; the output dtype promotes across inputs. The result is
/// masked when any input is masked or an explicit `null_value` is given.
pub fn band_concat(rasters: &[Raster], null_value: Option<f64>) -> Result<Raster> {
    if rasters.is_empty() {
        return Err(RasterError::InvalidArgument(
            "no rasters provided".to_string(),
        ));
    }
    if rasters.len() == 1 && null_value.is_none() {
        return Ok(rasters[0].clone());
    }
    let first = rasters[0].meta();
    let mut out_dtype = rasters[0].dtype();
    let mut bands = 0;
    for r in rasters {
        let m = r.meta();
        if (m.rows, m.cols) != (first.rows, first.cols) {
            return Err(RasterError::ShapeMismatch {
                expected: first.shape(),
                got: m.shape(),
            });
        }
        out_dtype = RasterDataType::promote(out_dtype, r.dtype());
        bands += m.bands;
    }
    let masked = null_value.is_some() || rasters.iter().any(Raster::is_masked);

    let mut meta = first.clone();
    meta.bands = bands;
    meta.dtype = out_dtype;
    meta.null_value = match null_value {
        Some(nv) => Some(nv),
        None => masked.then(|| out_dtype.default_null_value()),
    };

    Ok(Raster::from_plan(
        meta,
        PlanNode::BandConcat {
            inputs: rasters.to_vec(),
        },
    ))
}

fn morphology(raster: &Raster, size: (usize, usize), op: MorphOp) -> Result<Raster> {
    let (fr, fc) = size;
    if fr == 0 || fc == 0 {
        return Err(RasterError::InvalidArgument(
            "size values must be greater than 0".to_string(),
        ));
    }
    if fr == 1 && fc == 1 {
        return Err(RasterError::InvalidArgument(
            "at least one size value must be greater than 1".to_string(),
        ));
    }
    Ok(Raster::from_plan(
        raster.meta().clone(),
        PlanNode::Morphology {
            input: raster.clone(),
            footprint: size,
            op,
        },
    ))
}

/// Grey dilation over a rectangular window: each cell takes the maximum
/// value in the window, expanding features into lower-valued and null
/// regions. The valid region dilates along with the data.
pub fn dilate(raster: &Raster, size: (usize, usize)) -> Result<Raster> {
    morphology(raster, size, MorphOp::Dilation)
}

/// Grey erosion over a rectangular window: each cell takes the minimum
/// value in the window, contracting features. The valid region erodes
/// along with the data.
pub fn erode(raster: &Raster, size: (usize, usize)) -> Result<Raster> {
    morphology(raster, size, MorphOp::Erosion)
}

/// Reduces across bands to a single-band raster of per-pixel statistics.
pub fn local_stats(raster: &Raster, reducer: LocalReducer) -> Result<Raster> {
    if reducer == LocalReducer::Stat(StatKind::Count) {
        return Err(RasterError::InvalidArgument(
            "count is not a valid local statistic".to_string(),
        ));
    }
    let meta_in = raster.meta();
    let masked = raster.is_masked();
    let bands = meta_in.bands as u64;
    let out_dtype = match reducer {
        LocalReducer::Stat(StatKind::Mode) => raster.dtype(),
        LocalReducer::Stat(StatKind::Unique) => {
            let dt = RasterDataType::min_scalar_uint(bands);
            if masked {
                dt.widen_for_null()
            } else {
                dt
            }
        }
        LocalReducer::MinBand | LocalReducer::MaxBand => {
            let dt = RasterDataType::min_scalar_uint(bands.saturating_sub(1));
            if masked {
                dt.widen_for_null()
            } else {
                dt
            }
        }
        LocalReducer::Stat(StatKind::Entropy) | LocalReducer::Stat(StatKind::Asm) => {
            RasterDataType::Float64
        }
        LocalReducer::Stat(_) => {
            if raster.dtype() == RasterDataType::Float32 {
                RasterDataType::Float32
            } else {
                RasterDataType::Float64
            }
        }
    };

    let mut meta = meta_in.clone();
    meta.bands = 1;
    meta.dtype = out_dtype;
    meta.null_value = masked.then(|| out_dtype.default_null_value());

    Ok(Raster::from_plan(
        meta,
        PlanNode::LocalStats {
            input: raster.clone(),
            reducer,
        },
    ))
}

/// Groups connected cells of equal, non-zero value into uniquely numbered
/// regions, per band. `neighbors` is 4 (rook) or 8 (queen).
/// `unique_values` restricts labeling to the listed values; other cells
/// become background.
///
/// Connectivity is global, so this operation evaluates eagerly and returns
/// a materialized raster.
pub fn regions(
    raster: &Raster,
    neighbors: u32,
    unique_values: Option<&[f64]>,
) -> Result<Raster> {
    let eight = match neighbors {
        4 => false,
        8 => true,
        other => {
            return Err(RasterError::InvalidArgument(format!(
                "invalid value for neighbors parameter: {}",
                other
            )))
        }
    };

    let meta_in = raster.meta();
    let full = Window::full(meta_in.rows, meta_in.cols);
    let tile = executor::eval_window(raster, full)?;

    let mut labels: Vec<u64> = Vec::with_capacity(tile.cells());
    for band in 0..tile.bands() {
        let band_labels = dispatch_dtype!(tile.dtype(), T => {
            label_regions(
                tile.typed_band::<T>(band)?,
                tile.mask_band(band),
                tile.rows(),
                tile.cols(),
                eight,
                unique_values,
            )
        });
        labels.extend_from_slice(&band_labels);
    }

    let masked = raster.is_masked();
    let out_dtype = RasterDataType::UInt64;
    let mut meta = meta_in.clone();
    meta.dtype = out_dtype;
    meta.null_value = masked.then(|| out_dtype.default_null_value());

    let mut out = Tile::from_typed(
        out_dtype,
        tile.bands(),
        tile.rows(),
        tile.cols(),
        labels,
        None,
    )?;
    if masked {
        out.set_mask(tile.mask().map(<[u8]>::to_vec));
        if let (Some(nv), Some(m)) = (meta.null_value, out.mask().map(<[u8]>::to_vec)) {
            crate::null_handling::mask::write_null_value(out.typed_mut::<u64>()?, &m, nv);
        }
    }
    Raster::from_tile(out, meta)
}

/// Remaps `[min, max)` ranges to new values; a re-export of the `Raster`
/// method for parity with the module-level API.
pub fn remap_range(raster: &Raster, mappings: &[(f64, f64, f64)]) -> Result<Raster> {
    raster.remap_range(mappings)
}

/// Chooses elementwise from `true_arm` where `condition` is truthy and
/// from `false_arm` elsewhere. The condition must be a boolean or integer
/// raster; integers are coerced with `> 0`.
pub fn select(
    condition: &Raster,
    true_arm: impl Into<Operand>,
    false_arm: impl Into<Operand>,
) -> Result<Raster> {
    if !condition.dtype().is_bool() && !condition.dtype().is_int() {
        return Err(RasterError::InvalidArgument(
            "condition argument must be a boolean or integer raster".to_string(),
        ));
    }
    let cond = if condition.dtype().is_bool() {
        condition.clone()
    } else {
        condition.gt(0i64)?
    };

    let true_arm = true_arm.into();
    let false_arm = false_arm.into();
    let mut masked = false;
    let mut arm_dtype = |arm: &Operand| -> Result<RasterDataType> {
        Ok(match arm {
            Operand::Raster(r) => {
                if r.shape() != condition.shape() {
                    return Err(RasterError::ShapeMismatch {
                        expected: condition.shape(),
                        got: r.shape(),
                    });
                }
                masked |= r.is_masked();
                r.dtype()
            }
            Operand::Scalar(s) => {
                masked |= s.is_nan();
                s.dtype()
            }
        })
    };
    let td = arm_dtype(&true_arm)?;
    let fd = arm_dtype(&false_arm)?;
    let out_dtype = match (&true_arm, &false_arm) {
        (Operand::Raster(_), Operand::Raster(_)) => RasterDataType::promote(td, fd),
        (Operand::Raster(r), Operand::Scalar(s)) | (Operand::Scalar(s), Operand::Raster(r)) => {
            s.promote_with(r.dtype())
        }
        (Operand::Scalar(_), Operand::Scalar(_)) => RasterDataType::promote(td, fd),
    };

    let mut meta = condition.meta().clone();
    meta.dtype = out_dtype;
    meta.null_value = masked.then(|| out_dtype.default_null_value());

    Ok(Raster::from_plan(
        meta,
        PlanNode::Select {
            cond,
            lhs: true_arm,
            rhs: false_arm,
        },
    ))
}

/// A per-pixel prediction model: bands are the predictor variables.
pub trait Model {
    /// `predictors` is `(samples, bands)`; returns one prediction per
    /// sample. Null cells arrive as NaN.
    fn predict(&self, predictors: ArrayView2<f64>) -> Vec<f64>;
}

/// Predicts a single-band Float64 surface from a raster of predictor
/// bands. Null cells are NaN on input, and NaN predictions are masked on
/// output when the input raster is masked.
pub fn predict_model(raster: &Raster, model: &dyn Model) -> Result<Raster> {
    let meta_in = raster.meta();
    let full = Window::full(meta_in.rows, meta_in.cols);
    let tile = executor::eval_window(raster, full)?.cast_to(RasterDataType::Float64)?;

    let bands = tile.bands();
    let cells = tile.cells_per_band();
    let mut predictors = Vec::with_capacity(cells * bands);
    let data = tile.typed::<f64>()?;
    for cell in 0..cells {
        for band in 0..bands {
            let idx = band * cells + cell;
            let v = if tile.mask().map(|m| m[idx] != 0).unwrap_or(false) {
                f64::NAN
            } else {
                data[idx]
            };
            predictors.push(v);
        }
    }
    let matrix = ArrayView2::from_shape((cells, bands), &predictors)?;
    let predictions = model.predict(matrix);
    if predictions.len() != cells {
        return Err(RasterError::InvalidArgument(format!(
            "model returned {} predictions for {} cells",
            predictions.len(),
            cells
        )));
    }

    let mut meta = meta_in.clone();
    meta.bands = 1;
    meta.dtype = RasterDataType::Float64;
    meta.null_value = raster.is_masked().then_some(f64::NAN);

    let out = Tile::from_typed(
        RasterDataType::Float64,
        1,
        meta_in.rows,
        meta_in.cols,
        predictions,
        None,
    )?;
    Raster::from_tile(out, meta)
}
