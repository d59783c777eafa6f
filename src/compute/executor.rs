//! The pull-based tile executor.
//!
//! `eval_window` computes one output window of a plan by recursively
//! pulling the input windows it needs: the same window for element-wise
//! nodes, a halo-expanded window for focal nodes, an upscaled window for
//! aggregation. `materialize` walks the configured tile grid in parallel
//! and assembles the full raster.

use std::time::Instant;

use log::debug;
use ndarray::ArrayView2;
use rayon::prelude::*;

use crate::compute::plan::{Operand, PlanNode, SourceKind};
use crate::compute::tile::Tile;
use crate::config::RasterConfig;
use crate::error::{RasterError, Result};
use crate::grid::{TileGrid, Window};
use crate::kernels::arithmetic::{self, BinaryOp};
use crate::kernels::compare::{self, CmpOp};
use crate::kernels::focal::{convolve2d, halo_for};
use crate::kernels::local::local_reduce;
use crate::kernels::morphology::{binary_morph, grey_morph, MorphOp};
use crate::kernels::remap::remap_slice;
use crate::kernels::stats::StatKind;
use crate::kernels::{aggregate, dispatch_dtype};
use crate::log_metric;
use crate::null_handling::mask;
use crate::raster::Raster;
use crate::traits::RasterElement;
use crate::types::{RasterDataType, Scalar};
use crate::utils::typed_slice_to_bytes;

/// Evaluates one output window (all bands) of a lazy raster.
pub fn eval_window(raster: &Raster, window: Window) -> Result<Tile> {
    match eval_node(raster, window) {
        Err(e @ RasterError::EvalError { .. }) => Err(e),
        Err(other) => Err(RasterError::EvalError {
            node: raster.plan().name().to_string(),
            source: Box::new(other),
        }),
        ok => ok,
    }
}

/// Evaluates the full extent, tile-parallel, and burns the null sentinel
/// into masked cells.
pub fn materialize(raster: &Raster, config: &RasterConfig) -> Result<Tile> {
    config.validate()?;
    let meta = raster.meta();
    let grid = TileGrid::new(meta.rows, meta.cols, config.tile_rows, config.tile_cols);
    let started = Instant::now();

    let run = || -> Result<Vec<(Window, Tile)>> {
        (0..grid.len())
            .into_par_iter()
            .map(|i| {
                let w = grid.window(i);
                Ok((w, eval_window(raster, w)?))
            })
            .collect()
    };
    let tiles = match config.threads {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| RasterError::InternalError(format!("thread pool: {}", e)))?
            .install(run),
        None => run(),
    }?;

    let mut full = Tile::zeroed(meta.dtype, meta.bands, meta.rows, meta.cols);
    for (w, tile) in tiles {
        full.paste(&tile, w)?;
    }

    // Burn the sentinel so materialized buffers are self-describing even
    // without their mask.
    if let (Some(nv), Some(m)) = (meta.null_value, full.mask().map(<[u8]>::to_vec)) {
        dispatch_dtype!(meta.dtype, T => {
            mask::write_null_value(full.typed_mut::<T>()?, &m, nv);
        });
    }

    let elapsed_ms = started.elapsed().as_millis();
    debug!(
        "materialized {}x{}x{} {} raster from {} tile(s) in {} ms",
        meta.bands, meta.rows, meta.cols, meta.dtype, grid.len(), elapsed_ms
    );
    log_metric!("event" = "materialize", "tiles" = &grid.len(), "ms" = &elapsed_ms);
    Ok(full)
}

fn eval_node(raster: &Raster, window: Window) -> Result<Tile> {
    let out_dtype = raster.dtype();
    match raster.plan() {
        PlanNode::Source(SourceKind::Materialized(tile)) => tile.window_copy(window),
        #[cfg(feature = "gdal")]
        PlanNode::Source(SourceKind::Dataset(src)) => src.read_window(window),

        PlanNode::Binary { lhs, rhs, op } => eval_binary(lhs, rhs, *op, window, out_dtype),
        PlanNode::Compare { lhs, rhs, op } => eval_compare(lhs, rhs, *op, window),

        PlanNode::Negate { input } => {
            let tile = eval_window(input, window)?;
            let data = dispatch_dtype!(out_dtype, T => {
                typed_slice_to_bytes(&arithmetic::negate(tile.typed::<T>()?))
            });
            rebuild(tile.bands(), window, out_dtype, data, tile.mask().map(<[u8]>::to_vec))
        }

        PlanNode::Cast { input, to } => eval_window(input, window)?.cast_to(*to),

        PlanNode::ReplaceNull { input, value } => {
            let mut tile = eval_window(input, window)?;
            if let Some(m) = tile.take_mask() {
                dispatch_dtype!(out_dtype, T => {
                    mask::write_null_value(tile.typed_mut::<T>()?, &m, *value);
                });
            }
            Ok(tile)
        }

        PlanNode::MaskSentinel { input, value } => {
            let mut tile = eval_window(input, window)?;
            let sentinel_mask = dispatch_dtype!(out_dtype, T => {
                mask::mask_from_null_value(tile.typed::<T>()?, *value)
            });
            let combined = mask::union(tile.mask(), Some(sentinel_mask.as_slice()));
            tile.set_mask(combined);
            Ok(tile)
        }

        PlanNode::RemapRange { input, mappings } => {
            let tile = eval_window(input, window)?.cast_to(out_dtype)?;
            let data = dispatch_dtype!(out_dtype, T => {
                typed_slice_to_bytes(&remap_slice(tile.typed::<T>()?, tile.mask(), mappings))
            });
            rebuild(tile.bands(), window, out_dtype, data, tile.mask().map(<[u8]>::to_vec))
        }

        PlanNode::Select { cond, lhs, rhs } => eval_select(cond, lhs, rhs, window, out_dtype),

        PlanNode::Convolve {
            input,
            kernel,
            fill,
        } => eval_convolve(input, kernel.view(), *fill, window, out_dtype),

        PlanNode::Morphology {
            input,
            footprint,
            op,
        } => eval_morphology(input, *footprint, *op, window, out_dtype),

        PlanNode::Aggregate {
            input,
            factors,
            stat,
        } => eval_aggregate(input, *factors, *stat, window, out_dtype),

        PlanNode::LocalStats { input, reducer } => {
            let tile = eval_window(input, window)?;
            let cells = window.cells();
            let (values, null_flags) = dispatch_dtype!(tile.dtype(), T => {
                local_reduce(tile.typed::<T>()?, tile.mask(), tile.bands(), cells, *reducer)
            });
            from_f64_values(1, window, out_dtype, &values, raster.is_masked().then_some(null_flags))
        }

        PlanNode::BandConcat { inputs } => {
            let masked = raster.is_masked();
            let mut data = Vec::new();
            let mut out_mask = masked.then(Vec::new);
            let mut bands = 0;
            for input in inputs {
                let tile = eval_window(input, window)?.cast_to(out_dtype)?;
                bands += tile.bands();
                data.extend_from_slice(tile.bytes());
                if let Some(acc) = out_mask.as_mut() {
                    match tile.mask() {
                        Some(m) => acc.extend_from_slice(m),
                        None => acc.extend(std::iter::repeat(0u8).take(tile.cells())),
                    }
                }
            }
            rebuild(bands, window, out_dtype, data, out_mask)
        }

        PlanNode::SelectBands { input, bands } => {
            let tile = eval_window(input, window)?;
            let esize = out_dtype.size_of();
            let n = tile.cells_per_band();
            let mut data = Vec::with_capacity(bands.len() * n * esize);
            let mut out_mask = tile.mask().map(|_| Vec::with_capacity(bands.len() * n));
            for &b in bands {
                data.extend_from_slice(&tile.bytes()[b * n * esize..(b + 1) * n * esize]);
                if let (Some(acc), Some(m)) = (out_mask.as_mut(), tile.mask()) {
                    acc.extend_from_slice(&m[b * n..(b + 1) * n]);
                }
            }
            rebuild(bands.len(), window, out_dtype, data, out_mask)
        }
    }
}

fn rebuild(
    bands: usize,
    window: Window,
    dtype: RasterDataType,
    data: Vec<u8>,
    mask_bytes: Option<Vec<u8>>,
) -> Result<Tile> {
    let mut tile = Tile::from_bytes(dtype, bands, window.rows(), window.cols(), data, None)?;
    tile.set_mask(mask_bytes);
    Ok(tile)
}

/// Casts reduced f64 values into the output dtype and attaches the null
/// flags produced by the reducer.
fn from_f64_values(
    bands: usize,
    window: Window,
    dtype: RasterDataType,
    values: &[f64],
    null_flags: Option<Vec<u8>>,
) -> Result<Tile> {
    let data = dispatch_dtype!(dtype, T => {
        let out: Vec<T> = values.iter().map(|&v| T::from_f64_lossy(v)).collect();
        typed_slice_to_bytes(&out)
    });
    rebuild(bands, window, dtype, data, null_flags)
}

fn eval_binary(
    lhs: &Operand,
    rhs: &Operand,
    op: BinaryOp,
    window: Window,
    out_dtype: RasterDataType,
) -> Result<Tile> {
    match (lhs, rhs) {
        (Operand::Raster(a), Operand::Raster(b)) => {
            let ta = eval_window(a, window)?.cast_to(out_dtype)?;
            let tb = eval_window(b, window)?.cast_to(out_dtype)?;
            let out_mask = mask::union(ta.mask(), tb.mask());
            let data = dispatch_dtype!(out_dtype, T => {
                typed_slice_to_bytes(&arithmetic::binary_slices(
                    ta.typed::<T>()?,
                    tb.typed::<T>()?,
                    op,
                ))
            });
            rebuild(ta.bands(), window, out_dtype, data, out_mask)
        }
        (Operand::Raster(a), Operand::Scalar(s)) => {
            eval_binary_scalar(a, *s, op, false, window, out_dtype)
        }
        (Operand::Scalar(s), Operand::Raster(a)) => {
            eval_binary_scalar(a, *s, op, true, window, out_dtype)
        }
        (Operand::Scalar(_), Operand::Scalar(_)) => Err(RasterError::InternalError(
            "binary node with two scalar operands".to_string(),
        )),
    }
}

fn eval_binary_scalar(
    input: &Raster,
    scalar: Scalar,
    op: BinaryOp,
    scalar_on_left: bool,
    window: Window,
    out_dtype: RasterDataType,
) -> Result<Tile> {
    let tile = eval_window(input, window)?.cast_to(out_dtype)?;
    let data = dispatch_dtype!(out_dtype, T => {
        let s = T::from_f64_lossy(scalar.as_f64());
        typed_slice_to_bytes(&arithmetic::binary_scalar(
            tile.typed::<T>()?,
            s,
            op,
            scalar_on_left,
        ))
    });
    rebuild(tile.bands(), window, out_dtype, data, tile.mask().map(<[u8]>::to_vec))
}

fn eval_compare(lhs: &Operand, rhs: &Operand, op: CmpOp, window: Window) -> Result<Tile> {
    match (lhs, rhs) {
        (Operand::Raster(a), Operand::Raster(b)) => {
            let common = RasterDataType::promote(a.dtype(), b.dtype());
            let ta = eval_window(a, window)?.cast_to(common)?;
            let tb = eval_window(b, window)?.cast_to(common)?;
            let out_mask = mask::union(ta.mask(), tb.mask());
            let data = dispatch_dtype!(common, T => {
                compare::compare_slices(ta.typed::<T>()?, tb.typed::<T>()?, op)
            });
            rebuild(ta.bands(), window, RasterDataType::Boolean, data, out_mask)
        }
        (Operand::Raster(a), Operand::Scalar(s)) | (Operand::Scalar(s), Operand::Raster(a)) => {
            let scalar_on_left = matches!(lhs, Operand::Scalar(_));
            let common = s.promote_with(a.dtype());
            let tile = eval_window(a, window)?.cast_to(common)?;
            let data = dispatch_dtype!(common, T => {
                let sv = T::from_f64_lossy(s.as_f64());
                compare::compare_scalar(tile.typed::<T>()?, sv, op, scalar_on_left)
            });
            rebuild(
                tile.bands(),
                window,
                RasterDataType::Boolean,
                data,
                tile.mask().map(<[u8]>::to_vec),
            )
        }
        (Operand::Scalar(_), Operand::Scalar(_)) => Err(RasterError::InternalError(
            "compare node with two scalar operands".to_string(),
        )),
    }
}

fn eval_select(
    cond: &Raster,
    lhs: &Operand,
    rhs: &Operand,
    window: Window,
    out_dtype: RasterDataType,
) -> Result<Tile> {
    let tcond = eval_window(cond, window)?;
    let truthy: Vec<bool> = dispatch_dtype!(tcond.dtype(), T => {
        let zero = T::from_f64_lossy(0.0);
        tcond.typed::<T>()?.iter().map(|&v| v != zero).collect()
    });

    enum Arm {
        Tile(Tile),
        Scalar(f64, bool), // value, contributes-null
    }
    let arm = |operand: &Operand| -> Result<Arm> {
        Ok(match operand {
            Operand::Raster(r) => Arm::Tile(eval_window(r, window)?.cast_to(out_dtype)?),
            Operand::Scalar(s) => Arm::Scalar(s.as_f64(), s.is_nan()),
        })
    };
    let t_arm = arm(lhs)?;
    let f_arm = arm(rhs)?;

    let cells = tcond.cells();
    let mut out_mask = vec![0u8; cells];
    let data = dispatch_dtype!(out_dtype, T => {
        let mut out: Vec<T> = Vec::with_capacity(cells);
        for (idx, &pick_true) in truthy.iter().enumerate() {
            let chosen = if pick_true { &t_arm } else { &f_arm };
            match chosen {
                Arm::Tile(tile) => {
                    out.push(tile.typed::<T>()?[idx]);
                    out_mask[idx] = tile.mask().map(|m| m[idx]).unwrap_or(0);
                }
                Arm::Scalar(v, null) => {
                    out.push(T::from_f64_lossy(*v));
                    out_mask[idx] = *null as u8;
                }
            }
        }
        typed_slice_to_bytes(&out)
    });
    rebuild(tcond.bands(), window, out_dtype, data, Some(out_mask))
}

/// Evaluates an input window expanded by an asymmetric halo, returning the
/// clamped tile plus the per-side padding that fell outside the raster.
fn read_haloed(
    input: &Raster,
    window: Window,
    before: (usize, usize),
    after: (usize, usize),
) -> Result<(Tile, [usize; 4])> {
    let (rows, cols) = (input.meta().rows, input.meta().cols);
    let r0 = window.row0.saturating_sub(before.0);
    let r1 = (window.row1 + after.0).min(rows);
    let c0 = window.col0.saturating_sub(before.1);
    let c1 = (window.col1 + after.1).min(cols);
    let tile = eval_window(input, Window::new(r0, r1, c0, c1))?;
    let pad_top = before.0 - (window.row0 - r0);
    let pad_bottom = after.0 - (r1 - window.row1);
    let pad_left = before.1 - (window.col0 - c0);
    let pad_right = after.1 - (c1 - window.col1);
    Ok((tile, [pad_top, pad_bottom, pad_left, pad_right]))
}

fn eval_convolve(
    input: &Raster,
    kernel: ArrayView2<f64>,
    fill: f64,
    window: Window,
    out_dtype: RasterDataType,
) -> Result<Tile> {
    let (kr, kc) = kernel.dim();
    let (top, bottom) = halo_for(kr);
    let (left, right) = halo_for(kc);
    let (tile, pads) = read_haloed(input, window, (top, left), (bottom, right))?;
    let [pad_top, _pad_bottom, pad_left, _pad_right] = pads;

    let out_rows = window.rows();
    let out_cols = window.cols();
    let padded_rows = out_rows + kr - 1;
    let padded_cols = out_cols + kc - 1;
    let read_above = top - pad_top;
    let read_left = left - pad_left;

    let mut data = Vec::with_capacity(tile.bands() * out_rows * out_cols);
    let mut out_mask = tile.mask().map(|_| Vec::with_capacity(tile.bands() * out_rows * out_cols));

    for band in 0..tile.bands() {
        // Assemble the padded f64 window: fill everywhere, then overlay the
        // cells actually read, with nulls treated as fill.
        let mut padded = vec![fill; padded_rows * padded_cols];
        let band_mask = tile.mask_band(band);
        dispatch_dtype!(tile.dtype(), T => {
            let src = tile.typed_band::<T>(band)?;
            for r in 0..tile.rows() {
                for c in 0..tile.cols() {
                    let idx = r * tile.cols() + c;
                    if band_mask.map(|m| m[idx] != 0).unwrap_or(false) {
                        continue;
                    }
                    let v: f64 = num_traits::AsPrimitive::<f64>::as_(src[idx]);
                    padded[(r + pad_top) * padded_cols + (c + pad_left)] = v;
                }
            }
        });
        let padded_view = ArrayView2::from_shape((padded_rows, padded_cols), &padded)
            .map_err(RasterError::from)?;
        let band_out = convolve2d(padded_view, kernel, out_rows, out_cols);
        data.extend_from_slice(&band_out);

        if let (Some(acc), Some(m)) = (out_mask.as_mut(), band_mask) {
            for r in 0..out_rows {
                let rr = r + read_above;
                let start = rr * tile.cols() + read_left;
                acc.extend_from_slice(&m[start..start + out_cols]);
            }
        }
    }
    from_f64_values(tile.bands(), window, out_dtype, &data, out_mask)
}

fn eval_morphology(
    input: &Raster,
    footprint: (usize, usize),
    op: MorphOp,
    window: Window,
    out_dtype: RasterDataType,
) -> Result<Tile> {
    let (fr, fc) = footprint;
    let (top, bottom) = halo_for(fr);
    let (left, right) = halo_for(fc);
    let (tile, pads) = read_haloed(input, window, (top, left), (bottom, right))?;
    let [pad_top, _, pad_left, _] = pads;

    let out_rows = window.rows();
    let out_cols = window.cols();
    let padded_rows = out_rows + fr - 1;
    let padded_cols = out_cols + fc - 1;
    let fill = match op {
        MorphOp::Erosion => f64::INFINITY,
        MorphOp::Dilation => f64::NEG_INFINITY,
    };

    let mut data: Vec<u8> = Vec::new();
    let masked = tile.mask().is_some();
    let mut out_mask = masked.then(Vec::new);

    for band in 0..tile.bands() {
        let band_mask = tile.mask_band(band);
        let band_bytes = dispatch_dtype!(out_dtype, T => {
            let fill_t = T::from_f64_lossy(fill);
            let mut padded = vec![fill_t; padded_rows * padded_cols];
            let src = tile.typed_band::<T>(band)?;
            for r in 0..tile.rows() {
                for c in 0..tile.cols() {
                    let idx = r * tile.cols() + c;
                    if band_mask.map(|m| m[idx] != 0).unwrap_or(false) {
                        continue;
                    }
                    padded[(r + pad_top) * padded_cols + (c + pad_left)] = src[idx];
                }
            }
            typed_slice_to_bytes(&grey_morph(
                &padded, padded_cols, out_rows, out_cols, fr, fc, op,
            ))
        });
        data.extend_from_slice(&band_bytes);

        if let Some(acc) = out_mask.as_mut() {
            // Run the same morphology on the validity buffer; the border
            // beyond the raster is invalid, so erosion shrinks inward there.
            let mut valid = vec![0u8; padded_rows * padded_cols];
            for r in 0..tile.rows() {
                for c in 0..tile.cols() {
                    let idx = r * tile.cols() + c;
                    let is_valid = band_mask.map(|m| m[idx] == 0).unwrap_or(true);
                    valid[(r + pad_top) * padded_cols + (c + pad_left)] = is_valid as u8;
                }
            }
            let valid_out = binary_morph(&valid, padded_cols, out_rows, out_cols, fr, fc, op);
            acc.extend(valid_out.iter().map(|&v| (v == 0) as u8));
        }
    }
    rebuild(tile.bands(), window, out_dtype, data, out_mask)
}

fn eval_aggregate(
    input: &Raster,
    factors: (usize, usize),
    stat: StatKind,
    window: Window,
    out_dtype: RasterDataType,
) -> Result<Tile> {
    let (fy, fx) = factors;
    let tile = eval_window(input, window.upscaled(fy, fx))?;
    let in_cols = tile.cols();
    let masked = input.is_masked();

    let mut values = Vec::with_capacity(tile.bands() * window.cells());
    let mut null_flags = masked.then(Vec::new);
    for band in 0..tile.bands() {
        let (band_vals, band_nulls) = dispatch_dtype!(tile.dtype(), T => {
            aggregate::coarsen(
                tile.typed_band::<T>(band)?,
                tile.mask_band(band),
                in_cols,
                fy,
                fx,
                stat,
            )
        });
        values.extend_from_slice(&band_vals);
        if let Some(acc) = null_flags.as_mut() {
            acc.extend_from_slice(&band_nulls);
        }
    }
    from_f64_values(tile.bands(), window, out_dtype, &values, null_flags)
}
