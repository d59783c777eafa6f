//! The lazy plan DAG.
//!
//! Every `Raster` operation appends an immutable node; nothing computes
//! until evaluation. A node's output metadata (dtype, shape, transform,
//! null value) is fixed by the `Raster` constructors at build time, so the
//! executor never has to infer types and invalid combinations fail before
//! any pixel is touched.

use std::sync::Arc;

use ndarray::Array2;
use serde_json::json;

use crate::compute::tile::Tile;
use crate::kernels::arithmetic::BinaryOp;
use crate::kernels::compare::CmpOp;
use crate::kernels::local::LocalReducer;
use crate::kernels::morphology::MorphOp;
use crate::kernels::remap::RangeMapping;
use crate::kernels::stats::StatKind;
use crate::raster::Raster;
use crate::types::Scalar;
use crate::types::RasterDataType;

/// One side of a binary operation: another lazy raster or a scalar.
#[derive(Debug, Clone)]
pub enum Operand {
    Raster(Raster),
    Scalar(Scalar),
}

impl Operand {
    pub fn as_raster(&self) -> Option<&Raster> {
        match self {
            Operand::Raster(r) => Some(r),
            Operand::Scalar(_) => None,
        }
    }
}

/// Where a leaf node's pixels come from.
#[derive(Debug, Clone)]
pub enum SourceKind {
    /// A fully materialized in-memory buffer.
    Materialized(Arc<Tile>),
    /// A GDAL-backed dataset read tile-by-tile on demand.
    #[cfg(feature = "gdal")]
    Dataset(Arc<crate::io::geotiff::GeoTiffSource>),
}

#[derive(Debug)]
pub enum PlanNode {
    Source(SourceKind),
    Binary {
        lhs: Operand,
        rhs: Operand,
        op: BinaryOp,
    },
    Compare {
        lhs: Operand,
        rhs: Operand,
        op: CmpOp,
    },
    Negate {
        input: Raster,
    },
    Cast {
        input: Raster,
        to: RasterDataType,
    },
    ReplaceNull {
        input: Raster,
        value: f64,
    },
    /// Adds cells equal to `value` (or NaN, for a NaN sentinel) to the mask.
    MaskSentinel {
        input: Raster,
        value: f64,
    },
    RemapRange {
        input: Raster,
        mappings: Vec<RangeMapping>,
    },
    Select {
        cond: Raster,
        lhs: Operand,
        rhs: Operand,
    },
    Convolve {
        input: Raster,
        kernel: Array2<f64>,
        fill: f64,
    },
    Morphology {
        input: Raster,
        footprint: (usize, usize),
        op: MorphOp,
    },
    Aggregate {
        input: Raster,
        factors: (usize, usize),
        stat: StatKind,
    },
    LocalStats {
        input: Raster,
        reducer: LocalReducer,
    },
    BandConcat {
        inputs: Vec<Raster>,
    },
    SelectBands {
        input: Raster,
        bands: Vec<usize>,
    },
}

impl PlanNode {
    /// A short name for diagnostics and error context.
    pub fn name(&self) -> &'static str {
        match self {
            PlanNode::Source(SourceKind::Materialized(_)) => "source:mem",
            #[cfg(feature = "gdal")]
            PlanNode::Source(SourceKind::Dataset(_)) => "source:dataset",
            PlanNode::Binary { .. } => "binary",
            PlanNode::Compare { .. } => "compare",
            PlanNode::Negate { .. } => "negate",
            PlanNode::Cast { .. } => "cast",
            PlanNode::ReplaceNull { .. } => "replace_null",
            PlanNode::MaskSentinel { .. } => "mask_sentinel",
            PlanNode::RemapRange { .. } => "remap_range",
            PlanNode::Select { .. } => "select",
            PlanNode::Convolve { .. } => "convolve",
            PlanNode::Morphology { .. } => "morphology",
            PlanNode::Aggregate { .. } => "aggregate",
            PlanNode::LocalStats { .. } => "local_stats",
            PlanNode::BandConcat { .. } => "band_concat",
            PlanNode::SelectBands { .. } => "select_bands",
        }
    }

    /// A JSON sketch of the plan tree, for logging and debugging.
    pub fn describe(&self, out_dtype: RasterDataType) -> serde_json::Value {
        let children: Vec<serde_json::Value> = self
            .children()
            .iter()
            .map(|r| r.plan().describe(r.dtype()))
            .collect();
        json!({
            "op": self.name(),
            "dtype": out_dtype.to_string(),
            "inputs": children,
        })
    }

    fn children(&self) -> Vec<&Raster> {
        let mut out = Vec::new();
        match self {
            PlanNode::Source(_) => {}
            PlanNode::Binary { lhs, rhs, .. } | PlanNode::Compare { lhs, rhs, .. } => {
                for operand in [lhs, rhs] {
                    if let Operand::Raster(r) = operand {
                        out.push(r);
                    }
                }
            }
            PlanNode::Select { cond, lhs, rhs } => {
                out.push(cond);
                for operand in [lhs, rhs] {
                    if let Operand::Raster(r) = operand {
                        out.push(r);
                    }
                }
            }
            PlanNode::Negate { input }
            | PlanNode::Cast { input, .. }
            | PlanNode::ReplaceNull { input, .. }
            | PlanNode::MaskSentinel { input, .. }
            | PlanNode::RemapRange { input, .. }
            | PlanNode::Convolve { input, .. }
            | PlanNode::Morphology { input, .. }
            | PlanNode::Aggregate { input, .. }
            | PlanNode::LocalStats { input, .. }
            | PlanNode::SelectBands { input, .. } => out.push(input),
            PlanNode::BandConcat { inputs } => out.extend(inputs.iter()),
        }
        out
    }
}
