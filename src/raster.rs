//! The public `Raster` type: a lazy handle onto a plan of tiled raster
//! operations plus the metadata describing its output.
//!
//! Rasters are cheap to clone (the plan is `Arc`-shared) and immutable;
//! every operation returns a new `Raster`. Nothing computes until
//! [`Raster::eval`].

use std::sync::Arc;

use ndarray::{Array2, Array3};

use crate::compute::executor;
use crate::compute::plan::{Operand, PlanNode, SourceKind};
use crate::compute::tile::Tile;
use crate::config::RasterConfig;
use crate::error::{RasterError, Result};
use crate::geo::{GeoTransform, RasterMeta};
use crate::grid::Window;
use crate::kernels::arithmetic::BinaryOp;
use crate::kernels::compare::CmpOp;
use crate::kernels::remap::RangeMapping;
use crate::null_handling::mask;
use crate::traits::RasterElement;
use crate::types::{RasterDataType, Scalar};

#[derive(Debug, Clone)]
pub struct Raster {
    meta: Arc<RasterMeta>,
    plan: Arc<PlanNode>,
}

impl Raster {
    //==============================================================================
    // Constructors
    //==============================================================================

    pub(crate) fn from_plan(meta: RasterMeta, plan: PlanNode) -> Raster {
        Raster {
            meta: Arc::new(meta),
            plan: Arc::new(plan),
        }
    }

    /// Wraps a fully materialized tile. The tile's mask is rebuilt from the
    /// metadata's null value so the two always agree.
    pub(crate) fn from_tile(mut tile: Tile, meta: RasterMeta) -> Result<Raster> {
        if tile.dtype() != meta.dtype
            || (tile.bands(), tile.rows(), tile.cols()) != meta.shape()
        {
            return Err(RasterError::InternalError(
                "tile layout does not match raster metadata".to_string(),
            ));
        }
        match meta.null_value {
            Some(nv) => {
                let m = crate::kernels::dispatch_dtype!(meta.dtype, T => {
                    mask::mask_from_null_value(tile.typed::<T>()?, nv)
                });
                tile.set_mask(Some(m));
            }
            None => tile.set_mask(None),
        }
        Ok(Raster::from_plan(
            meta,
            PlanNode::Source(SourceKind::Materialized(Arc::new(tile))),
        ))
    }

    /// Builds an ungeoreferenced raster from a band-major vector.
    pub fn from_vec<T: RasterElement>(
        data: Vec<T>,
        bands: usize,
        rows: usize,
        cols: usize,
    ) -> Result<Raster> {
        let meta = RasterMeta::ungeoreferenced(bands, rows, cols, T::DTYPE);
        let tile = Tile::from_typed(T::DTYPE, bands, rows, cols, data, None)?;
        Raster::from_tile(tile, meta)
    }

    /// Builds an ungeoreferenced raster from a `(bands, rows, cols)` array.
    pub fn from_ndarray<T: RasterElement>(array: &Array3<T>) -> Result<Raster> {
        let (bands, rows, cols) = array.dim();
        let data: Vec<T> = array.iter().copied().collect();
        Raster::from_vec(data, bands, rows, cols)
    }

    //==============================================================================
    // Properties
    //==============================================================================

    pub fn meta(&self) -> &RasterMeta {
        &self.meta
    }

    pub(crate) fn plan(&self) -> &PlanNode {
        &self.plan
    }

    /// (bands, rows, cols).
    pub fn shape(&self) -> (usize, usize, usize) {
        self.meta.shape()
    }

    pub fn dtype(&self) -> RasterDataType {
        self.meta.dtype
    }

    pub fn null_value(&self) -> Option<f64> {
        self.meta.null_value
    }

    pub fn is_masked(&self) -> bool {
        self.meta.is_masked()
    }

    pub fn transform(&self) -> GeoTransform {
        self.meta.transform
    }

    /// The projection as WKT; empty for ungeoreferenced rasters.
    pub fn crs(&self) -> &str {
        &self.meta.projection
    }

    /// True once this raster is backed by an in-memory buffer rather than
    /// a pending computation.
    pub fn is_materialized(&self) -> bool {
        matches!(
            self.plan(),
            PlanNode::Source(SourceKind::Materialized(_))
        )
    }

    /// A JSON sketch of the pending computation, for logging and debugging.
    pub fn plan_json(&self) -> serde_json::Value {
        self.plan.describe(self.dtype())
    }

    //==============================================================================
    // Evaluation
    //==============================================================================

    /// Computes the raster with the default configuration. Returns a new,
    /// materialized raster; `self` stays lazy.
    pub fn eval(&self) -> Result<Raster> {
        self.eval_with(&RasterConfig::default())
    }

    /// Computes the raster tile-by-tile with the given configuration.
    pub fn eval_with(&self, config: &RasterConfig) -> Result<Raster> {
        let tile = executor::materialize(self, config)?;
        let meta = (*self.meta).clone();
        Ok(Raster::from_plan(
            meta,
            PlanNode::Source(SourceKind::Materialized(Arc::new(tile))),
        ))
    }

    /// Evaluates the full extent into a `(bands, rows, cols)` array of the
    /// requested element type, casting if necessary. Masked cells hold the
    /// null sentinel.
    pub fn to_ndarray<T: RasterElement>(&self) -> Result<Array3<T>> {
        let (bands, rows, cols) = self.shape();
        let mut tile = executor::eval_window(self, Window::full(rows, cols))?;
        if let (Some(nv), Some(m)) = (self.null_value(), tile.mask().map(<[u8]>::to_vec)) {
            crate::kernels::dispatch_dtype!(self.dtype(), T2 => {
                mask::write_null_value(tile.typed_mut::<T2>()?, &m, nv);
            });
        }
        let cast = tile.cast_to(T::DTYPE)?;
        let data = cast.typed::<T>()?.to_vec();
        Ok(Array3::from_shape_vec((bands, rows, cols), data)?)
    }

    /// The validity mask of the evaluated raster (1 = null), or `None`
    /// when every cell is valid.
    pub fn eval_mask(&self) -> Result<Option<Vec<u8>>> {
        let (_, rows, cols) = self.shape();
        let tile = executor::eval_window(self, Window::full(rows, cols))?;
        Ok(tile.mask().map(<[u8]>::to_vec))
    }

    //==============================================================================
    // Dtype and null handling
    //==============================================================================

    /// Lazily casts to another dtype.
    pub fn astype(&self, dtype: RasterDataType) -> Raster {
        if dtype == self.dtype() {
            return self.clone();
        }
        let mut meta = (*self.meta).clone();
        meta.dtype = dtype;
        if meta.null_value.is_some() {
            meta.null_value = Some(dtype.default_null_value());
        }
        Raster::from_plan(
            meta,
            PlanNode::Cast {
                input: self.clone(),
                to: dtype,
            },
        )
    }

    /// Replaces null cells with `value`; the result is unmasked.
    pub fn replace_null(&self, value: impl Into<Scalar>) -> Raster {
        let value = value.into();
        let out_dtype = value.promote_with(self.dtype());
        let mut meta = (*self.meta).clone();
        meta.dtype = out_dtype;
        meta.null_value = None;
        Raster::from_plan(
            meta,
            PlanNode::ReplaceNull {
                input: self.astype(out_dtype),
                value: value.as_f64(),
            },
        )
    }

    /// Declares (or clears) the null sentinel. Cells equal to the sentinel
    /// join the mask when the raster is next evaluated.
    pub fn set_null_value(&self, null_value: Option<f64>) -> Result<Raster> {
        let mut meta = (*self.meta).clone();
        meta.null_value = null_value;
        if let PlanNode::Source(SourceKind::Materialized(tile)) = self.plan() {
            return Raster::from_tile((**tile).clone(), meta);
        }
        match null_value {
            Some(value) => Ok(Raster::from_plan(
                meta,
                PlanNode::MaskSentinel {
                    input: self.clone(),
                    value,
                },
            )),
            None => Ok(Raster::from_plan(
                meta,
                PlanNode::ReplaceNull {
                    input: self.clone(),
                    value: self.dtype().default_null_value(),
                },
            )),
        }
    }

    //==============================================================================
    // Arithmetic
    //==============================================================================

    fn binary(&self, other: Operand, op: BinaryOp, self_on_left: bool) -> Result<Raster> {
        let mut out_dtype = match &other {
            Operand::Raster(r) => {
                if self.shape() != r.shape() {
                    return Err(RasterError::ShapeMismatch {
                        expected: self.shape(),
                        got: r.shape(),
                    });
                }
                RasterDataType::promote(self.dtype(), r.dtype())
            }
            Operand::Scalar(s) => s.promote_with(self.dtype()),
        };
        // Arithmetic on booleans computes in unsigned bytes.
        if out_dtype.is_bool() {
            out_dtype = RasterDataType::UInt8;
        }
        if op == BinaryOp::Divide && !out_dtype.is_float() {
            out_dtype = RasterDataType::promote_to_float(out_dtype, out_dtype);
        }

        let masked = self.is_masked()
            || matches!(&other, Operand::Raster(r) if r.is_masked())
            || matches!(&other, Operand::Scalar(s) if s.is_nan());
        let mut meta = (*self.meta).clone();
        meta.dtype = out_dtype;
        meta.null_value = masked.then(|| out_dtype.default_null_value());

        let me = Operand::Raster(self.clone());
        let (lhs, rhs) = if self_on_left { (me, other) } else { (other, me) };
        Ok(Raster::from_plan(meta, PlanNode::Binary { lhs, rhs, op }))
    }

    pub fn add(&self, other: impl Into<Operand>) -> Result<Raster> {
        self.binary(other.into(), BinaryOp::Add, true)
    }

    pub fn subtract(&self, other: impl Into<Operand>) -> Result<Raster> {
        self.binary(other.into(), BinaryOp::Subtract, true)
    }

    pub fn multiply(&self, other: impl Into<Operand>) -> Result<Raster> {
        self.binary(other.into(), BinaryOp::Multiply, true)
    }

    pub fn divide(&self, other: impl Into<Operand>) -> Result<Raster> {
        self.binary(other.into(), BinaryOp::Divide, true)
    }

    /// Floored modulo: the result takes the divisor's sign.
    pub fn modulo(&self, other: impl Into<Operand>) -> Result<Raster> {
        self.binary(other.into(), BinaryOp::Modulo, true)
    }

    pub fn pow(&self, other: impl Into<Operand>) -> Result<Raster> {
        self.binary(other.into(), BinaryOp::Power, true)
    }

    /// `other op self` for the non-commutative operations, used by the
    /// scalar-on-the-left operator impls.
    pub(crate) fn binary_reversed(&self, other: Operand, op: BinaryOp) -> Result<Raster> {
        self.binary(other, op, false)
    }

    pub fn negate(&self) -> Raster {
        Raster::from_plan(
            (*self.meta).clone(),
            PlanNode::Negate {
                input: self.clone(),
            },
        )
    }

    //==============================================================================
    // Comparison
    //==============================================================================

    fn comparison(&self, other: Operand, op: CmpOp) -> Result<Raster> {
        if let Operand::Raster(r) = &other {
            if self.shape() != r.shape() {
                return Err(RasterError::ShapeMismatch {
                    expected: self.shape(),
                    got: r.shape(),
                });
            }
        }
        let masked =
            self.is_masked() || matches!(&other, Operand::Raster(r) if r.is_masked());
        let mut meta = (*self.meta).clone();
        meta.dtype = RasterDataType::Boolean;
        meta.null_value = masked.then(|| RasterDataType::Boolean.default_null_value());
        Ok(Raster::from_plan(
            meta,
            PlanNode::Compare {
                lhs: Operand::Raster(self.clone()),
                rhs: other,
                op,
            },
        ))
    }

    pub fn eq(&self, other: impl Into<Operand>) -> Result<Raster> {
        self.comparison(other.into(), CmpOp::Eq)
    }

    pub fn ne(&self, other: impl Into<Operand>) -> Result<Raster> {
        self.comparison(other.into(), CmpOp::Ne)
    }

    pub fn lt(&self, other: impl Into<Operand>) -> Result<Raster> {
        self.comparison(other.into(), CmpOp::Lt)
    }

    pub fn le(&self, other: impl Into<Operand>) -> Result<Raster> {
        self.comparison(other.into(), CmpOp::Le)
    }

    pub fn gt(&self, other: impl Into<Operand>) -> Result<Raster> {
        self.comparison(other.into(), CmpOp::Gt)
    }

    pub fn ge(&self, other: impl Into<Operand>) -> Result<Raster> {
        self.comparison(other.into(), CmpOp::Ge)
    }

    //==============================================================================
    // Focal and structural operations
    //==============================================================================

    /// 2-D sliding dot product of `kernel` over each band. Cells the
    /// kernel reaches beyond the raster edge (and null cells) contribute
    /// `fill`. The output mask equals the input mask.
    pub fn convolve2d(&self, kernel: Array2<f64>, fill: f64) -> Result<Raster> {
        let (kr, kc) = kernel.dim();
        if kr == 0 || kc == 0 {
            return Err(RasterError::InvalidArgument(
                "convolution kernel must be non-empty".to_string(),
            ));
        }
        if kernel.iter().any(|v| !v.is_finite()) {
            return Err(RasterError::InvalidArgument(
                "convolution kernel values must be finite".to_string(),
            ));
        }
        let out_dtype = if self.dtype() == RasterDataType::Float32 {
            RasterDataType::Float32
        } else {
            RasterDataType::Float64
        };
        let mut meta = (*self.meta).clone();
        meta.dtype = out_dtype;
        if meta.null_value.is_some() {
            meta.null_value = Some(out_dtype.default_null_value());
        }
        Ok(Raster::from_plan(
            meta,
            PlanNode::Convolve {
                input: self.clone(),
                kernel,
                fill,
            },
        ))
    }

    /// Remaps values in `[min, max)` ranges to new values; the first
    /// matching range wins.
    pub fn remap_range(&self, mappings: &[(f64, f64, f64)]) -> Result<Raster> {
        if mappings.is_empty() {
            return Err(RasterError::InvalidArgument(
                "no mappings provided".to_string(),
            ));
        }
        let mut out_dtype = self.dtype();
        for &(min, max, new_value) in mappings {
            if min.is_nan() || max.is_nan() {
                return Err(RasterError::InvalidArgument(
                    "mapping min and max values cannot be NaN".to_string(),
                ));
            }
            if min >= max {
                return Err(RasterError::InvalidArgument(format!(
                    "mapping min value must be strictly less than max value: {}, {}",
                    min, max
                )));
            }
            let scalar = if new_value.fract() == 0.0 && new_value.is_finite() {
                Scalar::Int(new_value as i64)
            } else {
                Scalar::Float(new_value)
            };
            out_dtype = scalar.promote_with(out_dtype);
        }
        let mut meta = (*self.meta).clone();
        meta.dtype = out_dtype;
        if meta.null_value.is_some() {
            meta.null_value = Some(out_dtype.default_null_value());
        }
        Ok(Raster::from_plan(
            meta,
            PlanNode::RemapRange {
                input: self.clone(),
                mappings: mappings
                    .iter()
                    .map(|&(min, max, new_value)| RangeMapping {
                        min,
                        max,
                        new_value,
                    })
                    .collect(),
            },
        ))
    }

    /// A raster holding only the selected bands (0-based indices).
    pub fn get_bands(&self, bands: &[usize]) -> Result<Raster> {
        if bands.is_empty() {
            return Err(RasterError::InvalidArgument(
                "no bands selected".to_string(),
            ));
        }
        for &b in bands {
            if b >= self.meta.bands {
                return Err(RasterError::BandOutOfRange(b, self.meta.bands));
            }
        }
        let mut meta = (*self.meta).clone();
        meta.bands = bands.len();
        Ok(Raster::from_plan(
            meta,
            PlanNode::SelectBands {
                input: self.clone(),
                bands: bands.to_vec(),
            },
        ))
    }
}

//==================================================================================
// Operand conversions and operator sugar
//==================================================================================

impl From<&Raster> for Operand {
    fn from(r: &Raster) -> Operand {
        Operand::Raster(r.clone())
    }
}

impl From<Raster> for Operand {
    fn from(r: Raster) -> Operand {
        Operand::Raster(r)
    }
}

macro_rules! impl_operand_from_scalar {
    ($($T:ty),+) => {
        $(
            impl From<$T> for Operand {
                fn from(v: $T) -> Operand {
                    Operand::Scalar(v.into())
                }
            }
        )+
    };
}
impl_operand_from_scalar!(f64, f32, i64, i32, bool);

/// Operators panic on shape mismatch (the underlying methods return
/// `Result`); this mirrors the array-library convention.
macro_rules! impl_raster_binop {
    ($Trait:ident, $method:ident, $raster_method:ident) => {
        impl<O: Into<Operand>> std::ops::$Trait<O> for &Raster {
            type Output = Raster;
            fn $method(self, rhs: O) -> Raster {
                self.$raster_method(rhs).expect("raster operands must share a shape")
            }
        }

        impl<O: Into<Operand>> std::ops::$Trait<O> for Raster {
            type Output = Raster;
            fn $method(self, rhs: O) -> Raster {
                (&self).$raster_method(rhs).expect("raster operands must share a shape")
            }
        }
    };
}

impl_raster_binop!(Add, add, add);
impl_raster_binop!(Sub, sub, subtract);
impl_raster_binop!(Mul, mul, multiply);
impl_raster_binop!(Div, div, divide);
impl_raster_binop!(Rem, rem, modulo);

/// Scalar-on-the-left operators (`2.0 - &raster`).
macro_rules! impl_scalar_lhs_binop {
    ($($T:ty),+) => {
        $(
            impl std::ops::Add<&Raster> for $T {
                type Output = Raster;
                fn add(self, rhs: &Raster) -> Raster {
                    rhs.binary_reversed(Operand::Scalar(self.into()), BinaryOp::Add)
                        .expect("scalar/raster add")
                }
            }
            impl std::ops::Sub<&Raster> for $T {
                type Output = Raster;
                fn sub(self, rhs: &Raster) -> Raster {
                    rhs.binary_reversed(Operand::Scalar(self.into()), BinaryOp::Subtract)
                        .expect("scalar/raster subtract")
                }
            }
            impl std::ops::Mul<&Raster> for $T {
                type Output = Raster;
                fn mul(self, rhs: &Raster) -> Raster {
                    rhs.binary_reversed(Operand::Scalar(self.into()), BinaryOp::Multiply)
                        .expect("scalar/raster multiply")
                }
            }
            impl std::ops::Div<&Raster> for $T {
                type Output = Raster;
                fn div(self, rhs: &Raster) -> Raster {
                    rhs.binary_reversed(Operand::Scalar(self.into()), BinaryOp::Divide)
                        .expect("scalar/raster divide")
                }
            }
            impl std::ops::Rem<&Raster> for $T {
                type Output = Raster;
                fn rem(self, rhs: &Raster) -> Raster {
                    rhs.binary_reversed(Operand::Scalar(self.into()), BinaryOp::Modulo)
                        .expect("scalar/raster modulo")
                }
            }
        )+
    };
}
impl_scalar_lhs_binop!(f64, i64, i32);

impl std::ops::Neg for &Raster {
    type Output = Raster;
    fn neg(self) -> Raster {
        self.negate()
    }
}

impl std::ops::Neg for Raster {
    type Output = Raster;
    fn neg(self) -> Raster {
        self.negate()
    }
}
