//! Tests for the generalization operations: aggregate, band_concat,
//! morphology, local stats, regions, select and model prediction.

use ndarray::ArrayView2;

use crate::general::{
    aggregate, band_concat, dilate, erode, local_stats, predict_model, regions, select, Model,
};
use crate::kernels::local::LocalReducer;
use crate::kernels::stats::StatKind;
use crate::raster::Raster;
use crate::types::RasterDataType;

fn values(raster: &Raster) -> Vec<f64> {
    raster.to_ndarray::<f64>().unwrap().into_iter().collect()
}

//==================================================================================
// aggregate
//==================================================================================

#[test]
fn test_aggregate_mean_and_sum() {
    #[rustfmt::skip]
    let r = Raster::from_vec(vec![
        1.0f64, 2.0, 3.0, 4.0,
        5.0, 6.0, 7.0, 8.0,
    ], 1, 2, 4).unwrap();
    let mean = aggregate(&r, (2, 2), StatKind::Mean).unwrap();
    assert_eq!(mean.shape(), (1, 1, 2));
    assert_eq!(values(&mean), vec![3.5, 5.5]);
    let sum = aggregate(&r, (2, 2), StatKind::Sum).unwrap();
    assert_eq!(values(&sum), vec![14.0, 22.0]);
}

#[test]
fn test_aggregate_trims_ragged_edges() {
    let r = Raster::from_vec((0..25).map(|v| v as f64).collect(), 1, 5, 5).unwrap();
    let out = aggregate(&r, (2, 2), StatKind::Max).unwrap();
    // 5x5 coarsened by 2 trims the last row/column.
    assert_eq!(out.shape(), (1, 2, 2));
    assert_eq!(values(&out), vec![6.0, 8.0, 16.0, 18.0]);
}

#[test]
fn test_aggregate_scales_transform() {
    let r = Raster::from_vec(vec![0.0f64; 16], 1, 4, 4).unwrap();
    let out = aggregate(&r, (2, 2), StatKind::Mean).unwrap();
    assert_eq!(out.transform().pixel_width(), 2.0);
    assert_eq!(out.transform().pixel_height(), 2.0);
}

#[test]
fn test_aggregate_dtype_rules() {
    let r = Raster::from_vec(vec![1u8; 16], 1, 4, 4).unwrap();
    assert_eq!(
        aggregate(&r, (2, 2), StatKind::Max).unwrap().dtype(),
        RasterDataType::UInt8
    );
    assert_eq!(
        aggregate(&r, (2, 2), StatKind::Mean).unwrap().dtype(),
        RasterDataType::Float64
    );
    assert_eq!(
        aggregate(&r, (2, 2), StatKind::Unique).unwrap().dtype(),
        RasterDataType::UInt8
    );
    let f = Raster::from_vec(vec![1.0f32; 16], 1, 4, 4).unwrap();
    assert_eq!(
        aggregate(&f, (2, 2), StatKind::Std).unwrap().dtype(),
        RasterDataType::Float32
    );
}

#[test]
fn test_aggregate_masked_blocks() {
    let r = Raster::from_vec(vec![-1.0f64, 3.0, -1.0, 5.0], 1, 2, 2)
        .unwrap()
        .set_null_value(Some(-1.0))
        .unwrap();
    let out = aggregate(&r, (2, 1), StatKind::Mean).unwrap();
    // Left column block is entirely null, the right one averages its cells.
    assert_eq!(out.eval_mask().unwrap().unwrap(), vec![1, 0]);
    let vals = values(&out);
    assert!(vals[0].is_nan());
    assert_eq!(vals[1], 4.0);
}

#[test]
fn test_aggregate_validation() {
    let r = Raster::from_vec(vec![0.0f64; 16], 1, 4, 4).unwrap();
    assert!(aggregate(&r, (1, 1), StatKind::Mean).is_err());
    assert!(aggregate(&r, (0, 2), StatKind::Mean).is_err());
    assert!(aggregate(&r, (2, 2), StatKind::Count).is_err());
}

//==================================================================================
// band_concat
//==================================================================================

#[test]
fn test_band_concat() {
    let a = Raster::from_vec(vec![1.0f64, 2.0], 1, 1, 2).unwrap();
    let b = Raster::from_vec(vec![3.0f64, 4.0], 1, 1, 2).unwrap();
    let out = band_concat(&[a, b], None).unwrap();
    assert_eq!(out.shape(), (2, 1, 2));
    assert_eq!(values(&out), vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_band_concat_promotes_dtype() {
    let a = Raster::from_vec(vec![1u8, 2], 1, 1, 2).unwrap();
    let b = Raster::from_vec(vec![0.5f64, 1.5], 1, 1, 2).unwrap();
    let out = band_concat(&[a, b], None).unwrap();
    assert_eq!(out.dtype(), RasterDataType::Float64);
    assert_eq!(values(&out), vec![1.0, 2.0, 0.5, 1.5]);
}

#[test]
fn test_band_concat_validation() {
    assert!(band_concat(&[], None).is_err());
    let a = Raster::from_vec(vec![1.0f64, 2.0], 1, 1, 2).unwrap();
    let b = Raster::from_vec(vec![1.0f64], 1, 1, 1).unwrap();
    assert!(band_concat(&[a, b], None).is_err());
}

//==================================================================================
// dilate / erode
//==================================================================================

#[test]
fn test_dilate_spreads_high_values() {
    #[rustfmt::skip]
    let r = Raster::from_vec(vec![
        0i32, 0, 0,
        0, 9, 0,
        0, 0, 0,
    ], 1, 3, 3).unwrap();
    let out = dilate(&r, (3, 3)).unwrap();
    assert_eq!(out.dtype(), RasterDataType::Int32);
    assert_eq!(values(&out), vec![9.0; 9]);
}

#[test]
fn test_erode_contracts_features() {
    #[rustfmt::skip]
    let r = Raster::from_vec(vec![
        5i32, 5, 5,
        5, 1, 5,
        5, 5, 5,
    ], 1, 3, 3).unwrap();
    let out = erode(&r, (3, 3)).unwrap();
    assert_eq!(values(&out), vec![1.0; 9]);
}

#[test]
fn test_morphology_validation() {
    let r = Raster::from_vec(vec![0i32; 9], 1, 3, 3).unwrap();
    assert!(dilate(&r, (1, 1)).is_err());
    assert!(erode(&r, (0, 3)).is_err());
    assert!(dilate(&r, (1, 3)).is_ok());
}

//==================================================================================
// local_stats
//==================================================================================

#[test]
fn test_local_stats_mean() {
    let data: Vec<f64> = vec![1.0, 10.0, 2.0, 20.0, 3.0, 30.0]; // 3 bands x 2 cells
    let r = Raster::from_vec(data, 3, 1, 2).unwrap();
    let out = local_stats(&r, LocalReducer::Stat(StatKind::Mean)).unwrap();
    assert_eq!(out.shape(), (1, 1, 2));
    assert_eq!(values(&out), vec![2.0, 20.0]);
}

#[test]
fn test_local_stats_band_indices() {
    let data: Vec<f64> = vec![1.0, 9.0, 5.0, 2.0, 3.0, 4.0];
    let r = Raster::from_vec(data, 3, 1, 2).unwrap();
    let out = local_stats(&r, LocalReducer::MaxBand).unwrap();
    assert_eq!(out.dtype(), RasterDataType::UInt8);
    assert_eq!(values(&out), vec![2.0, 0.0]);
    let out = local_stats(&r, LocalReducer::MinBand).unwrap();
    assert_eq!(values(&out), vec![0.0, 1.0]);
}

#[test]
fn test_local_stats_unique_dtype_widens_when_masked() {
    let r = Raster::from_vec(vec![1i32, 2, 3, 4], 2, 1, 2).unwrap();
    assert_eq!(
        local_stats(&r, LocalReducer::Stat(StatKind::Unique)).unwrap().dtype(),
        RasterDataType::UInt8
    );
    let masked = r.set_null_value(Some(-1.0)).unwrap();
    assert_eq!(
        local_stats(&masked, LocalReducer::Stat(StatKind::Unique))
            .unwrap()
            .dtype(),
        RasterDataType::Int16
    );
}

//==================================================================================
// regions
//==================================================================================

#[test]
fn test_regions_connectivity() {
    #[rustfmt::skip]
    let r = Raster::from_vec(vec![
        1i32, 0,
        0, 1,
    ], 1, 2, 2).unwrap();
    let rook = regions(&r, 4, None).unwrap();
    assert_eq!(rook.dtype(), RasterDataType::UInt64);
    assert_eq!(values(&rook), vec![1.0, 0.0, 0.0, 2.0]);
    let queen = regions(&r, 8, None).unwrap();
    assert_eq!(values(&queen), vec![1.0, 0.0, 0.0, 1.0]);
    assert!(regions(&r, 5, None).is_err());
}

#[test]
fn test_regions_returns_materialized_raster() {
    let r = Raster::from_vec(vec![1i32, 1, 0, 2], 1, 2, 2).unwrap();
    let out = regions(&r, 4, None).unwrap();
    assert!(out.is_materialized());
}

#[test]
fn test_regions_with_mask() {
    let r = Raster::from_vec(vec![1i32, -9, 1, 1], 1, 1, 4)
        .unwrap()
        .set_null_value(Some(-9.0))
        .unwrap();
    let out = regions(&r, 4, None).unwrap();
    assert!(out.is_masked());
    assert_eq!(out.eval_mask().unwrap().unwrap(), vec![0, 1, 0, 0]);
    let arr = out.to_ndarray::<u64>().unwrap();
    assert_eq!(arr[[0, 0, 0]], 1);
    assert_eq!(arr[[0, 0, 2]], 2);
    assert_eq!(arr[[0, 0, 3]], 2);
}

//==================================================================================
// select
//==================================================================================

#[test]
fn test_select_between_rasters() {
    let cond = Raster::from_vec(vec![1i32, 0, 1, 0], 1, 2, 2).unwrap();
    let t = Raster::from_vec(vec![10.0f64, 20.0, 30.0, 40.0], 1, 2, 2).unwrap();
    let f = Raster::from_vec(vec![-1.0f64, -2.0, -3.0, -4.0], 1, 2, 2).unwrap();
    let out = select(&cond, &t, &f).unwrap();
    assert_eq!(values(&out), vec![10.0, -2.0, 30.0, -4.0]);
}

#[test]
fn test_select_scalar_arms() {
    let cond = Raster::from_vec(vec![5i32, 0, 2, 0], 1, 2, 2).unwrap();
    let out = select(&cond, 1.0f64, 0.0f64).unwrap();
    assert_eq!(values(&out), vec![1.0, 0.0, 1.0, 0.0]);
}

#[test]
fn test_select_nan_scalar_masks() {
    let cond = Raster::from_vec(vec![1i32, 0], 1, 1, 2).unwrap();
    let t = Raster::from_vec(vec![7.0f64, 7.0], 1, 1, 2).unwrap();
    let out = select(&cond, &t, f64::NAN).unwrap();
    assert!(out.is_masked());
    assert_eq!(out.eval_mask().unwrap().unwrap(), vec![0, 1]);
}

#[test]
fn test_select_rejects_float_condition() {
    let cond = Raster::from_vec(vec![1.0f64, 0.0], 1, 1, 2).unwrap();
    let t = Raster::from_vec(vec![1.0f64, 1.0], 1, 1, 2).unwrap();
    assert!(select(&cond, &t, 0.0f64).is_err());
}

//==================================================================================
// predict_model
//==================================================================================

struct BandMean;

impl Model for BandMean {
    fn predict(&self, predictors: ArrayView2<f64>) -> Vec<f64> {
        predictors
            .rows()
            .into_iter()
            .map(|row| {
                let valid: Vec<f64> = row.iter().copied().filter(|v| !v.is_nan()).collect();
                if valid.is_empty() {
                    f64::NAN
                } else {
                    valid.iter().sum::<f64>() / valid.len() as f64
                }
            })
            .collect()
    }
}

#[test]
fn test_predict_model() {
    let data: Vec<f64> = vec![1.0, 2.0, 3.0, 4.0]; // 2 bands x 2 cells
    let r = Raster::from_vec(data, 2, 1, 2).unwrap();
    let out = predict_model(&r, &BandMean).unwrap();
    assert_eq!(out.shape(), (1, 1, 2));
    assert_eq!(out.dtype(), RasterDataType::Float64);
    assert_eq!(values(&out), vec![2.0, 3.0]);
}

#[test]
fn test_predict_model_masks_null_pixels() {
    let r = Raster::from_vec(vec![-9.0f64, 2.0, -9.0, 4.0], 2, 1, 2)
        .unwrap()
        .set_null_value(Some(-9.0))
        .unwrap();
    let out = predict_model(&r, &BandMean).unwrap();
    assert!(out.is_masked());
    // Cell 0 is null in both bands; the model sees NaN and returns NaN.
    assert_eq!(out.eval_mask().unwrap().unwrap(), vec![1, 0]);
    let vals = values(&out);
    assert!(vals[0].is_nan());
    assert_eq!(vals[1], 3.0);
}
