//! Executor-level tests: tiled evaluation must be indistinguishable from
//! whole-raster evaluation, for element-wise, focal and aggregating plans
//! alike.

use ndarray::arr2;

use crate::compute::executor::eval_window;
use crate::config::RasterConfig;
use crate::general;
use crate::grid::Window;
use crate::kernels::stats::StatKind;
use crate::raster::Raster;

fn checkerboard(rows: usize, cols: usize) -> Raster {
    let data: Vec<f64> = (0..rows * cols)
        .map(|i| {
            let (r, c) = (i / cols, i % cols);
            ((r * 31 + c * 17) % 23) as f64 - 5.0
        })
        .collect();
    Raster::from_vec(data, 1, rows, cols).unwrap()
}

fn assert_same_result(raster: &Raster) {
    let whole = raster
        .eval_with(&RasterConfig::with_tile_shape(1024, 1024))
        .unwrap()
        .to_ndarray::<f64>()
        .unwrap();
    let tiled = raster
        .eval_with(&RasterConfig::with_tile_shape(4, 5))
        .unwrap()
        .to_ndarray::<f64>()
        .unwrap();
    assert_eq!(whole.dim(), tiled.dim());
    for (a, b) in whole.iter().zip(tiled.iter()) {
        assert!(
            (a == b) || (a.is_nan() && b.is_nan()),
            "tiled evaluation diverged: {} vs {}",
            a,
            b
        );
    }
}

#[test]
fn test_tiling_invariance_elementwise() {
    let r = checkerboard(17, 13);
    let expr = (&r * 2.0 + 1.0).subtract(&r).unwrap();
    assert_same_result(&expr);
}

#[test]
fn test_tiling_invariance_convolve() {
    // The 3x3 kernel needs halos across every internal tile boundary.
    let r = checkerboard(16, 16);
    let kernel = arr2(&[[1.0, 2.0, 1.0], [2.0, 4.0, 2.0], [1.0, 2.0, 1.0]]);
    let expr = r.convolve2d(kernel, 0.0).unwrap();
    assert_same_result(&expr);
}

#[test]
fn test_tiling_invariance_morphology() {
    let r = checkerboard(15, 11);
    let expr = general::dilate(&r, (3, 3)).unwrap();
    assert_same_result(&expr);
}

#[test]
fn test_tiling_invariance_aggregate() {
    let r = checkerboard(18, 12);
    let expr = general::aggregate(&r, (3, 2), StatKind::Mean).unwrap();
    assert_same_result(&expr);
}

#[test]
fn test_eval_window_matches_full_slice() {
    let r = checkerboard(10, 10);
    let full = eval_window(&r, Window::full(10, 10)).unwrap();
    let sub = eval_window(&r, Window::new(2, 6, 3, 9)).unwrap();
    let full_vals = full.typed::<f64>().unwrap();
    let sub_vals = sub.typed::<f64>().unwrap();
    for (i, row) in (2..6).enumerate() {
        for (j, col) in (3..9).enumerate() {
            assert_eq!(sub_vals[i * 6 + j], full_vals[row * 10 + col]);
        }
    }
}

#[test]
fn test_thread_config_is_honored() {
    let r = checkerboard(32, 32);
    let mut config = RasterConfig::with_tile_shape(8, 8);
    config.threads = Some(2);
    let out = (&r + 1.0).eval_with(&config).unwrap();
    let expected = (&r + 1.0).eval().unwrap();
    assert_eq!(
        out.to_ndarray::<f64>().unwrap(),
        expected.to_ndarray::<f64>().unwrap()
    );
}

#[test]
fn test_masked_tiling_invariance() {
    let r = checkerboard(12, 12).set_null_value(Some(-5.0)).unwrap();
    let expr = &r + 100.0;
    let whole = expr
        .eval_with(&RasterConfig::with_tile_shape(1024, 1024))
        .unwrap();
    let tiled = expr.eval_with(&RasterConfig::with_tile_shape(4, 4)).unwrap();
    assert_eq!(whole.eval_mask().unwrap(), tiled.eval_mask().unwrap());
    let a = whole.to_ndarray::<f64>().unwrap();
    let b = tiled.to_ndarray::<f64>().unwrap();
    for (x, y) in a.iter().zip(b.iter()) {
        assert!((x == y) || (x.is_nan() && y.is_nan()));
    }
}
