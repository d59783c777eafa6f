//! Tests for the public `Raster` surface: arithmetic, comparison, dtype
//! handling, null propagation and lazy-evaluation semantics.

use ndarray::{arr2, Array3};

use crate::raster::Raster;
use crate::types::RasterDataType;

fn r1() -> Raster {
    Raster::from_vec(vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0], 1, 2, 3).unwrap()
}

fn r2() -> Raster {
    Raster::from_vec(vec![10.0f64, 20.0, 30.0, 40.0, 50.0, 60.0], 1, 2, 3).unwrap()
}

fn values(raster: &Raster) -> Vec<f64> {
    raster
        .to_ndarray::<f64>()
        .unwrap()
        .into_iter()
        .collect()
}

#[test]
fn test_add() {
    // Raster + raster, both orders.
    let truth = vec![11.0, 22.0, 33.0, 44.0, 55.0, 66.0];
    assert_eq!(values(&r1().add(&r2()).unwrap()), truth);
    assert_eq!(values(&r2().add(&r1()).unwrap()), truth);
    assert_eq!(values(&(&r1() + &r2())), truth);
    // Raster + scalar, both orders.
    for v in [-23.0, 0.0, 1.0, 2.0, 321.4] {
        let truth: Vec<f64> = values(&r1()).iter().map(|x| x + v).collect();
        assert_eq!(values(&r1().add(v).unwrap()), truth);
        assert_eq!(values(&(&r1() + v)), truth);
        assert_eq!(values(&(v + &r1())), truth);
    }
}

#[test]
fn test_subtract() {
    let truth = vec![-9.0, -18.0, -27.0, -36.0, -45.0, -54.0];
    assert_eq!(values(&r1().subtract(&r2()).unwrap()), truth);
    let neg_truth: Vec<f64> = truth.iter().map(|v| -v).collect();
    assert_eq!(values(&r2().subtract(&r1()).unwrap()), neg_truth);
    // Scalar on the left negates the usual order.
    let truth: Vec<f64> = values(&r1()).iter().map(|x| 42.0 - x).collect();
    assert_eq!(values(&(42.0 - &r1())), truth);
}

#[test]
fn test_multiply_and_divide() {
    let truth: Vec<f64> = values(&r1()).iter().map(|x| x * 3.0).collect();
    assert_eq!(values(&(&r1() * 3.0)), truth);

    let truth: Vec<f64> = values(&r1())
        .iter()
        .zip(values(&r2()))
        .map(|(a, b)| a / b)
        .collect();
    assert_eq!(values(&r1().divide(&r2()).unwrap()), truth);

    let truth: Vec<f64> = values(&r1()).iter().map(|x| 2.0 / x).collect();
    assert_eq!(values(&(2.0 / &r1())), truth);
}

#[test]
fn test_divide_promotes_ints_to_float() {
    let a = Raster::from_vec(vec![1u8, 2, 3, 4], 1, 2, 2).unwrap();
    let b = Raster::from_vec(vec![2u8, 2, 2, 8], 1, 2, 2).unwrap();
    let q = a.divide(&b).unwrap();
    assert_eq!(q.dtype(), RasterDataType::Float64);
    assert_eq!(values(&q), vec![0.5, 1.0, 1.5, 0.5]);
}

#[test]
fn test_modulo_is_floored() {
    let a = Raster::from_vec(vec![-7i32, 7, -7, 7], 1, 2, 2).unwrap();
    let m = a.modulo(3i32).unwrap();
    // NumPy: the result takes the divisor's sign.
    assert_eq!(values(&m), vec![2.0, 1.0, 2.0, 1.0]);
    let m = a.modulo(-3i32).unwrap();
    assert_eq!(values(&m), vec![-1.0, -2.0, -1.0, -2.0]);
}

#[test]
fn test_pow() {
    let a = Raster::from_vec(vec![1.0f64, 2.0, 3.0, 4.0], 1, 2, 2).unwrap();
    assert_eq!(values(&a.pow(2.0).unwrap()), vec![1.0, 4.0, 9.0, 16.0]);
    let b = Raster::from_vec(vec![2i64, 3, 4, 5], 1, 2, 2).unwrap();
    let p = b.pow(2i64).unwrap();
    assert_eq!(p.dtype(), RasterDataType::Int64);
    assert_eq!(values(&p), vec![4.0, 9.0, 16.0, 25.0]);
}

#[test]
fn test_negate() {
    assert_eq!(values(&-&r1()), vec![-1.0, -2.0, -3.0, -4.0, -5.0, -6.0]);
    assert_eq!(values(&r1().negate().negate()), values(&r1()));
}

#[test]
fn test_weak_scalar_keeps_int_dtype() {
    let a = Raster::from_vec(vec![1u8, 2, 3, 4], 1, 2, 2).unwrap();
    let out = a.add(1i64).unwrap();
    assert_eq!(out.dtype(), RasterDataType::UInt8);
    let out = a.add(1.5f64).unwrap();
    assert_eq!(out.dtype(), RasterDataType::Float64);
}

#[test]
fn test_comparisons() {
    let a = Raster::from_vec(vec![1i32, 5, 3, 3], 1, 2, 2).unwrap();
    let b = Raster::from_vec(vec![3i32, 3, 3, 1], 1, 2, 2).unwrap();
    let cases: Vec<(Raster, Vec<f64>)> = vec![
        (a.eq(&b).unwrap(), vec![0.0, 0.0, 1.0, 0.0]),
        (a.ne(&b).unwrap(), vec![1.0, 1.0, 0.0, 1.0]),
        (a.lt(&b).unwrap(), vec![1.0, 0.0, 0.0, 0.0]),
        (a.le(&b).unwrap(), vec![1.0, 0.0, 1.0, 0.0]),
        (a.gt(&b).unwrap(), vec![0.0, 1.0, 0.0, 1.0]),
        (a.ge(&b).unwrap(), vec![0.0, 1.0, 1.0, 1.0]),
    ];
    for (result, truth) in cases {
        assert_eq!(result.dtype(), RasterDataType::Boolean);
        assert_eq!(values(&result), truth);
    }
    // Against a scalar.
    assert_eq!(values(&a.gt(2i64).unwrap()), vec![0.0, 1.0, 1.0, 1.0]);
}

#[test]
fn test_astype() {
    let r = r1();
    for dtype in [
        RasterDataType::UInt8,
        RasterDataType::Int32,
        RasterDataType::Float32,
        RasterDataType::Float64,
    ] {
        assert_eq!(r.astype(dtype).dtype(), dtype);
        assert_eq!(r.astype(dtype).eval().unwrap().dtype(), dtype);
    }
    let i = r.astype(RasterDataType::Int32);
    assert_eq!(values(&i), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
}

#[test]
fn test_astype_parse_spellings() {
    let r = r1();
    let dtype = RasterDataType::parse("UINT16").unwrap();
    assert_eq!(r.astype(dtype).dtype(), RasterDataType::UInt16);
    assert!(RasterDataType::parse("not float32").is_err());
}

#[test]
fn test_lazy_then_eval() {
    let mut expr = r1();
    expr = expr + 2.0;
    expr = expr.subtract(&r1()).unwrap();
    expr = expr * -1.0;
    assert!(!expr.is_materialized());

    let result = expr.eval().unwrap();
    // A new, materialized raster comes back; the expression stays lazy.
    assert!(result.is_materialized());
    assert!(!expr.is_materialized());
    let truth: Vec<f64> = values(&r1()).iter().map(|x| -(x + 2.0 - x)).collect();
    assert_eq!(values(&result), truth);
}

#[test]
fn test_plan_json_names_operations() {
    let expr = (&r1() + 1.0).multiply(&r2()).unwrap();
    let json = expr.plan_json().to_string();
    assert!(json.contains("binary"));
    assert!(json.contains("source:mem"));
}

#[test]
fn test_null_propagation_through_arithmetic() {
    let a = Raster::from_vec(vec![1i32, -9999, 3, 4], 1, 2, 2)
        .unwrap()
        .set_null_value(Some(-9999.0))
        .unwrap();
    let out = a.add(10i64).unwrap().eval().unwrap();
    assert!(out.is_masked());
    assert_eq!(out.eval_mask().unwrap().unwrap(), vec![0, 1, 0, 0]);
    let arr = out.to_ndarray::<i32>().unwrap();
    // Valid cells computed, the null cell holds the sentinel.
    assert_eq!(arr[[0, 0, 0]], 11);
    assert_eq!(arr[[0, 0, 1]], i32::MIN);
    assert_eq!(arr[[0, 1, 0]], 13);
}

#[test]
fn test_mask_union_of_two_rasters() {
    let a = Raster::from_vec(vec![0i32, 1, 2, 3], 1, 2, 2)
        .unwrap()
        .set_null_value(Some(0.0))
        .unwrap();
    let b = Raster::from_vec(vec![9i32, 9, 9, 0], 1, 2, 2)
        .unwrap()
        .set_null_value(Some(0.0))
        .unwrap();
    let out = a.add(&b).unwrap();
    assert_eq!(out.eval_mask().unwrap().unwrap(), vec![1, 0, 0, 1]);
}

#[test]
fn test_replace_null() {
    let a = Raster::from_vec(vec![1.0f64, f64::NAN, 3.0, f64::NAN], 1, 2, 2)
        .unwrap()
        .set_null_value(Some(f64::NAN))
        .unwrap();
    let filled = a.replace_null(0.0);
    assert!(!filled.is_masked());
    assert_eq!(values(&filled), vec![1.0, 0.0, 3.0, 0.0]);
}

#[test]
fn test_set_null_value_on_lazy_raster() {
    let expr = &r1() * 2.0; // lazy
    let masked = expr.set_null_value(Some(4.0)).unwrap();
    assert_eq!(masked.eval_mask().unwrap().unwrap(), vec![0, 1, 0, 0, 0, 0]);
}

#[test]
fn test_remap_range() {
    let r = Raster::from_vec(vec![0.0f64, 1.0, 2.0, 3.0, 4.0, 5.0], 1, 2, 3).unwrap();
    // Remap the low slice [1, 3) to 0, leave everything else alone.
    let out = r.remap_range(&[(1.0, 3.0, 0.0)]).unwrap();
    assert_eq!(values(&out), vec![0.0, 0.0, 0.0, 3.0, 4.0, 5.0]);
}

#[test]
fn test_remap_range_validation() {
    let r = r1();
    assert!(r.remap_range(&[]).is_err());
    assert!(r.remap_range(&[(3.0, 1.0, 0.0)]).is_err());
    assert!(r.remap_range(&[(f64::NAN, 1.0, 0.0)]).is_err());
}

#[test]
fn test_remap_range_float_mapping_promotes() {
    let r = Raster::from_vec(vec![1i32, 2, 3, 4], 1, 2, 2).unwrap();
    let out = r.remap_range(&[(1.0, 2.0, 0.5)]).unwrap();
    assert_eq!(out.dtype(), RasterDataType::Float64);
    assert_eq!(values(&out), vec![0.5, 2.0, 3.0, 4.0]);
}

#[test]
fn test_convolve2d_identity_and_sum() {
    let r = Raster::from_vec(vec![1.0f64, 2.0, 3.0, 4.0], 1, 2, 2).unwrap();
    let identity = arr2(&[[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]]);
    assert_eq!(
        values(&r.convolve2d(identity, 0.0).unwrap()),
        vec![1.0, 2.0, 3.0, 4.0]
    );
    // A 3x3 box sum with zero fill: every cell sees the whole 2x2 raster.
    let box3 = arr2(&[[1.0; 3]; 3]);
    assert_eq!(
        values(&r.convolve2d(box3, 0.0).unwrap()),
        vec![10.0, 10.0, 10.0, 10.0]
    );
}

#[test]
fn test_convolve2d_fill_value() {
    let r = Raster::from_vec(vec![1.0f64], 1, 1, 1).unwrap();
    let box3 = arr2(&[[1.0; 3]; 3]);
    // Eight out-of-raster cells contribute the fill.
    assert_eq!(values(&r.convolve2d(box3, 2.0).unwrap()), vec![17.0]);
}

#[test]
fn test_get_bands() {
    let data = Array3::from_shape_vec(
        (3, 1, 2),
        vec![1.0f64, 2.0, 10.0, 20.0, 100.0, 200.0],
    )
    .unwrap();
    let r = Raster::from_ndarray(&data).unwrap();
    let one = r.get_bands(&[1]).unwrap();
    assert_eq!(one.shape(), (1, 1, 2));
    assert_eq!(values(&one), vec![10.0, 20.0]);
    let swapped = r.get_bands(&[2, 0]).unwrap();
    assert_eq!(values(&swapped), vec![100.0, 200.0, 1.0, 2.0]);
    assert!(r.get_bands(&[3]).is_err());
}

#[test]
fn test_shape_mismatch_is_rejected() {
    let a = Raster::from_vec(vec![1.0f64, 2.0], 1, 1, 2).unwrap();
    let b = Raster::from_vec(vec![1.0f64, 2.0, 3.0], 1, 1, 3).unwrap();
    assert!(a.add(&b).is_err());
}

#[test]
fn test_bool_arithmetic_computes_in_bytes() {
    let a = Raster::from_vec(vec![0i32, 1, 2, 0], 1, 2, 2).unwrap();
    let mask_raster = a.gt(0i64).unwrap();
    let summed = mask_raster.add(&mask_raster).unwrap();
    assert_eq!(summed.dtype(), RasterDataType::UInt8);
    assert_eq!(values(&summed), vec![0.0, 2.0, 2.0, 0.0]);
}
