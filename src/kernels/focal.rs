//! Windowed (focal) convolution kernel.
//!
//! The executor hands this kernel a halo-padded window in which
//! out-of-raster and null cells have already been replaced with the fill
//! value; the kernel is a plain sliding dot product over that buffer.

use ndarray::ArrayView2;

/// The halo a kernel of `k` taps needs before/after the output window.
/// Odd sizes split evenly; even sizes put the extra tap before, matching
/// a center-anchored rolling window.
pub fn halo_for(k: usize) -> (usize, usize) {
    (k / 2, k - 1 - k / 2)
}

/// Sliding dot product of `kernel` over `padded`.
///
/// `padded` must have shape `(out_rows + kr - 1, out_cols + kc - 1)` where
/// `(kr, kc)` is the kernel shape; output cell `(r, c)` is aligned with
/// padded cell `(r + kr/2, c + kc/2)`.
pub fn convolve2d(
    padded: ArrayView2<f64>,
    kernel: ArrayView2<f64>,
    out_rows: usize,
    out_cols: usize,
) -> Vec<f64> {
    let (kr, kc) = kernel.dim();
    debug_assert_eq!(padded.dim(), (out_rows + kr - 1, out_cols + kc - 1));

    let mut out = Vec::with_capacity(out_rows * out_cols);
    for r in 0..out_rows {
        for c in 0..out_cols {
            let mut acc = 0.0;
            for i in 0..kr {
                for j in 0..kc {
                    acc += kernel[[i, j]] * padded[[r + i, c + j]];
                }
            }
            out.push(acc);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_halo_split() {
        assert_eq!(halo_for(3), (1, 1));
        assert_eq!(halo_for(5), (2, 2));
        assert_eq!(halo_for(2), (1, 0));
        assert_eq!(halo_for(1), (0, 0));
    }

    #[test]
    fn test_identity_kernel() {
        let padded = arr2(&[
            [0.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 2.0, 0.0],
            [0.0, 3.0, 4.0, 0.0],
            [0.0, 0.0, 0.0, 0.0],
        ]);
        let kernel = arr2(&[[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]]);
        let out = convolve2d(padded.view(), kernel.view(), 2, 2);
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_box_sum_kernel() {
        // 3x3 ones over a constant field of 2.0: interior sees 9 cells, the
        // padded border contributes zeros at the corners/edges.
        let padded = arr2(&[
            [0.0, 0.0, 0.0],
            [0.0, 2.0, 0.0],
            [0.0, 0.0, 0.0],
        ]);
        let kernel = arr2(&[[1.0; 3]; 3]);
        let out = convolve2d(padded.view(), kernel.view(), 1, 1);
        assert_eq!(out, vec![2.0]);
    }

    #[test]
    fn test_asymmetric_kernel_orientation() {
        // Kernel weighted on its left column picks up the left neighbor.
        let padded = arr2(&[[10.0, 1.0, 2.0, 20.0]]);
        let kernel = arr2(&[[1.0, 0.0, 0.0]]);
        let out = convolve2d(padded.view(), kernel.view(), 1, 2);
        assert_eq!(out, vec![10.0, 1.0]);
    }
}
