use ndarray::{
    Array1, Array3, ArrayD, ArrayView1, ArrayView2, ArrayView3, ArrayView4, ArrayViewD, Axis,
};

use super::TensorOps;

/// Single threaded reference implementation of `TensorOps`.
///
/// Direct loops, no im2col nor blocking, it only has to trace one sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuOps;

impl TensorOps for CpuOps {
    fn conv2d(
        &self,
        x: ArrayView3<f32>,
        weight: ArrayView4<f32>,
        bias: ArrayView1<f32>,
        stride: usize,
        padding: usize,
    ) -> Array3<f32> {
        let (c_in, h, w) = x.dim();
        let (c_out, _, k, _) = weight.dim();
        let oh = (h + 2 * padding - k) / stride + 1;
        let ow = (w + 2 * padding - k) / stride + 1;

        let mut out = Array3::zeros((c_out, oh, ow));

        for ((o, i, j), y) in out.indexed_iter_mut() {
            let mut acc = bias[o];

            for c in 0..c_in {
                for ki in 0..k {
                    // Rows that fall into the zero padding contribute nothing.
                    let Some(row) = (i * stride + ki).checked_sub(padding).filter(|&r| r < h)
                    else {
                        continue;
                    };

                    for kj in 0..k {
                        let Some(col) = (j * stride + kj).checked_sub(padding).filter(|&col| col < w)
                        else {
                            continue;
                        };

                        acc += x[[c, row, col]] * weight[[o, c, ki, kj]];
                    }
                }
            }

            *y = acc;
        }

        out
    }

    fn max_pool2d(&self, x: ArrayView3<f32>, kernel_size: usize, stride: usize) -> Array3<f32> {
        let (channels, h, w) = x.dim();
        let oh = (h - kernel_size) / stride + 1;
        let ow = (w - kernel_size) / stride + 1;

        let mut out = Array3::zeros((channels, oh, ow));

        for ((c, i, j), y) in out.indexed_iter_mut() {
            let (top, left) = (i * stride, j * stride);
            let window = x.slice(ndarray::s![
                c,
                top..top + kernel_size,
                left..left + kernel_size
            ]);

            *y = window.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        }

        out
    }

    fn flatten(&self, x: ArrayViewD<f32>) -> Array1<f32> {
        x.iter().copied().collect()
    }

    fn linear(&self, x: ArrayView1<f32>, weight: ArrayView2<f32>, bias: ArrayView1<f32>) -> Array1<f32> {
        weight.dot(&x) + &bias
    }

    fn relu(&self, x: ArrayD<f32>) -> ArrayD<f32> {
        x.mapv_into(|v| v.max(0.))
    }

    fn log_softmax(&self, mut x: ArrayD<f32>) -> ArrayD<f32> {
        let Some(last) = x.ndim().checked_sub(1) else {
            // A lone scalar is its own whole distribution.
            return x.mapv_into(|_| 0.);
        };

        for mut lane in x.lanes_mut(Axis(last)) {
            let max = lane.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            let log_sum = lane.iter().map(|&v| (v - max).exp()).sum::<f32>().ln() + max;
            lane.mapv_inplace(|v| v - log_sum);
        }

        x
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array, Array2, Array4, arr1, arr2};

    use super::*;

    #[test]
    fn conv2d_identity_kernel_with_padding() {
        let x = Array::from_shape_vec((1, 3, 3), (1..=9).map(|v| v as f32).collect()).unwrap();
        let mut weight = Array4::<f32>::zeros((1, 1, 3, 3));
        weight[[0, 0, 1, 1]] = 1.;
        let bias = arr1(&[0.5]);

        let y = CpuOps.conv2d(x.view(), weight.view(), bias.view(), 1, 1);

        assert_eq!(y.dim(), (1, 3, 3));
        assert_eq!(y, x.mapv(|v| v + 0.5));
    }

    #[test]
    fn conv2d_sums_channels_and_strides() {
        let x = Array3::<f32>::ones((2, 4, 4));
        let weight = Array4::<f32>::ones((3, 2, 2, 2));
        let bias = arr1(&[0., 1., 2.]);

        let y = CpuOps.conv2d(x.view(), weight.view(), bias.view(), 2, 0);

        assert_eq!(y.dim(), (3, 2, 2));
        assert!(y.index_axis(Axis(0), 0).iter().all(|&v| v == 8.));
        assert!(y.index_axis(Axis(0), 2).iter().all(|&v| v == 10.));
    }

    #[test]
    fn max_pool2d_picks_window_max() {
        let x = Array::from_shape_vec((1, 4, 4), (0..16).map(|v| v as f32).collect()).unwrap();
        let y = CpuOps.max_pool2d(x.view(), 2, 2);

        assert_eq!(y.dim(), (1, 2, 2));
        assert_eq!(y.into_shape_with_order((2, 2)).unwrap(), arr2(&[[5., 7.], [13., 15.]]));
    }

    #[test]
    fn max_pool2d_floors_odd_sizes() {
        let x = Array3::<f32>::zeros((16, 10, 10));
        assert_eq!(CpuOps.max_pool2d(x.view(), 2, 2).dim(), (16, 5, 5));

        let x = Array3::<f32>::zeros((1, 5, 5));
        assert_eq!(CpuOps.max_pool2d(x.view(), 2, 2).dim(), (1, 2, 2));
    }

    #[test]
    fn flatten_is_row_major() {
        let x = Array::from_shape_vec((2, 2, 2), (0..8).map(|v| v as f32).collect()).unwrap();
        let y = CpuOps.flatten(x.view().into_dyn());
        assert_eq!(y.to_vec(), (0..8).map(|v| v as f32).collect::<Vec<_>>());
    }

    #[test]
    fn linear_is_affine() {
        let weight: Array2<f32> = arr2(&[[1., 2.], [3., 4.], [0., -1.]]);
        let y = CpuOps.linear(arr1(&[1., 1.]).view(), weight.view(), arr1(&[0., 1., 2.]).view());
        assert_eq!(y, arr1(&[3., 8., 1.]));
    }

    #[test]
    fn relu_clamps_negatives() {
        let y = CpuOps.relu(arr1(&[-1., 0., 2.]).into_dyn());
        assert_eq!(y, arr1(&[0., 0., 2.]).into_dyn());
    }

    #[test]
    fn log_softmax_normalizes() {
        let y = CpuOps.log_softmax(arr1(&[1., 2., 3., 1000.]).into_dyn());
        let total: f32 = y.iter().map(|v| v.exp()).sum();

        assert!((total - 1.).abs() < 1e-5);
        assert!(y.iter().all(|v| v.is_finite() && *v <= 0.));
    }
}
