mod cpu;

use ndarray::{Array1, Array3, ArrayD, ArrayView1, ArrayView2, ArrayView3, ArrayView4, ArrayViewD};

pub use cpu::CpuOps;

/// The elementary tensor operations a graph needs to run a forward pass.
///
/// Implementations may assume the operands are shape compatible, the graph
/// validates shapes before calling into them.
pub trait TensorOps {
    /// 2D cross correlation of a `[c_in, h, w]` input with `[c_out, c_in, k, k]` weights.
    fn conv2d(
        &self,
        x: ArrayView3<f32>,
        weight: ArrayView4<f32>,
        bias: ArrayView1<f32>,
        stride: usize,
        padding: usize,
    ) -> Array3<f32>;

    /// Max over `kernel_size` square windows of every channel, no padding.
    fn max_pool2d(&self, x: ArrayView3<f32>, kernel_size: usize, stride: usize) -> Array3<f32>;

    /// Row major flattening into a single dimension.
    fn flatten(&self, x: ArrayViewD<f32>) -> Array1<f32>;

    /// `weight · x + bias` with `weight` shaped `[out, in]`.
    fn linear(&self, x: ArrayView1<f32>, weight: ArrayView2<f32>, bias: ArrayView1<f32>) -> Array1<f32>;

    fn relu(&self, x: ArrayD<f32>) -> ArrayD<f32>;

    /// Log of the softmax along the last axis.
    fn log_softmax(&self, x: ArrayD<f32>) -> ArrayD<f32>;
}
