mod artifact;

use log::debug;
use ndarray::ArrayD;

use crate::{
    Result,
    arch::{Model, ParameterTensor, TensorShape},
    ops::TensorOps,
};

pub use artifact::{Artifact, CompiledOp, serialize};

/// Freezes a built `Model` into a serializable `Artifact`.
///
/// Compiling runs one forward pass of a sample through the injected tensor
/// operations and checks every resolved shape against the statically
/// propagated one, a disagreement is always fatal.
pub struct ArtifactCompiler<O: TensorOps> {
    ops: O,
}

impl<O: TensorOps> ArtifactCompiler<O> {
    pub fn new(ops: O) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    /// Traces `model` with `sample` and moves its parameters into the artifact's tensor table.
    ///
    /// # Arguments
    /// * `model` - The built model, consumed.
    /// * `sample` - An input of exactly the model's input shape.
    ///
    /// # Returns
    /// The frozen artifact or a `ShapeMismatch` naming the first offending layer.
    pub fn compile(&self, model: Model, sample: ArrayD<f32>) -> Result<Artifact> {
        TensorShape::from(sample.shape()).ensure_eq(0, model.input(), "sample shape")?;

        let mut x = sample;
        for (i, node) in model.nodes().iter().enumerate() {
            let traced_in = TensorShape::from(x.shape());
            traced_in.ensure_eq(i, node.input(), "traced input")?;

            let params: Vec<_> = node.params().iter().collect();
            x = node.spec().forward(i, &self.ops, &params, x)?;

            let traced_out = TensorShape::from(x.shape());
            traced_out.ensure_eq(i, node.output(), "traced output")?;

            debug!("traced {}: {traced_in} -> {traced_out}", node.name());
        }

        let Model { input, nodes } = model;
        let mut tensors: Vec<ParameterTensor> = Vec::new();
        let mut ops = Vec::with_capacity(nodes.len());

        for node in nodes {
            let start = tensors.len();
            tensors.extend(node.params);

            ops.push(CompiledOp {
                name: node.name,
                spec: node.spec,
                input: node.input,
                output: node.output,
                params: (start..tensors.len()).collect(),
            });
        }

        Ok(Artifact::new(input, ops, tensors))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{
        Array1, Array3, ArrayD, ArrayView1, ArrayView2, ArrayView3, ArrayView4, ArrayViewD, IxDyn,
        s,
    };

    use super::*;
    use crate::{
        MlErr,
        arch::{ActFn, GraphBuilder, LayerSpec},
        initialization::InitSpec,
        ops::CpuOps,
    };

    /// `CpuOps` with a flatten that loses its last element.
    struct LossyFlatten;

    impl TensorOps for LossyFlatten {
        fn conv2d(
            &self,
            x: ArrayView3<f32>,
            weight: ArrayView4<f32>,
            bias: ArrayView1<f32>,
            stride: usize,
            padding: usize,
        ) -> Array3<f32> {
            CpuOps.conv2d(x, weight, bias, stride, padding)
        }

        fn max_pool2d(&self, x: ArrayView3<f32>, kernel_size: usize, stride: usize) -> Array3<f32> {
            CpuOps.max_pool2d(x, kernel_size, stride)
        }

        fn flatten(&self, x: ArrayViewD<f32>) -> Array1<f32> {
            let flat = CpuOps.flatten(x);
            let keep = flat.len().saturating_sub(1);
            flat.slice(s![..keep]).to_owned()
        }

        fn linear(&self, x: ArrayView1<f32>, weight: ArrayView2<f32>, bias: ArrayView1<f32>) -> Array1<f32> {
            CpuOps.linear(x, weight, bias)
        }

        fn relu(&self, x: ArrayD<f32>) -> ArrayD<f32> {
            CpuOps.relu(x)
        }

        fn log_softmax(&self, x: ArrayD<f32>) -> ArrayD<f32> {
            CpuOps.log_softmax(x)
        }
    }

    #[test]
    fn tensor_table_follows_graph_order() {
        let model = GraphBuilder::classifier().seed(5).build().unwrap();
        let compiler = ArtifactCompiler::new(CpuOps);
        let artifact = compiler
            .compile(model, ArrayD::zeros(IxDyn(&[1, 28, 28])))
            .unwrap();

        let names: Vec<_> = artifact.tensors().iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            [
                "conv0.weight",
                "conv0.bias",
                "linear0.weight",
                "linear0.bias",
                "linear1.weight",
                "linear1.bias",
                "linear2.weight",
                "linear2.bias",
            ]
        );

        let params: Vec<_> = artifact.ops().iter().map(|op| op.params().to_vec()).collect();
        assert_eq!(
            params,
            vec![vec![0, 1], vec![], vec![], vec![2, 3], vec![4, 5], vec![6, 7]]
        );
    }

    #[test]
    fn wrong_sample_shape() {
        let model = GraphBuilder::classifier().seed(5).build().unwrap();
        let compiler = ArtifactCompiler::new(CpuOps);
        let err = compiler
            .compile(model, ArrayD::zeros(IxDyn(&[1, 32, 32])))
            .unwrap_err();

        assert!(matches!(
            err,
            MlErr::ShapeMismatch {
                layer: 0,
                what: "sample shape",
                got: 32,
                expected: 28,
            }
        ));
    }

    #[test]
    fn traced_output_disagreeing_with_the_graph() {
        let model = GraphBuilder::classifier().seed(5).build().unwrap();
        let err = ArtifactCompiler::new(LossyFlatten)
            .compile(model, ArrayD::zeros(IxDyn(&[1, 28, 28])))
            .unwrap_err();

        assert!(matches!(
            err,
            MlErr::ShapeMismatch {
                layer: 2,
                what: "traced output",
                got: 1175,
                expected: 1176,
            }
        ));
    }

    #[test]
    fn traced_input_disagreeing_with_the_graph() {
        let mut model = GraphBuilder::classifier().seed(5).build().unwrap();
        model.nodes[3].input = TensorShape::from([1000]);

        let err = ArtifactCompiler::new(CpuOps)
            .compile(model, ArrayD::zeros(IxDyn(&[1, 28, 28])))
            .unwrap_err();

        assert!(matches!(
            err,
            MlErr::ShapeMismatch {
                layer: 3,
                what: "traced input",
                got: 1176,
                expected: 1000,
            }
        ));
    }

    #[test]
    fn compiled_forward_matches_hand_computation() {
        let model = GraphBuilder::new([2])
            .layer(LayerSpec::linear(2, 2).with_act(ActFn::Relu))
            .init(InitSpec::Const { value: 1. })
            .build()
            .unwrap();

        let artifact = ArtifactCompiler::new(CpuOps)
            .compile(model, ArrayD::zeros(IxDyn(&[2])))
            .unwrap();

        let x = ArrayD::from_shape_vec(IxDyn(&[2]), vec![1., -4.]).unwrap();
        let y = artifact.forward(&CpuOps, x).unwrap();

        // 1 - 4 + 1 = -2 on both units, clipped by the relu.
        assert_eq!(y.as_slice().unwrap(), &[0., 0.]);
    }
}
