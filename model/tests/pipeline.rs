use comms::{ArtifactFrame, FORMAT_VERSION};
use ndarray::{ArrayD, IxDyn};

use model::{
    MlErr,
    arch::{GraphBuilder, LayerSpec, TensorShape},
    compiler::{Artifact, ArtifactCompiler, serialize},
    initialization::InitSpec,
    ops::CpuOps,
};

fn compile(builder: GraphBuilder) -> Result<Artifact, MlErr> {
    let model = builder.build()?;
    let sample = ArrayD::zeros(IxDyn(model.input().dims()));
    ArtifactCompiler::new(CpuOps).compile(model, sample)
}

#[test]
fn classifier_end_to_end() -> Result<(), MlErr> {
    let artifact = compile(GraphBuilder::classifier().seed(2024))?;
    let bytes = serialize(&artifact)?;

    assert_eq!(ArtifactFrame::declared_len(&bytes)?, bytes.len());

    let decoded = Artifact::from_bytes(&bytes)?;
    assert_eq!(decoded.version(), FORMAT_VERSION);
    assert_eq!(decoded.version(), 1);
    assert_eq!(decoded.ops().len(), 6);
    assert_eq!(decoded.tensors().len(), 8);
    assert_eq!(decoded.input(), &TensorShape::from([1, 28, 28]));
    assert_eq!(decoded.output(), &TensorShape::from([10]));

    let shapes: Vec<_> = decoded
        .tensors()
        .iter()
        .map(|t| (t.name().to_string(), t.shape()))
        .collect();
    assert_eq!(shapes[0], ("conv0.weight".into(), TensorShape::from([6, 1, 5, 5])));
    assert_eq!(shapes[7], ("linear2.bias".into(), TensorShape::from([10])));

    Ok(())
}

#[test]
fn same_seed_same_bytes() -> Result<(), MlErr> {
    let a = serialize(&compile(GraphBuilder::classifier().seed(7))?)?;
    let b = serialize(&compile(GraphBuilder::classifier().seed(7))?)?;
    let c = serialize(&compile(GraphBuilder::classifier().seed(8))?)?;

    assert_eq!(a, b);
    assert_eq!(a.len(), c.len());
    assert_ne!(a, c);
    Ok(())
}

#[test]
fn decoded_artifact_computes_the_same_output() -> Result<(), MlErr> {
    let artifact = compile(GraphBuilder::lenet().init(InitSpec::Kaiming).seed(3))?;
    let decoded = Artifact::from_bytes(&serialize(&artifact)?)?;

    let x = ArrayD::from_shape_fn(IxDyn(&[1, 28, 28]), |idx| (idx[1] * 28 + idx[2]) as f32 / 784.);
    let expected = artifact.forward(&CpuOps, x.clone())?;
    let got = decoded.forward(&CpuOps, x)?;

    assert_eq!(got, expected);
    Ok(())
}

#[test]
fn wrong_feature_count_fails_build() {
    let builder = GraphBuilder::new([1, 28, 28]).layers([
        LayerSpec::conv2d(1, 6, 5, 1, 2),
        LayerSpec::max_pool2d(2, 2),
        LayerSpec::Flatten,
        LayerSpec::linear(400, 10),
    ]);

    assert!(matches!(
        compile(builder),
        Err(MlErr::ShapeMismatch {
            layer: 3,
            got: 1176,
            expected: 400,
            ..
        })
    ));
}

#[test]
fn wrong_sample_fails_compile() -> Result<(), MlErr> {
    let model = GraphBuilder::classifier().seed(1).build()?;
    let err = ArtifactCompiler::new(CpuOps)
        .compile(model, ArrayD::zeros(IxDyn(&[3, 28, 28])))
        .unwrap_err();

    assert!(matches!(err, MlErr::ShapeMismatch { layer: 0, .. }));
    Ok(())
}

#[test]
fn empty_model_fails_fast() {
    assert!(matches!(
        compile(GraphBuilder::new([1, 28, 28])),
        Err(MlErr::EmptyModel)
    ));
}
