use log::{debug, info};
use model::{
    arch::GraphBuilder,
    compiler::{Artifact, ArtifactCompiler},
    ops::CpuOps,
};
use ndarray::{ArrayD, IxDyn};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;

use crate::Result;

/// Builds the model described by `builder` and traces it with a normally distributed sample.
///
/// # Arguments
/// * `builder` - The model to compile.
/// * `seed` - Seeds the tracing sample, entropy if `None`.
///
/// # Returns
/// The compiled artifact or a `Compile` error.
pub fn compile_artifact(builder: &GraphBuilder, seed: Option<u64>) -> Result<Artifact> {
    let model = builder.build()?;
    info!(
        "built model: {} layers, {} tensors, {} weights",
        model.nodes().len(),
        model.num_params(),
        model.num_weights()
    );

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let sample = ArrayD::from_shape_simple_fn(IxDyn(model.input().dims()), || {
        rng.sample::<f32, _>(StandardNormal)
    });
    debug!("tracing with a sample of shape {}", model.input());

    let artifact = ArtifactCompiler::new(CpuOps).compile(model, sample)?;

    for tensor in artifact.tensors() {
        info!("{}: {}", tensor.name(), tensor.shape());
    }

    Ok(artifact)
}
