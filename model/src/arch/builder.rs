use std::{cell::RefCell, collections::HashMap, rc::Rc};

use log::debug;
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use super::{ActFn, GraphNode, LayerSpec, Model, ParameterTensor, TensorShape};
use crate::{
    MlErr, Result,
    initialization::{ChainedParamGen, InitSpec, ParamGen},
};

/// The serializable description of a model, as read from a `MODEL_SPEC` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub input: TensorShape,
    pub layers: Vec<LayerSpec>,
    #[serde(default)]
    pub init: InitSpec,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Builds a validated `Model` out of a chain of layer specs.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    input: TensorShape,
    layers: Vec<LayerSpec>,
    init: InitSpec,
    seed: Option<u64>,
}

impl GraphBuilder {
    /// Creates a new `GraphBuilder`.
    ///
    /// # Arguments
    /// * `input` - The shape of a single sample, without a batch dimension.
    pub fn new(input: impl Into<TensorShape>) -> Self {
        Self {
            input: input.into(),
            layers: Vec::new(),
            init: InitSpec::default(),
            seed: None,
        }
    }

    pub fn from_spec(spec: ModelSpec) -> Self {
        Self {
            input: spec.input,
            layers: spec.layers,
            init: spec.init,
            seed: spec.seed,
        }
    }

    /// The default classifier served when no model spec is given.
    pub fn classifier() -> Self {
        Self::new([1, 28, 28]).layers([
            LayerSpec::conv2d(1, 6, 5, 1, 2).with_act(ActFn::Relu),
            LayerSpec::max_pool2d(2, 2),
            LayerSpec::Flatten,
            LayerSpec::linear(1176, 120).with_act(ActFn::Relu),
            LayerSpec::linear(120, 84).with_act(ActFn::Relu),
            LayerSpec::linear(84, 10).with_act(ActFn::LogSoftmax),
        ])
    }

    /// A LeNet-5 with every activation as its own layer.
    pub fn lenet() -> Self {
        Self::new([1, 28, 28]).layers([
            LayerSpec::conv2d(1, 6, 5, 1, 2),
            LayerSpec::max_pool2d(2, 2),
            LayerSpec::Relu,
            LayerSpec::conv2d(6, 16, 5, 1, 0),
            LayerSpec::max_pool2d(2, 2),
            LayerSpec::Relu,
            LayerSpec::Flatten,
            LayerSpec::linear(400, 120),
            LayerSpec::Relu,
            LayerSpec::linear(120, 84),
            LayerSpec::Relu,
            LayerSpec::linear(84, 10),
            LayerSpec::LogSoftmax,
        ])
    }

    pub fn layer(mut self, layer: LayerSpec) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn layers(mut self, layers: impl IntoIterator<Item = LayerSpec>) -> Self {
        self.layers.extend(layers);
        self
    }

    pub fn init(mut self, init: InitSpec) -> Self {
        self.init = init;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the whole chain and initializes every parameter tensor.
    ///
    /// # Returns
    /// The built model, or the first error found walking the layers in order.
    pub fn build(&self) -> Result<Model> {
        if self.layers.is_empty() {
            return Err(MlErr::EmptyModel);
        }
        let input_len = self.input.checked_numel();
        if self.input.rank() == 0 || input_len == Some(0) {
            return Err(MlErr::InvalidInput("the input shape must be non empty"));
        }
        if input_len.is_none() {
            return Err(MlErr::InvalidInput("the input shape is too large"));
        }

        let shapes = self.propagate()?;
        let mut param_gen = self.param_gen()?;
        let mut counters: HashMap<&str, usize> = HashMap::new();
        let mut nodes = Vec::with_capacity(self.layers.len());

        for (i, (spec, (input, output))) in self.layers.iter().zip(shapes).enumerate() {
            let prefix = spec.name_prefix();
            let counter = counters.entry(prefix).or_default();
            let name = format!("{prefix}{counter}");
            *counter += 1;

            let params = spec
                .param_shapes()
                .into_iter()
                .map(|(kind, shape)| {
                    let tensor = format!("{name}.{kind}");

                    match param_gen.fill(param_len(i, &shape)?) {
                        Some(values) => ParameterTensor::new(tensor, &shape, values),
                        None => Err(MlErr::ParamGenExhausted { tensor }),
                    }
                })
                .collect::<Result<Vec<_>>>()?;

            debug!("built {name}: {input} -> {output}");
            nodes.push(GraphNode {
                name,
                spec: *spec,
                input,
                output,
                params,
            });
        }

        Ok(Model {
            input: self.input.clone(),
            nodes,
        })
    }

    /// Computes every layer's input and output shape in closed form.
    fn propagate(&self) -> Result<Vec<(TensorShape, TensorShape)>> {
        let mut shape = self.input.clone();
        let mut shapes = Vec::with_capacity(self.layers.len());

        for (i, spec) in self.layers.iter().enumerate() {
            spec.validate(i)?;
            let output = spec.output_shape(i, &shape)?;

            match output.checked_numel() {
                Some(0) => {
                    return Err(MlErr::InvalidLayer {
                        layer: i,
                        reason: "the layer produces an empty tensor",
                    });
                }
                None => {
                    return Err(MlErr::InvalidLayer {
                        layer: i,
                        reason: "the layer produces a tensor too large to allocate",
                    });
                }
                Some(_) => {}
            }

            shapes.push((shape, output.clone()));
            shape = output;
        }

        Ok(shapes)
    }

    /// Chains one generator per parameter tensor, in graph order.
    fn param_gen(&self) -> Result<ChainedParamGen> {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let rng = Rc::new(RefCell::new(rng));

        let mut param_gens: Vec<Box<dyn ParamGen>> = Vec::new();
        for (i, spec) in self.layers.iter().enumerate() {
            let fan_in = spec.fan_in();

            for (_, shape) in spec.param_shapes() {
                let len = param_len(i, &shape)?;
                param_gens.push(self.init.param_gen(rng.clone(), len, fan_in)?);
            }
        }

        Ok(ChainedParamGen::new(param_gens))
    }
}

fn param_len(layer: usize, shape: &TensorShape) -> Result<usize> {
    shape.checked_numel().ok_or(MlErr::InvalidLayer {
        layer,
        reason: "the parameter tensors are too large to allocate",
    })
}
