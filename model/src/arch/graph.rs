use super::{LayerSpec, ParameterTensor, TensorShape};

/// One validated layer of a `Model` with its resolved shapes and owned parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub(crate) name: String,
    pub(crate) spec: LayerSpec,
    pub(crate) input: TensorShape,
    pub(crate) output: TensorShape,
    pub(crate) params: Vec<ParameterTensor>,
}

impl GraphNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &LayerSpec {
        &self.spec
    }

    pub fn input(&self) -> &TensorShape {
        &self.input
    }

    pub fn output(&self) -> &TensorShape {
        &self.output
    }

    pub fn params(&self) -> &[ParameterTensor] {
        &self.params
    }
}

/// An ordered, shape checked chain of layers together with their parameter tensors.
///
/// Only `GraphBuilder` creates models, so `nodes[i].output == nodes[i + 1].input`
/// always holds and there is at least one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub(crate) input: TensorShape,
    pub(crate) nodes: Vec<GraphNode>,
}

impl Model {
    /// The shape of the sample the model consumes.
    pub fn input(&self) -> &TensorShape {
        &self.input
    }

    /// The shape of what the model produces for one sample.
    pub fn output(&self) -> &TensorShape {
        // A model always has at least one node.
        self.nodes.last().map(|node| &node.output).unwrap_or(&self.input)
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// The parameter tensors of the `layer`-th node, if it exists.
    pub fn params_of(&self, layer: usize) -> Option<&[ParameterTensor]> {
        self.nodes.get(layer).map(GraphNode::params)
    }

    /// The amount of parameter tensors.
    pub fn num_params(&self) -> usize {
        self.nodes.iter().map(|node| node.params.len()).sum()
    }

    /// The amount of scalar parameters.
    pub fn num_weights(&self) -> usize {
        self.nodes
            .iter()
            .flat_map(|node| &node.params)
            .map(ParameterTensor::numel)
            .sum()
    }
}
