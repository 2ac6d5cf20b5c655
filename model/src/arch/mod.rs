mod act_fn;
mod builder;
mod graph;
mod layer;
mod shape;
mod tensor;

pub use act_fn::ActFn;
pub use builder::{GraphBuilder, ModelSpec};
pub use graph::{GraphNode, Model};
pub use layer::LayerSpec;
pub use shape::TensorShape;
pub use tensor::ParameterTensor;
