use std::borrow::Cow;

use comms::{ArtifactFrame, Deserialize, FORMAT_VERSION, LayerRecord, Serialize, TensorRecord};
use ndarray::ArrayD;

use crate::{
    MlErr, Result,
    arch::{ActFn, LayerSpec, ParameterTensor, TensorShape},
    ops::TensorOps,
};

/// One frozen computation step, its parameters referenced by index into the tensor table.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledOp {
    pub(crate) name: String,
    pub(crate) spec: LayerSpec,
    pub(crate) input: TensorShape,
    pub(crate) output: TensorShape,
    pub(crate) params: Vec<usize>,
}

impl CompiledOp {
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

    pub fn params(&self) -> &[usize] {
        &self.params
    }
}

/// A fully static, serializable description of a traced model.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    version: u32,
    input: TensorShape,
    ops: Vec<CompiledOp>,
    tensors: Vec<ParameterTensor>,
}

impl Artifact {
    pub(crate) fn new(input: TensorShape, ops: Vec<CompiledOp>, tensors: Vec<ParameterTensor>) -> Self {
        Self {
            version: FORMAT_VERSION,
            input,
            ops,
            tensors,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn input(&self) -> &TensorShape {
        &self.input
    }

    pub fn output(&self) -> &TensorShape {
        self.ops.last().map(CompiledOp::output).unwrap_or(&self.input)
    }

    pub fn ops(&self) -> &[CompiledOp] {
        &self.ops
    }

    pub fn tensors(&self) -> &[ParameterTensor] {
        &self.tensors
    }

    /// The parameter tensors of the `layer`-th op, in `weight`, `bias` order.
    pub fn params_of(&self, layer: usize) -> Option<Vec<&ParameterTensor>> {
        let op = self.ops.get(layer)?;
        op.params.iter().map(|&idx| self.tensors.get(idx)).collect()
    }

    /// Borrows the artifact as a wire frame.
    pub fn to_frame(&self) -> ArtifactFrame<'_> {
        let layers = self
            .ops
            .iter()
            .map(|op| LayerRecord {
                name: Cow::Borrowed(op.name.as_str()),
                kind: op.spec.kind_tag(),
                act_fn: ActFn::tag(op.spec.act_fn()),
                attrs: op.spec.attrs(),
                input: op.input.dims().to_vec(),
                output: op.output.dims().to_vec(),
                params: op.params.clone(),
            })
            .collect();

        let tensors = self
            .tensors
            .iter()
            .map(|tensor| TensorRecord {
                name: Cow::Borrowed(tensor.name()),
                shape: tensor.shape().dims().to_vec(),
                data: tensor.values(),
            })
            .collect();

        ArtifactFrame {
            version: self.version,
            layers,
            tensors,
        }
    }

    /// Encodes the artifact, see `serialize`.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.to_frame().serialize(&mut buf)?;
        Ok(buf)
    }

    /// Decodes and validates an artifact buffer.
    ///
    /// Besides the framing checks done by `comms`, every layer is rebuilt from
    /// its tags, its recorded output shape is recomputed from its input and
    /// each referenced tensor must have the shape the layer expects.
    ///
    /// # Arguments
    /// * `buf` - A complete artifact buffer.
    ///
    /// # Returns
    /// The reconstructed artifact or the first inconsistency found.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let frame = ArtifactFrame::deserialize(buf)?;

        let tensors = frame
            .tensors
            .into_iter()
            .map(|record| {
                let shape = TensorShape::from(record.shape);
                ParameterTensor::new(record.name.into_owned(), &shape, record.data.into_owned())
            })
            .collect::<Result<Vec<_>>>()?;

        let Some(first) = frame.layers.first() else {
            return Err(MlErr::EmptyModel);
        };
        let input = TensorShape::from(first.input.as_slice());

        let mut ops = Vec::with_capacity(frame.layers.len());
        let mut expected_in = input.clone();

        for (i, record) in frame.layers.into_iter().enumerate() {
            let act_fn = ActFn::from_tag(record.act_fn).ok_or_else(|| {
                MlErr::malformed(format!(
                    "layer {} has unknown activation tag {}",
                    record.name, record.act_fn
                ))
            })?;
            let spec = LayerSpec::from_wire(record.kind, act_fn, &record.attrs).ok_or_else(|| {
                MlErr::malformed(format!(
                    "layer {} has unknown kind {} or wrong attributes {:?}",
                    record.name, record.kind, record.attrs
                ))
            })?;
            spec.validate(i)?;

            let op_input = TensorShape::from(record.input);
            let op_output = TensorShape::from(record.output);
            for shape in [&op_input, &op_output] {
                if shape.checked_numel().is_none() {
                    return Err(MlErr::malformed(format!(
                        "layer {} has an oversized shape {shape}",
                        record.name
                    )));
                }
            }

            op_input.ensure_eq(i, &expected_in, "recorded input")?;
            spec.output_shape(i, &op_input)?
                .ensure_eq(i, &op_output, "recorded output")?;

            let param_shapes = spec.param_shapes();
            if param_shapes.len() != record.params.len() {
                return Err(MlErr::ShapeMismatch {
                    layer: i,
                    what: "parameter tensors",
                    got: record.params.len(),
                    expected: param_shapes.len(),
                });
            }
            for ((_, shape), &idx) in param_shapes.iter().zip(&record.params) {
                tensors[idx].shape().ensure_eq(i, shape, "parameter shape")?;
            }

            expected_in = op_output.clone();
            ops.push(CompiledOp {
                name: record.name.into_owned(),
                spec,
                input: op_input,
                output: op_output,
                params: record.params,
            });
        }

        Ok(Self {
            version: frame.version,
            input,
            ops,
            tensors,
        })
    }

    /// Runs the frozen graph on a single sample.
    ///
    /// # Arguments
    /// * `ops` - The tensor math implementation.
    /// * `x` - An input of exactly the artifact's input shape.
    pub fn forward<O: TensorOps + ?Sized>(&self, ops: &O, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        TensorShape::from(x.shape()).ensure_eq(0, &self.input, "forward input")?;

        self.ops.iter().enumerate().try_fold(x, |x, (i, op)| {
            let params: Vec<_> = op.params.iter().map(|&idx| &self.tensors[idx]).collect();
            op.spec.forward(i, ops, &params, x)
        })
    }
}

/// Encodes `artifact` into its version 1 wire format.
///
/// Pure and deterministic, the same artifact always yields the same bytes.
pub fn serialize(artifact: &Artifact) -> Result<Vec<u8>> {
    artifact.to_bytes()
}
