use std::borrow::Cow;

use ndarray::{ArrayD, ArrayViewD, IxDyn};

use super::TensorShape;
use crate::{MlErr, Result};

/// A named learnable tensor, immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterTensor {
    name: String,
    value: ArrayD<f32>,
}

impl ParameterTensor {
    /// Creates a new `ParameterTensor`.
    ///
    /// # Arguments
    /// * `name` - The fully qualified name, e.g. `conv0.weight`.
    /// * `shape` - The tensor's shape.
    /// * `values` - Exactly `shape.checked_numel()` values in row major order.
    ///
    /// # Returns
    /// A new `ParameterTensor` or `TensorSize` if the amount of values is wrong.
    pub fn new(name: impl Into<String>, shape: &TensorShape, values: Vec<f32>) -> Result<Self> {
        let name = name.into();
        let got = values.len();
        let size_err = |name| MlErr::TensorSize {
            name,
            got,
            expected: shape.checked_numel().unwrap_or(usize::MAX),
        };

        if shape.checked_numel() != Some(got) {
            return Err(size_err(name));
        }
        let value = ArrayD::from_shape_vec(IxDyn(shape.dims()), values)
            .map_err(|_| size_err(name.clone()))?;

        Ok(Self { name, value })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> TensorShape {
        TensorShape::from(self.value.shape())
    }

    pub fn numel(&self) -> usize {
        self.value.len()
    }

    pub fn view(&self) -> ArrayViewD<'_, f32> {
        self.value.view()
    }

    /// The values in row major order, borrowed whenever the storage already is.
    pub fn values(&self) -> Cow<'_, [f32]> {
        match self.value.as_slice() {
            Some(values) => Cow::Borrowed(values),
            None => Cow::Owned(self.value.iter().copied().collect()),
        }
    }
}
