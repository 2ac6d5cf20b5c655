use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::{MlErr, Result};

/// The dimension sizes of a single sample, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TensorShape(Vec<usize>);

impl TensorShape {
    pub fn new(dims: Vec<usize>) -> Self {
        Self(dims)
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// The amount of scalars a tensor of this shape holds.
    ///
    /// `None` if the count overflows or is too large for an `ndarray` allocation.
    pub fn checked_numel(&self) -> Option<usize> {
        self.0
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .filter(|&n| n <= isize::MAX as usize)
    }

    /// Checks that `self` is exactly `expected`.
    ///
    /// # Arguments
    /// * `layer` - The layer the check belongs to.
    /// * `expected` - The shape to compare against.
    /// * `what` - What is being compared, used in the error.
    ///
    /// # Returns
    /// A `ShapeMismatch` reporting the ranks if they differ, otherwise the first differing dimension.
    pub fn ensure_eq(&self, layer: usize, expected: &TensorShape, what: &'static str) -> Result<()> {
        if self.rank() != expected.rank() {
            return Err(MlErr::ShapeMismatch {
                layer,
                what,
                got: self.rank(),
                expected: expected.rank(),
            });
        }

        match self.0.iter().zip(&expected.0).find(|(got, exp)| got != exp) {
            Some((&got, &expected)) => Err(MlErr::ShapeMismatch {
                layer,
                what,
                got,
                expected,
            }),
            None => Ok(()),
        }
    }
}

impl From<Vec<usize>> for TensorShape {
    fn from(dims: Vec<usize>) -> Self {
        Self(dims)
    }
}

impl From<&[usize]> for TensorShape {
    fn from(dims: &[usize]) -> Self {
        Self(dims.to_vec())
    }
}

impl<const N: usize> From<[usize; N]> for TensorShape {
    fn from(dims: [usize; N]) -> Self {
        Self(dims.to_vec())
    }
}

impl Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
