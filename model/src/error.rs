use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use crate::initialization::RandErr;

/// The result type used in the entire model crate.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The model crate's error type.
#[derive(Debug)]
pub enum MlErr {
    /// A layer can't consume the shape produced by the previous one, or a traced
    /// shape disagrees with the statically computed one.
    ShapeMismatch {
        layer: usize,
        what: &'static str,
        got: usize,
        expected: usize,
    },
    InvalidLayer {
        layer: usize,
        reason: &'static str,
    },
    InvalidInput(&'static str),
    EmptyModel,
    TensorSize {
        name: String,
        got: usize,
        expected: usize,
    },
    ParamGenExhausted {
        tensor: String,
    },
    Init(RandErr),
    /// The artifact buffer could not be encoded or decoded.
    Wire(io::Error),
}

impl MlErr {
    pub(crate) fn malformed(msg: String) -> Self {
        Self::Wire(io::Error::new(io::ErrorKind::InvalidData, msg))
    }
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::ShapeMismatch {
                layer,
                what,
                got,
                expected,
            } => write!(
                f,
                "shape mismatch at layer {layer} for {what}: got {got}, expected {expected}"
            ),
            MlErr::InvalidLayer { layer, reason } => write!(f, "invalid layer {layer}: {reason}"),
            MlErr::InvalidInput(reason) => write!(f, "invalid input: {reason}"),
            MlErr::EmptyModel => write!(f, "a model must have at least one layer"),
            MlErr::TensorSize {
                name,
                got,
                expected,
            } => write!(
                f,
                "tensor {name} was given {got} values but its shape holds {expected}"
            ),
            MlErr::ParamGenExhausted { tensor } => {
                write!(f, "the parameter generator ran out before filling {tensor}")
            }
            MlErr::Init(e) => write!(f, "failed to set up parameter initialization: {e}"),
            MlErr::Wire(e) => write!(f, "malformed artifact: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Init(e) => Some(e),
            MlErr::Wire(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RandErr> for MlErr {
    fn from(value: RandErr) -> Self {
        Self::Init(value)
    }
}

impl From<io::Error> for MlErr {
    fn from(value: io::Error) -> Self {
        Self::Wire(value)
    }
}
