use std::{
    error::Error,
    fmt::{self, Display},
};

use rand_distr::{NormalError, uniform::Error as UniformError};

/// An initialization policy whose distribution can't be built for some tensor.
#[derive(Debug)]
pub enum RandErr {
    Normal(NormalError),
    Uniform(UniformError),
}

impl From<NormalError> for RandErr {
    fn from(value: NormalError) -> Self {
        Self::Normal(value)
    }
}

impl From<UniformError> for RandErr {
    fn from(value: UniformError) -> Self {
        Self::Uniform(value)
    }
}

impl Display for RandErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RandErr::Normal(e) => write!(f, "invalid normal initializer: {e}"),
            RandErr::Uniform(e) => write!(f, "invalid uniform initializer: {e}"),
        }
    }
}

impl Error for RandErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RandErr::Normal(e) => Some(e),
            RandErr::Uniform(e) => Some(e),
        }
    }
}
