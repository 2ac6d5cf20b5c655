use std::{cell::RefCell, rc::Rc};

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{ConstParamGen, ParamGen, RandParamGen, Result};

/// How the builder fills weights and biases.
///
/// Biases follow the same policy as the weights of their layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitSpec {
    #[default]
    FanInUniform,
    Kaiming,
    Normal {
        mean: f32,
        std_dev: f32,
    },
    Const {
        value: f32,
    },
}

impl InitSpec {
    /// Creates the generator for a single tensor.
    ///
    /// # Arguments
    /// * `rng` - The random number generator shared by the whole model.
    /// * `limit` - The amount of values the tensor holds.
    /// * `fan_in` - The fan in of the layer owning the tensor.
    ///
    /// # Returns
    /// A boxed generator or an error if the distribution is invalid.
    pub fn param_gen<R: Rng + 'static>(
        &self,
        rng: Rc<RefCell<R>>,
        limit: usize,
        fan_in: usize,
    ) -> Result<Box<dyn ParamGen>> {
        let param_gen: Box<dyn ParamGen> = match *self {
            InitSpec::FanInUniform => Box::new(RandParamGen::fan_in_uniform(rng, limit, fan_in)?),
            InitSpec::Kaiming => Box::new(RandParamGen::kaiming(rng, limit, fan_in)?),
            InitSpec::Normal { mean, std_dev } => {
                Box::new(RandParamGen::normal(rng, limit, mean, std_dev)?)
            }
            InitSpec::Const { value } => Box::new(ConstParamGen::new(value, limit)),
        };

        Ok(param_gen)
    }
}
