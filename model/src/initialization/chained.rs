use std::collections::VecDeque;

use super::ParamGen;

/// Concatenates the output of several generators, draining them front to back.
///
/// The graph builder queues one generator per tensor, each one sized to that
/// tensor and drawing from the distribution of its layer.
pub struct ChainedParamGen {
    queue: VecDeque<Box<dyn ParamGen>>,
}

impl ChainedParamGen {
    /// Creates a new `ChainedParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `param_gens` - The generators, in the order their values are wanted.
    pub fn new(param_gens: Vec<Box<dyn ParamGen>>) -> Self {
        Self {
            queue: param_gens.into(),
        }
    }

    /// The amount of generators not yet drained.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl ParamGen for ChainedParamGen {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        let mut values = Vec::with_capacity(n);

        while values.len() < n {
            let front = self.queue.front_mut()?;

            match front.sample(n - values.len()) {
                Some(sample) if !sample.is_empty() => values.extend(sample),
                _ => {
                    self.queue.pop_front();
                }
            }

            if self.queue.is_empty() {
                break;
            }
        }

        (!values.is_empty()).then_some(values)
    }
}
