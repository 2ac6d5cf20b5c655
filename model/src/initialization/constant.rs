use std::iter;

use super::ParamGen;

/// Yields the same value a limited amount of times.
pub struct ConstParamGen {
    value: f32,
    remaining: usize,
}

impl ConstParamGen {
    /// Creates a new `ConstParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `value` - The value to always generate.
    /// * `limit` - The maximum amount of times to generate that value.
    pub fn new(value: f32, limit: usize) -> Self {
        Self {
            value,
            remaining: limit,
        }
    }
}

impl ParamGen for ConstParamGen {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        let taken = n.min(self.remaining);
        if taken == 0 && self.remaining == 0 {
            return None;
        }

        self.remaining -= taken;
        Some(iter::repeat_n(self.value, taken).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_out() {
        let mut param_gen = ConstParamGen::new(0.5, 4);

        assert_eq!(param_gen.sample(3), Some(vec![0.5; 3]));
        assert_eq!(param_gen.sample(3), Some(vec![0.5]));
        assert_eq!(param_gen.sample(3), None);
    }

    #[test]
    fn fill_requires_the_whole_amount() {
        assert_eq!(ConstParamGen::new(0., 6).fill(6), Some(vec![0.; 6]));
        assert_eq!(ConstParamGen::new(0., 5).fill(6), None);
        assert_eq!(ConstParamGen::new(0., 0).fill(1), None);
    }
}
