/// A `ParamGen` generates values for the initial state of the model's parameters.
pub trait ParamGen {
    /// Should sample at most `n` parameters.
    ///
    /// # Arguments
    /// * `n` - The upper limit of samples to generate.
    ///
    /// # Returns
    /// `None` once the generator is exhausted.
    fn sample(&mut self, n: usize) -> Option<Vec<f32>>;

    /// Samples exactly `n` parameters, `None` if the generator runs out before.
    fn fill(&mut self, n: usize) -> Option<Vec<f32>> {
        self.sample(n).filter(|values| values.len() == n)
    }
}
