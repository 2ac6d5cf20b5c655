use std::{cell::RefCell, rc::Rc};

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use super::{ParamGen, Result};

/// Draws tensor values from `D`, at most `len` of them.
///
/// Every generator of a model borrows the same `rng`, so the values a tensor
/// gets depend on the tensors initialized before it.
pub struct RandParamGen<R: Rng, D: Distribution<f32>> {
    rng: Rc<RefCell<R>>,
    distribution: D,
    remaining: usize,
}

impl<R: Rng, D: Distribution<f32>> RandParamGen<R, D> {
    pub fn new(rng: Rc<RefCell<R>>, distribution: D, len: usize) -> Self {
        Self {
            rng,
            distribution,
            remaining: len,
        }
    }
}

impl<R: Rng> RandParamGen<R, Uniform<f32>> {
    /// Values in `[low, high)`, fails unless `low < high`.
    pub fn uniform(rng: Rc<RefCell<R>>, len: usize, low: f32, high: f32) -> Result<Self> {
        Ok(Self::new(rng, Uniform::new(low, high)?, len))
    }

    /// The default policy for weights and biases of a layer.
    ///
    /// # Arguments
    /// * `rng` - The model's shared generator.
    /// * `len` - The amount of values in the tensor.
    /// * `fan_in` - The fan in of the owning layer, see `LayerSpec::fan_in`.
    ///
    /// # Returns
    /// A generator over `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`, or an error if `fan_in` is zero.
    pub fn fan_in_uniform(rng: Rc<RefCell<R>>, len: usize, fan_in: usize) -> Result<Self> {
        let bound = (fan_in as f32).sqrt().recip();
        Self::uniform(rng, len, -bound, bound)
    }
}

impl<R: Rng> RandParamGen<R, Normal<f32>> {
    /// Values from `N(mean, std_dev)`, fails on a non finite `std_dev`.
    pub fn normal(rng: Rc<RefCell<R>>, len: usize, mean: f32, std_dev: f32) -> Result<Self> {
        Ok(Self::new(rng, Normal::new(mean, std_dev)?, len))
    }

    /// Zero centered normal values scaled by `sqrt(2 / fan_in)`, suited to relu layers.
    pub fn kaiming(rng: Rc<RefCell<R>>, len: usize, fan_in: usize) -> Result<Self> {
        Self::normal(rng, len, 0., (2. / fan_in as f32).sqrt())
    }
}

impl<R: Rng, D: Distribution<f32>> ParamGen for RandParamGen<R, D> {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        let taken = n.min(self.remaining);
        if taken == 0 && self.remaining == 0 {
            return None;
        }

        self.remaining -= taken;

        let mut rng = self.rng.borrow_mut();
        let values = (&mut *rng).sample_iter(&self.distribution).take(taken).collect();
        Some(values)
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::initialization::RandErr;

    fn seeded_rng(seed: u64) -> Rc<RefCell<StdRng>> {
        Rc::new(RefCell::new(StdRng::seed_from_u64(seed)))
    }

    #[test]
    fn yields_at_most_len_values() {
        let mut param_gen = RandParamGen::normal(seeded_rng(42), 10, 0., 1.).unwrap();

        assert_eq!(param_gen.fill(7).map(|v| v.len()), Some(7));
        assert_eq!(param_gen.fill(7), None);
        assert!(param_gen.sample(1).is_none());
    }

    #[test]
    fn generators_sharing_an_rng_draw_disjoint_values() {
        let rng = seeded_rng(5);
        let mut a = RandParamGen::uniform(rng.clone(), 4, 0., 1.).unwrap();
        let mut b = RandParamGen::uniform(rng, 4, 0., 1.).unwrap();
        let mut whole = RandParamGen::uniform(seeded_rng(5), 8, 0., 1.).unwrap();

        let mut chained = a.fill(4).unwrap();
        chained.extend(b.fill(4).unwrap());
        assert_eq!(chained, whole.fill(8).unwrap());
    }

    #[test]
    fn fan_in_uniform_stays_in_bounds() {
        let mut param_gen = RandParamGen::fan_in_uniform(seeded_rng(7), 1000, 25).unwrap();
        let sample = param_gen.sample(1000).unwrap();

        assert!(sample.iter().all(|v| (-0.2..0.2).contains(v)));
    }

    #[test]
    fn same_seed_same_values() {
        let mut a = RandParamGen::kaiming(seeded_rng(3), 16, 4).unwrap();
        let mut b = RandParamGen::kaiming(seeded_rng(3), 16, 4).unwrap();

        assert_eq!(a.sample(16), b.sample(16));
    }

    #[test]
    fn invalid_distribution() {
        assert!(RandParamGen::normal(seeded_rng(0), 1, 0., f32::NAN).is_err());
        assert!(RandParamGen::uniform(seeded_rng(0), 1, 1., -1.).is_err());

        let err = RandParamGen::fan_in_uniform(seeded_rng(0), 1, 0).err().unwrap();
        assert!(matches!(err, RandErr::Uniform(_)));
    }
}
