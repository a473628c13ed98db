//! Random tensor construction.
//!
//! Used to build test points for numerical Jacobian checks; seeded RNGs give
//! reproducible inputs.

use rand::Rng;
use rand::distr::StandardUniform;
use rand_distr::StandardNormal;

use crate::scalar::Scalar;
use crate::tensor::Tensor;

/// Scalars that can be drawn from the uniform and normal distributions.
pub trait RandomScalar: Scalar {
    /// Sample from the uniform distribution on [0, 1).
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self;

    /// Sample from the standard normal distribution.
    fn sample_normal<R: Rng>(rng: &mut R) -> Self;
}

impl RandomScalar for f64 {
    fn sample_uniform<R: Rng>(rng: &mut R) -> Self {
        rng.sample(StandardUniform)
    }

    fn sample_normal<R: Rng>(rng: &mut R) -> Self {
        rng.sample(StandardNormal)
    }
}

impl<ElT: RandomScalar> Tensor<ElT> {
    /// Create a tensor with uniform random values in [0, 1).
    pub fn random(shape: &[usize]) -> Self {
        Self::random_with_rng(shape, &mut rand::rng())
    }

    /// Create a tensor with uniform random values using a specific RNG.
    ///
    /// # Example
    ///
    /// ```
    /// use ndjacobian::Tensor;
    /// use rand::SeedableRng;
    /// use rand::rngs::StdRng;
    ///
    /// let t1: Tensor<f64> = Tensor::random_with_rng(&[2, 3], &mut StdRng::seed_from_u64(42));
    /// let t2: Tensor<f64> = Tensor::random_with_rng(&[2, 3], &mut StdRng::seed_from_u64(42));
    /// assert_eq!(t1.data(), t2.data());
    /// ```
    pub fn random_with_rng<R: Rng>(shape: &[usize], rng: &mut R) -> Self {
        Self::sampled(shape, || ElT::sample_uniform(rng))
    }

    /// Create a tensor with values uniform in [low, high).
    pub fn uniform_with_rng<R: Rng>(
        shape: &[usize],
        low: f64,
        high: f64,
        rng: &mut R,
    ) -> Self {
        let width = ElT::from_f64(high - low);
        let offset = ElT::from_f64(low);
        Self::sampled(shape, || ElT::sample_uniform(rng) * width + offset)
    }

    /// Create a tensor with standard normal random values.
    pub fn randn(shape: &[usize]) -> Self {
        Self::randn_with_rng(shape, &mut rand::rng())
    }

    pub fn randn_with_rng<R: Rng>(shape: &[usize], rng: &mut R) -> Self {
        Self::sampled(shape, || ElT::sample_normal(rng))
    }

    fn sampled(shape: &[usize], mut draw: impl FnMut() -> ElT) -> Self {
        let mut t = Self::zeros(shape);
        for x in t.data_mut() {
            *x = draw();
        }
        t
    }
}
