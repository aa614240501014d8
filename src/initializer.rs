//! Default values for keys that have never been seen.
//!
//! Every [`SparseWeights`](crate::weights::SparseWeights) owns its own initializer.
//! Cloning an initializer clones its random generator too, so two clones produce the
//! same sequence from that point on but never observe each other's draws.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::learning::{LearningError, Result, ensure_finite, ensure_non_negative};

/// Weight initialization scheme.
///
/// # Example
///
/// ```
/// use streamlearn::initializer::Initializer;
///
/// let mut zeros = Initializer::Zeros;
/// assert_eq!(zeros.value(), 0.0);
///
/// let mut normal = Initializer::normal(0.0, 0.1, Some(42)).unwrap();
/// let v = normal.vector(10);
/// assert_eq!(v.len(), 10);
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(into = "InitializerSpec", try_from = "InitializerSpec")]
pub enum Initializer {
    /// Always 0.0.
    #[default]
    Zeros,
    /// Always the given value.
    Constant(f64),
    /// Independent draws from a seeded normal distribution.
    Normal(NormalInit),
}

/// Normal initializer state: the distribution plus the generator it owns.
#[derive(Clone, Debug)]
pub struct NormalInit {
    mu: f64,
    sigma: f64,
    seed: Option<u64>,
    dist: Normal<f64>,
    rng: StdRng,
}

impl NormalInit {
    pub fn mu(&self) -> f64 {
        self.mu
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

impl Initializer {
    /// Constant initializer.
    ///
    /// # Errors
    ///
    /// `LearningError::Config` if `value` is not finite.
    pub fn constant(value: f64) -> Result<Self> {
        ensure_finite("constant initializer value", value)?;
        Ok(Initializer::Constant(value))
    }

    /// Normal initializer with mean `mu` and standard deviation `sigma`.
    ///
    /// With a seed, two initializers built with the same arguments draw the same
    /// sequence. Without one, the generator is seeded from the operating system.
    ///
    /// # Errors
    ///
    /// `LearningError::Config` if `mu` is not finite or `sigma` is negative.
    pub fn normal(mu: f64, sigma: f64, seed: Option<u64>) -> Result<Self> {
        ensure_finite("mu", mu)?;
        ensure_non_negative("sigma", sigma)?;

        let dist = Normal::new(mu, sigma)
            .map_err(|e| LearningError::Config(format!("invalid normal initializer: {}", e)))?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Initializer::Normal(NormalInit {
            mu,
            sigma,
            seed,
            dist,
            rng,
        }))
    }

    /// Produce one scalar.
    #[inline]
    pub fn value(&mut self) -> f64 {
        match self {
            Initializer::Zeros => 0.0,
            Initializer::Constant(c) => *c,
            Initializer::Normal(n) => n.dist.sample(&mut n.rng),
        }
    }

    /// Produce a vector of `len` values, drawn one after the other.
    pub fn vector(&mut self, len: usize) -> Vec<f64> {
        match self {
            Initializer::Zeros => vec![0.0; len],
            Initializer::Constant(c) => vec![*c; len],
            Initializer::Normal(n) => (0..len).map(|_| n.dist.sample(&mut n.rng)).collect(),
        }
    }

    /// Whether every call returns the same value.
    pub fn is_deterministic(&self) -> bool {
        !matches!(self, Initializer::Normal(_))
    }
}

/// Serializable description of an initializer.
///
/// A deserialized `Normal` initializer starts its sequence again from the seed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InitializerSpec {
    Zeros,
    Constant { value: f64 },
    Normal { mu: f64, sigma: f64, seed: Option<u64> },
}

impl From<Initializer> for InitializerSpec {
    fn from(init: Initializer) -> Self {
        match init {
            Initializer::Zeros => InitializerSpec::Zeros,
            Initializer::Constant(value) => InitializerSpec::Constant { value },
            Initializer::Normal(n) => InitializerSpec::Normal {
                mu: n.mu,
                sigma: n.sigma,
                seed: n.seed,
            },
        }
    }
}

impl TryFrom<InitializerSpec> for Initializer {
    type Error = LearningError;

    fn try_from(spec: InitializerSpec) -> Result<Self> {
        match spec {
            InitializerSpec::Zeros => Ok(Initializer::Zeros),
            InitializerSpec::Constant { value } => Initializer::constant(value),
            InitializerSpec::Normal { mu, sigma, seed } => Initializer::normal(mu, sigma, seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros() {
        let mut init = Initializer::Zeros;
        for _ in 0..10 {
            assert_eq!(init.value(), 0.0);
        }
        assert_eq!(init.vector(3), vec![0.0, 0.0, 0.0]);
        assert!(init.is_deterministic());
    }

    #[test]
    fn test_constant() {
        let mut init = Initializer::constant(3.5).unwrap();
        assert_eq!(init.value(), 3.5);
        assert_eq!(init.value(), 3.5);
        assert_eq!(init.vector(2), vec![3.5, 3.5]);
    }

    #[test]
    fn test_constant_rejects_nan() {
        assert!(matches!(
            Initializer::constant(f64::NAN),
            Err(LearningError::Config(_))
        ));
    }

    #[test]
    fn test_normal_rejects_negative_sigma() {
        assert!(matches!(
            Initializer::normal(0.0, -1.0, Some(1)),
            Err(LearningError::Config(_))
        ));
    }

    #[test]
    fn test_normal_same_seed_same_sequence() {
        let mut a = Initializer::normal(0.0, 0.1, Some(71)).unwrap();
        let mut b = Initializer::normal(0.0, 0.1, Some(71)).unwrap();

        assert_eq!(a.vector(10), b.vector(10));
        assert_eq!(a.value(), b.value());
    }

    #[test]
    fn test_normal_draws_are_independent() {
        let mut init = Initializer::normal(0.0, 1.0, Some(7)).unwrap();
        let first = init.value();
        let second = init.value();
        assert_ne!(first, second);
        assert!(!init.is_deterministic());
    }

    #[test]
    fn test_normal_zero_sigma_returns_mu() {
        let mut init = Initializer::normal(2.0, 0.0, Some(3)).unwrap();
        assert_eq!(init.value(), 2.0);
    }

    #[test]
    fn test_clone_does_not_share_generator() {
        let mut original = Initializer::normal(0.0, 1.0, Some(11)).unwrap();
        let mut copy = original.clone();

        // Advancing the original must not advance the copy.
        let drawn = original.vector(5);
        assert_eq!(copy.vector(5), drawn);
    }

    #[test]
    fn test_spec_round_trip_restarts_sequence() {
        let mut init = Initializer::normal(0.5, 0.2, Some(5)).unwrap();
        let fresh_first = Initializer::normal(0.5, 0.2, Some(5)).unwrap().value();
        init.value();

        let spec = InitializerSpec::from(init);
        assert_eq!(
            spec,
            InitializerSpec::Normal {
                mu: 0.5,
                sigma: 0.2,
                seed: Some(5)
            }
        );

        let mut rebuilt = Initializer::try_from(spec).unwrap();
        assert_eq!(rebuilt.value(), fresh_first);
    }
}
