//! Online bootstrap aggregation (Oza and Russell, 2001).
//!
//! For each example every replica is trained `k` times, `k ~ Poisson(1)`. The counts
//! are drawn one after the other from the ensemble's own generator, so a seeded
//! ensemble is reproducible. The replicas are then updated in parallel: each owns a
//! deep copy of the prototype model and nothing mutable is shared between them.
//! Predictions are aggregated only after every replica has returned.

use std::collections::HashMap;
use std::hash::Hash;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Poisson};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::base::{Classifier, Features, Regressor};
use crate::learning::{LearningError, Result};

/// Default number of replicas
pub const DEFAULT_N_MODELS: usize = 10;

/// Configuration shared by the bagging ensembles.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BaggingConfig {
    /// Number of replicas (default: 10).
    pub n_models: usize,
    /// Seed of the generator drawing the Poisson counts.
    pub seed: Option<u64>,
}

impl Default for BaggingConfig {
    fn default() -> Self {
        Self {
            n_models: DEFAULT_N_MODELS,
            seed: None,
        }
    }
}

impl BaggingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_models == 0 {
            return Err(LearningError::Config(
                "n_models should be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Replicas plus the generator of their training counts.
#[derive(Clone, Debug)]
struct Bagging<M> {
    models: Vec<M>,
    rng: StdRng,
    poisson: Poisson<f64>,
}

impl<M: Clone + Send> Bagging<M> {
    fn new(model: M, config: &BaggingConfig) -> Result<Self> {
        config.validate()?;
        let poisson = Poisson::new(1.0)
            .map_err(|e| LearningError::Config(format!("invalid poisson rate: {}", e)))?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            models: vec![model; config.n_models],
            rng,
            poisson,
        })
    }

    /// One count per replica, in replica order.
    fn draw_counts(&mut self) -> Vec<u64> {
        (0..self.models.len())
            .map(|_| self.poisson.sample(&mut self.rng) as u64)
            .collect()
    }

    /// Train every replica `k` times with `fit`, replicas in parallel.
    fn fit_replicas<F>(&mut self, fit: F)
    where
        F: Fn(&mut M) + Sync,
    {
        let counts = self.draw_counts();
        self.models
            .par_iter_mut()
            .zip(counts.par_iter())
            .for_each(|(model, &k)| {
                for _ in 0..k {
                    fit(model);
                }
            });
    }
}

/// Online bagging for regression. Predicts the mean of the replicas.
///
/// # Example
///
/// ```
/// use streamlearn::base::{Features, Regressor};
/// use streamlearn::ensemble::{BaggingConfig, BaggingRegressor};
/// use streamlearn::linear_model::LinearRegression;
///
/// let config = BaggingConfig { n_models: 3, seed: Some(42) };
/// let mut model = BaggingRegressor::new(LinearRegression::default(), config).unwrap();
///
/// let x: Features<&str> = [("x", 1.0)].into_iter().collect();
/// model.fit_one(&x, 2.0);
/// assert_eq!(model.models().len(), 3);
/// ```
#[derive(Clone, Debug)]
pub struct BaggingRegressor<M> {
    bagging: Bagging<M>,
}

impl<M: Clone + Send> BaggingRegressor<M> {
    /// Build `config.n_models` deep copies of `model`.
    pub fn new(model: M, config: BaggingConfig) -> Result<Self> {
        Ok(Self {
            bagging: Bagging::new(model, &config)?,
        })
    }

    pub fn models(&self) -> &[M] {
        &self.bagging.models
    }
}

impl<K, M> Regressor<K> for BaggingRegressor<M>
where
    K: Sync,
    M: Regressor<K> + Clone + Send,
{
    fn fit_one(&mut self, x: &Features<K>, y: f64) -> &mut Self {
        self.bagging.fit_replicas(|model| {
            model.fit_one(x, y);
        });
        self
    }

    fn predict_one(&self, x: &Features<K>) -> f64 {
        let models = &self.bagging.models;
        let total: f64 = models.iter().map(|model| model.predict_one(x)).sum();
        total / models.len() as f64
    }
}

/// Online bagging for classification. Averages the replicas' probabilities.
#[derive(Clone, Debug)]
pub struct BaggingClassifier<M> {
    bagging: Bagging<M>,
}

impl<M: Clone + Send> BaggingClassifier<M> {
    /// Build `config.n_models` deep copies of `model`.
    pub fn new(model: M, config: BaggingConfig) -> Result<Self> {
        Ok(Self {
            bagging: Bagging::new(model, &config)?,
        })
    }

    pub fn models(&self) -> &[M] {
        &self.bagging.models
    }
}

impl<K, L, M> Classifier<K, L> for BaggingClassifier<M>
where
    K: Sync,
    L: Eq + Hash + Clone + Sync,
    M: Classifier<K, L> + Clone + Send,
{
    fn fit_one(&mut self, x: &Features<K>, y: &L) -> &mut Self {
        self.bagging.fit_replicas(|model| {
            model.fit_one(x, y);
        });
        self
    }

    /// Sum of the replicas' distributions, renormalized. Empty when every replica
    /// returns an empty distribution.
    fn predict_proba_one(&self, x: &Features<K>) -> HashMap<L, f64> {
        let mut summed: HashMap<L, f64> = HashMap::new();
        for model in &self.bagging.models {
            for (label, p) in model.predict_proba_one(x) {
                *summed.entry(label).or_insert(0.0) += p;
            }
        }

        let total: f64 = summed.values().sum();
        if total > 0.0 {
            summed.into_iter().map(|(l, p)| (l, p / total)).collect()
        } else {
            HashMap::new()
        }
    }
}
