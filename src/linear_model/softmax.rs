//! Multinomial logistic regression with one weight map per label.
//!
//! Labels are discovered from the stream. The first time a label receives a gradient
//! it gets a fresh deep copy of the prototype weights and optimizer; copies never
//! share state.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::base::{Classifier, Features};
use crate::initializer::Initializer;
use crate::learning::{Result, ensure_non_negative};
use crate::loss::MultiClassLoss;
use crate::math::{softmax, sparse_dot};
use crate::optim::{Gradient, Optimizer, OptimizerConfig, ParameterSnapshot};
use crate::weights::SparseWeights;

/// Configuration of [`SoftmaxRegression`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SoftmaxConfig {
    /// Prototype optimizer, copied for every label (default: SGD, lr=0.01).
    pub optimizer: OptimizerConfig,
    pub loss: MultiClassLoss,
    /// L2 penalty on the weights (default: 0).
    pub l2: f64,
    /// Prototype initializer, copied for every label (default: zeros).
    pub initializer: Initializer,
}

impl SoftmaxConfig {
    pub fn validate(&self) -> Result<()> {
        self.optimizer.validate()?;
        ensure_non_negative("l2", self.l2)
    }
}

/// Softmax regression.
///
/// # Example
///
/// ```
/// use streamlearn::base::{Classifier, Features};
/// use streamlearn::linear_model::SoftmaxRegression;
///
/// let mut model = SoftmaxRegression::default();
/// let x: Features<&str> = [("a", 1.0)].into_iter().collect();
///
/// assert!(model.predict_proba_one(&x).is_empty());
///
/// model.fit_one(&x, &"cat");
/// assert_eq!(model.predict_one(&x), Some("cat"));
/// ```
#[derive(Clone, Debug)]
pub struct SoftmaxRegression<K, L> {
    /// label -> (weights, optimizer)
    labels: HashMap<L, (SparseWeights<K>, Optimizer<K>)>,
    /// Copied when a label is first seen
    prototype: (SparseWeights<K>, Optimizer<K>),
    loss: MultiClassLoss,
    l2: f64,
}

impl<K, L> Default for SoftmaxRegression<K, L>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self {
            labels: HashMap::new(),
            prototype: (SparseWeights::new(Initializer::Zeros), Optimizer::default()),
            loss: MultiClassLoss::default(),
            l2: 0.0,
        }
    }
}

impl<K, L> SoftmaxRegression<K, L>
where
    K: Eq + Hash + Clone,
    L: Eq + Hash + Clone + Debug,
{
    pub fn new(config: SoftmaxConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            labels: HashMap::new(),
            prototype: (
                SparseWeights::new(config.initializer),
                config.optimizer.build()?,
            ),
            loss: config.loss,
            l2: config.l2,
        })
    }

    /// Labels seen so far, in no particular order.
    pub fn labels(&self) -> impl Iterator<Item = &L> {
        self.labels.keys()
    }

    pub fn n_labels(&self) -> usize {
        self.labels.len()
    }

    /// Weights of `label`, if it has been seen.
    pub fn weights(&self, label: &L) -> Option<&SparseWeights<K>> {
        self.labels.get(label).map(|(w, _)| w)
    }

    /// Optimizer of `label`, if it has been seen.
    pub fn optimizer(&self, label: &L) -> Option<&Optimizer<K>> {
        self.labels.get(label).map(|(_, o)| o)
    }

    /// Per-label snapshot of weights and optimizer state.
    pub fn snapshot(&self) -> HashMap<L, ParameterSnapshot<K, f64>> {
        self.labels
            .iter()
            .map(|(label, (w, o))| (label.clone(), ParameterSnapshot::capture(w, o)))
            .collect()
    }

    /// Replace every label with the snapshot's. Labels missing from the snapshot are
    /// forgotten.
    pub fn restore(&mut self, snapshot: HashMap<L, ParameterSnapshot<K, f64>>) -> Result<()> {
        let mut labels = HashMap::with_capacity(snapshot.len());
        for (label, parameters) in snapshot {
            let (mut weights, mut optimizer) = self.prototype.clone();
            parameters.apply(&mut weights, &mut optimizer)?;
            labels.insert(label, (weights, optimizer));
        }
        self.labels = labels;
        Ok(())
    }

    pub fn check_finite(&self) -> Result<()>
    where
        K: Debug,
    {
        self.labels.values().try_for_each(|(w, _)| w.check_finite())
    }
}

impl<K, L> Classifier<K, L> for SoftmaxRegression<K, L>
where
    K: Eq + Hash + Clone,
    L: Eq + Hash + Clone + Debug,
{
    fn fit_one(&mut self, x: &Features<K>, y: &L) -> &mut Self {
        for (weights, optimizer) in self.labels.values_mut() {
            optimizer.update_before_pred(weights);
        }

        let y_pred = self.predict_proba_one(x);
        let loss_gradients = self.loss.gradient(y, &y_pred);

        for (label, g) in loss_gradients {
            let prototype = &self.prototype;
            let (weights, optimizer) = self.labels.entry(label).or_insert_with_key(|label| {
                log::debug!("Registering label {:?}", label);
                prototype.clone()
            });

            let gradient: Gradient<K> = x
                .iter()
                .map(|(i, xi)| {
                    let wi = weights.get(i).copied().unwrap_or(0.0);
                    (i.clone(), xi * g + self.l2 * wi)
                })
                .collect();
            optimizer.update_after_pred(weights, &gradient);
        }

        self
    }

    fn predict_proba_one(&self, x: &Features<K>) -> HashMap<L, f64> {
        softmax(
            self.labels
                .iter()
                .map(|(label, (weights, _))| {
                    (label.clone(), sparse_dot(x, |i| weights.get(i).copied()))
                })
                .collect(),
        )
    }
}
