//! Sequential optimizers over sparse weights.
//!
//! # Overview
//!
//! An optimizer turns one gradient into one weight update, keeping whatever per-key
//! auxiliary state its recurrence needs:
//!
//! | Rule | Per-key state | Update |
//! |------|---------------|--------|
//! | [`Sgd`] | none | `w -= lr * g` |
//! | [`Momentum`] | velocity `s` | `s = rho*s + lr*g; w -= s` |
//! | [`AdaMax`] | `m`, `u` | bias-corrected `m`, infinity norm `u` |
//! | [`AdaBound`] | `m`, `v` | Adam step clamped into converging bounds |
//!
//! # Contract
//!
//! - `update_before_pred` runs before the model predicts. It is the identity for every
//!   rule here and exists for lookahead-style rules.
//! - `update_after_pred` applies the recurrence to every key of the gradient and then
//!   increments the iteration counter `n` by exactly one.
//! - Keys absent from the gradient are untouched, both their weights and their state.
//! - State for a key exists iff the key has received at least one gradient.
//!
//! The rule set is closed, so dispatch is a `match` on [`Rule`] rather than a trait
//! object.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::learning::{
    LearningError, Result, ensure_positive, ensure_unit_interval,
};
use crate::weights::{Param, SparseWeights, ensure_dim};

pub mod ada_bound;
pub mod ada_max;
pub mod momentum;
pub mod schedule;
pub mod sgd;

pub use ada_bound::{AdaBound, StepBounds};
pub use ada_max::AdaMax;
pub use momentum::Momentum;
pub use schedule::LearningRate;
pub use sgd::Sgd;

/// Per-example gradient: key -> gradient component. Built fresh for every example.
pub type Gradient<K, V = f64> = HashMap<K, V>;

/// Hyperparameters of an optimizer, without any state.
///
/// This is the prototype models clone from: [`OptimizerConfig::build`] always returns
/// an optimizer with empty state and `n = 0`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerConfig {
    Sgd {
        lr: LearningRate,
    },
    Momentum {
        lr: LearningRate,
        rho: f64,
    },
    AdaMax {
        lr: LearningRate,
        beta_1: f64,
        beta_2: f64,
        eps: f64,
    },
    AdaBound {
        lr: LearningRate,
        beta_1: f64,
        beta_2: f64,
        eps: f64,
        gamma: f64,
        final_lr: f64,
    },
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig::sgd(sgd::DEFAULT_LR)
    }
}

impl OptimizerConfig {
    pub fn sgd(lr: impl Into<LearningRate>) -> Self {
        OptimizerConfig::Sgd { lr: lr.into() }
    }

    pub fn momentum(lr: impl Into<LearningRate>, rho: f64) -> Self {
        OptimizerConfig::Momentum { lr: lr.into(), rho }
    }

    pub fn ada_max(lr: impl Into<LearningRate>, beta_1: f64, beta_2: f64, eps: f64) -> Self {
        OptimizerConfig::AdaMax {
            lr: lr.into(),
            beta_1,
            beta_2,
            eps,
        }
    }

    pub fn ada_bound(
        lr: impl Into<LearningRate>,
        beta_1: f64,
        beta_2: f64,
        eps: f64,
        gamma: f64,
        final_lr: f64,
    ) -> Self {
        OptimizerConfig::AdaBound {
            lr: lr.into(),
            beta_1,
            beta_2,
            eps,
            gamma,
            final_lr,
        }
    }

    /// Momentum with lr=0.1, rho=0.9.
    pub fn default_momentum() -> Self {
        Self::momentum(momentum::DEFAULT_LR, momentum::DEFAULT_RHO)
    }

    /// AdaMax with lr=0.1, beta_1=0.9, beta_2=0.999, eps=1e-8.
    pub fn default_ada_max() -> Self {
        Self::ada_max(
            ada_max::DEFAULT_LR,
            ada_max::DEFAULT_BETA1,
            ada_max::DEFAULT_BETA2,
            ada_max::DEFAULT_EPSILON,
        )
    }

    /// AdaBound with lr=1e-3, beta_1=0.9, beta_2=0.999, eps=1e-8, gamma=1e-3, final_lr=0.1.
    pub fn default_ada_bound() -> Self {
        Self::ada_bound(
            ada_bound::DEFAULT_LR,
            ada_bound::DEFAULT_BETA1,
            ada_bound::DEFAULT_BETA2,
            ada_bound::DEFAULT_EPSILON,
            ada_bound::DEFAULT_GAMMA,
            ada_bound::DEFAULT_FINAL_LR,
        )
    }

    /// Learning-rate schedule of this configuration.
    pub fn learning_rate(&self) -> LearningRate {
        match self {
            OptimizerConfig::Sgd { lr }
            | OptimizerConfig::Momentum { lr, .. }
            | OptimizerConfig::AdaMax { lr, .. }
            | OptimizerConfig::AdaBound { lr, .. } => *lr,
        }
    }

    /// Short name of the rule.
    pub fn name(&self) -> &'static str {
        match self {
            OptimizerConfig::Sgd { .. } => "SGD",
            OptimizerConfig::Momentum { .. } => "Momentum",
            OptimizerConfig::AdaMax { .. } => "AdaMax",
            OptimizerConfig::AdaBound { .. } => "AdaBound",
        }
    }

    /// Check every hyperparameter.
    ///
    /// # Errors
    ///
    /// `LearningError::Config` naming the first offending parameter.
    pub fn validate(&self) -> Result<()> {
        self.learning_rate().validate()?;
        match *self {
            OptimizerConfig::Sgd { .. } => Ok(()),
            OptimizerConfig::Momentum { rho, .. } => ensure_unit_interval("rho", rho),
            OptimizerConfig::AdaMax {
                beta_1,
                beta_2,
                eps,
                ..
            } => {
                ensure_unit_interval("beta_1", beta_1)?;
                ensure_unit_interval("beta_2", beta_2)?;
                ensure_positive("eps", eps)
            }
            OptimizerConfig::AdaBound {
                beta_1,
                beta_2,
                eps,
                gamma,
                final_lr,
                ..
            } => {
                ensure_unit_interval("beta_1", beta_1)?;
                ensure_unit_interval("beta_2", beta_2)?;
                ensure_positive("eps", eps)?;
                ensure_positive("gamma", gamma)?;
                ensure_positive("final_lr", final_lr)
            }
        }
    }

    /// Build a fresh optimizer for keys `K` and values `V`.
    pub fn build<K, V>(&self) -> Result<Optimizer<K, V>>
    where
        K: Eq + Hash + Clone,
        V: Param,
    {
        self.validate()?;
        let rule = match *self {
            OptimizerConfig::Sgd { .. } => Rule::Sgd(Sgd),
            OptimizerConfig::Momentum { rho, .. } => Rule::Momentum(Momentum::new(rho)),
            OptimizerConfig::AdaMax {
                beta_1,
                beta_2,
                eps,
                ..
            } => Rule::AdaMax(AdaMax::new(beta_1, beta_2, eps)),
            OptimizerConfig::AdaBound {
                beta_1,
                beta_2,
                eps,
                gamma,
                final_lr,
                ..
            } => Rule::AdaBound(AdaBound::new(beta_1, beta_2, eps, gamma, final_lr)),
        };

        Ok(Optimizer {
            lr: self.learning_rate(),
            n_iterations: 0,
            rule,
        })
    }
}

/// The update rule and its per-key state.
#[derive(Clone, Debug)]
pub enum Rule<K, V = f64> {
    Sgd(Sgd),
    Momentum(Momentum<K, V>),
    AdaMax(AdaMax<K, V>),
    AdaBound(AdaBound<K, V>),
}

/// A stateful sequential optimizer.
///
/// Cloning produces a fully independent deep copy (schedule, counter and all
/// per-key state).
///
/// # Example
///
/// ```
/// use streamlearn::initializer::Initializer;
/// use streamlearn::optim::{Gradient, Optimizer};
/// use streamlearn::weights::SparseWeights;
///
/// let mut optimizer = Optimizer::momentum(0.1, 0.9).unwrap();
/// let mut weights = SparseWeights::new(Initializer::Zeros);
/// weights.set("w", 5.0);
///
/// let gradient: Gradient<&str> = [("w", 1.0)].into_iter().collect();
/// optimizer.update_after_pred(&mut weights, &gradient);
///
/// assert!((weights.get(&"w").unwrap() - 4.9).abs() < 1e-12);
/// assert_eq!(optimizer.n_iterations(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct Optimizer<K, V = f64> {
    /// Learning-rate schedule
    lr: LearningRate,
    /// Number of completed `update_after_pred` calls
    n_iterations: u64,
    /// Rule and per-key state
    rule: Rule<K, V>,
}

impl<K, V> Default for Optimizer<K, V> {
    /// SGD with lr=0.01.
    fn default() -> Self {
        Optimizer {
            lr: LearningRate::from(sgd::DEFAULT_LR),
            n_iterations: 0,
            rule: Rule::Sgd(Sgd),
        }
    }
}

impl<K, V> Optimizer<K, V>
where
    K: Eq + Hash + Clone,
    V: Param,
{
    /// Build from a configuration. Same as [`OptimizerConfig::build`].
    pub fn new(config: &OptimizerConfig) -> Result<Self> {
        config.build()
    }

    pub fn sgd(lr: impl Into<LearningRate>) -> Result<Self> {
        OptimizerConfig::sgd(lr).build()
    }

    pub fn momentum(lr: impl Into<LearningRate>, rho: f64) -> Result<Self> {
        OptimizerConfig::momentum(lr, rho).build()
    }

    pub fn ada_max(
        lr: impl Into<LearningRate>,
        beta_1: f64,
        beta_2: f64,
        eps: f64,
    ) -> Result<Self> {
        OptimizerConfig::ada_max(lr, beta_1, beta_2, eps).build()
    }

    pub fn ada_bound(
        lr: impl Into<LearningRate>,
        beta_1: f64,
        beta_2: f64,
        eps: f64,
        gamma: f64,
        final_lr: f64,
    ) -> Result<Self> {
        OptimizerConfig::ada_bound(lr, beta_1, beta_2, eps, gamma, final_lr).build()
    }

    /// Pre-prediction hook. The identity for every rule in this crate.
    #[inline]
    pub fn update_before_pred(&mut self, _weights: &mut SparseWeights<K, V>) {}

    /// Apply one update for `gradient`, then increment the iteration counter.
    ///
    /// Keys of `gradient` missing from `weights` are materialized through the
    /// weights' initializer before being updated.
    pub fn update_after_pred(
        &mut self,
        weights: &mut SparseWeights<K, V>,
        gradient: &Gradient<K, V>,
    ) {
        let lr = self.learning_rate();
        let n = self.n_iterations;

        match &mut self.rule {
            Rule::Sgd(sgd) => sgd.update(lr, weights, gradient),
            Rule::Momentum(momentum) => momentum.update(lr, weights, gradient),
            Rule::AdaMax(ada_max) => ada_max.update(lr, n, weights, gradient),
            Rule::AdaBound(ada_bound) => {
                ada_bound.update(lr, self.lr.base(), n, weights, gradient)
            }
        }

        self.n_iterations += 1;
    }

    /// Learning rate for the next update.
    #[inline]
    pub fn learning_rate(&self) -> f64 {
        self.lr.rate(self.n_iterations)
    }

    pub fn schedule(&self) -> LearningRate {
        self.lr
    }

    pub fn n_iterations(&self) -> u64 {
        self.n_iterations
    }

    pub fn rule(&self) -> &Rule<K, V> {
        &self.rule
    }

    /// Whether `key` has per-key state. Always false for SGD.
    pub fn has_state(&self, key: &K) -> bool {
        match &self.rule {
            Rule::Sgd(_) => false,
            Rule::Momentum(r) => r.has_state(key),
            Rule::AdaMax(r) => r.has_state(key),
            Rule::AdaBound(r) => r.has_state(key),
        }
    }

    /// Hyperparameters of this optimizer.
    pub fn config(&self) -> OptimizerConfig {
        match &self.rule {
            Rule::Sgd(_) => OptimizerConfig::Sgd { lr: self.lr },
            Rule::Momentum(r) => OptimizerConfig::Momentum {
                lr: self.lr,
                rho: r.rho(),
            },
            Rule::AdaMax(r) => OptimizerConfig::AdaMax {
                lr: self.lr,
                beta_1: r.beta1(),
                beta_2: r.beta2(),
                eps: r.eps(),
            },
            Rule::AdaBound(r) => OptimizerConfig::AdaBound {
                lr: self.lr,
                beta_1: r.beta1(),
                beta_2: r.beta2(),
                eps: r.eps(),
                gamma: r.gamma(),
                final_lr: r.final_lr(),
            },
        }
    }

    /// Number of per-key state maps the rule keeps.
    pub fn slot_count(&self) -> usize {
        match &self.rule {
            Rule::Sgd(_) => 0,
            Rule::Momentum(_) => 1,
            Rule::AdaMax(_) | Rule::AdaBound(_) => 2,
        }
    }

    /// Copy of the iteration counter and every per-key state map.
    ///
    /// Slot order: Momentum `[s]`, AdaMax `[m, u]`, AdaBound `[m, v]`, SGD `[]`.
    pub fn snapshot(&self) -> OptimizerSnapshot<K, V> {
        let slots = match &self.rule {
            Rule::Sgd(_) => Vec::new(),
            Rule::Momentum(r) => r.slots(),
            Rule::AdaMax(r) => r.slots(),
            Rule::AdaBound(r) => r.slots(),
        };
        OptimizerSnapshot {
            n_iterations: self.n_iterations,
            slots,
        }
    }

    /// Check that `snapshot` fits this rule and that every state value has `dim`
    /// components, without touching `self`.
    pub fn validate_snapshot(
        &self,
        snapshot: &OptimizerSnapshot<K, V>,
        dim: usize,
    ) -> Result<()> {
        self.check_slot_count(snapshot)?;
        snapshot
            .slots
            .iter()
            .try_for_each(|slot| ensure_dim(slot, dim))
    }

    fn check_slot_count(&self, snapshot: &OptimizerSnapshot<K, V>) -> Result<()> {
        if snapshot.slots.len() != self.slot_count() {
            return Err(LearningError::InvalidCheckpoint(format!(
                "{} expects {} state slots, snapshot has {}",
                self.config().name(),
                self.slot_count(),
                snapshot.slots.len()
            )));
        }
        Ok(())
    }

    /// Restore counter and state from a snapshot taken from the same kind of rule.
    ///
    /// # Errors
    ///
    /// `LearningError::InvalidCheckpoint` if the slot count does not match the rule.
    /// Nothing is modified on error.
    pub fn restore(&mut self, snapshot: OptimizerSnapshot<K, V>) -> Result<()> {
        self.check_slot_count(&snapshot)?;

        match &mut self.rule {
            Rule::Sgd(_) => {}
            Rule::Momentum(r) => r.restore_slots(snapshot.slots),
            Rule::AdaMax(r) => r.restore_slots(snapshot.slots),
            Rule::AdaBound(r) => r.restore_slots(snapshot.slots),
        }
        self.n_iterations = snapshot.n_iterations;
        Ok(())
    }

    /// Clear all per-key state and reset the counter to 0.
    pub fn reset(&mut self) {
        self.n_iterations = 0;
        match &mut self.rule {
            Rule::Sgd(_) => {}
            Rule::Momentum(r) => r.reset(),
            Rule::AdaMax(r) => r.reset(),
            Rule::AdaBound(r) => r.reset(),
        }
    }
}

/// Opaque optimizer state: iteration counter plus key -> value maps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizerSnapshot<K: Eq + Hash, V> {
    pub n_iterations: u64,
    pub slots: Vec<HashMap<K, V>>,
}

/// Weights plus the optimizer that updates them, in snapshot form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot<K: Eq + Hash, V> {
    pub weights: HashMap<K, V>,
    pub optimizer: OptimizerSnapshot<K, V>,
}

impl<K, V> ParameterSnapshot<K, V>
where
    K: Eq + Hash + Clone,
    V: Param,
{
    pub fn capture(weights: &SparseWeights<K, V>, optimizer: &Optimizer<K, V>) -> Self {
        Self {
            weights: weights.snapshot(),
            optimizer: optimizer.snapshot(),
        }
    }

    /// Check that this snapshot can be applied to `weights` and `optimizer`.
    pub fn validate(
        &self,
        weights: &SparseWeights<K, V>,
        optimizer: &Optimizer<K, V>,
    ) -> Result<()> {
        weights.validate_snapshot(&self.weights)?;
        optimizer.validate_snapshot(&self.optimizer, weights.dim())
    }

    /// Write this snapshot back into `weights` and `optimizer`.
    ///
    /// Either both are restored or, on error, neither is modified.
    pub fn apply(
        self,
        weights: &mut SparseWeights<K, V>,
        optimizer: &mut Optimizer<K, V>,
    ) -> Result<()> {
        self.validate(weights, optimizer)?;
        optimizer.restore(self.optimizer)?;
        weights.restore(self.weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initializer::Initializer;

    fn grad(pairs: &[(&'static str, f64)]) -> Gradient<&'static str> {
        pairs.iter().copied().collect()
    }

    fn all_configs() -> Vec<OptimizerConfig> {
        vec![
            OptimizerConfig::sgd(0.1),
            OptimizerConfig::default_momentum(),
            OptimizerConfig::default_ada_max(),
            OptimizerConfig::default_ada_bound(),
        ]
    }

    #[test]
    fn test_counter_starts_at_zero_and_increments() {
        for config in all_configs() {
            let mut optimizer: Optimizer<&str> = config.build().unwrap();
            let mut weights = SparseWeights::new(Initializer::Zeros);
            assert_eq!(optimizer.n_iterations(), 0);

            optimizer.update_after_pred(&mut weights, &grad(&[("a", 1.0), ("b", 2.0)]));
            assert_eq!(optimizer.n_iterations(), 1);

            // empty gradient still counts as an iteration
            optimizer.update_after_pred(&mut weights, &Gradient::new());
            assert_eq!(optimizer.n_iterations(), 2);
        }
    }

    #[test]
    fn test_untouched_keys_are_unchanged() {
        for config in all_configs() {
            let mut optimizer: Optimizer<&str> = config.build().unwrap();
            let mut weights = SparseWeights::new(Initializer::Zeros);
            weights.set("untouched", 3.25);

            optimizer.update_after_pred(&mut weights, &grad(&[("a", 1.0)]));
            optimizer.update_after_pred(&mut weights, &grad(&[("a", -0.5)]));

            assert_eq!(weights.get(&"untouched"), Some(&3.25), "{}", config.name());
            assert!(!optimizer.has_state(&"untouched"));
        }
    }

    #[test]
    fn test_update_before_pred_is_identity() {
        for config in all_configs() {
            let mut optimizer: Optimizer<&str> = config.build().unwrap();
            let mut weights = SparseWeights::new(Initializer::Zeros);
            weights.set("a", 1.0);

            optimizer.update_before_pred(&mut weights);

            assert_eq!(weights.get(&"a"), Some(&1.0));
            assert_eq!(weights.len(), 1);
            assert_eq!(optimizer.n_iterations(), 0);
        }
    }

    #[test]
    fn test_momentum_reference_sequence() {
        let mut optimizer: Optimizer<&str> = Optimizer::momentum(0.1, 0.9).unwrap();
        let mut weights = SparseWeights::new(Initializer::Zeros);
        weights.set("w", 5.0);

        optimizer.update_after_pred(&mut weights, &grad(&[("w", 1.0)]));
        assert!((weights.get(&"w").unwrap() - 4.9).abs() < 1e-12);

        optimizer.update_after_pred(&mut weights, &grad(&[("w", 1.0)]));
        assert!((weights.get(&"w").unwrap() - 4.71).abs() < 1e-12);

        let Rule::Momentum(rule) = optimizer.rule() else {
            panic!("expected momentum rule");
        };
        assert!((rule.velocity(&"w").unwrap() - 0.19).abs() < 1e-12);
    }

    #[test]
    fn test_scheduled_learning_rate() {
        let schedule = LearningRate::InverseScaling { lr: 1.0, power: 1.0 };
        let mut optimizer: Optimizer<&str> = Optimizer::sgd(schedule).unwrap();
        let mut weights = SparseWeights::new(Initializer::Zeros);

        assert_eq!(optimizer.learning_rate(), 1.0);
        optimizer.update_after_pred(&mut weights, &grad(&[("w", 1.0)]));
        assert_eq!(optimizer.learning_rate(), 0.5);
        optimizer.update_after_pred(&mut weights, &grad(&[("w", 1.0)]));

        assert!((weights.get(&"w").unwrap() + 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_configs_fail_fast() {
        assert!(Optimizer::<&str>::sgd(f64::NAN).is_err());
        assert!(Optimizer::<&str>::sgd(-0.1).is_err());
        assert!(Optimizer::<&str>::momentum(0.1, 1.5).is_err());
        assert!(Optimizer::<&str>::ada_max(0.1, 0.9, 0.999, 0.0).is_err());
        assert!(Optimizer::<&str>::ada_max(0.1, 1.0, 0.999, 1e-8).is_err());
        assert!(Optimizer::<&str>::ada_bound(1e-3, 0.9, 0.999, 1e-8, 0.0, 0.1).is_err());
        assert!(Optimizer::<&str>::ada_bound(1e-3, 0.9, 0.999, 1e-8, 1e-3, f64::INFINITY).is_err());
    }

    #[test]
    fn test_config_round_trip() {
        for config in all_configs() {
            let optimizer: Optimizer<u32> = config.build().unwrap();
            assert_eq!(optimizer.config(), config);
        }
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original: Optimizer<&str> = Optimizer::ada_max(0.1, 0.9, 0.999, 1e-8).unwrap();
        let mut weights = SparseWeights::new(Initializer::Zeros);
        original.update_after_pred(&mut weights, &grad(&[("a", 1.0)]));

        let mut copy = original.clone();
        let mut copy_weights = weights.clone();
        copy.update_after_pred(&mut copy_weights, &grad(&[("a", 5.0), ("b", 1.0)]));

        assert_eq!(original.n_iterations(), 1);
        assert!(!original.has_state(&"b"));
        let Rule::AdaMax(rule) = original.rule() else {
            panic!("expected adamax rule");
        };
        assert!((rule.first_moment(&"a").unwrap() - 0.1).abs() < 1e-12);
        assert_ne!(weights.get(&"a"), copy_weights.get(&"a"));
    }

    #[test]
    fn test_snapshot_restore() {
        let mut optimizer: Optimizer<&str> = Optimizer::default_momentum_for_tests();
        let mut weights = SparseWeights::new(Initializer::Zeros);
        optimizer.update_after_pred(&mut weights, &grad(&[("a", 1.0)]));
        optimizer.update_after_pred(&mut weights, &grad(&[("a", 1.0), ("b", 2.0)]));

        let snapshot = ParameterSnapshot::capture(&weights, &optimizer);
        assert_eq!(snapshot.optimizer.n_iterations, 2);
        assert_eq!(snapshot.optimizer.slots.len(), 1);

        let mut restored_optimizer: Optimizer<&str> = Optimizer::default_momentum_for_tests();
        let mut restored_weights = SparseWeights::new(Initializer::Zeros);
        snapshot
            .apply(&mut restored_weights, &mut restored_optimizer)
            .unwrap();

        // both continue identically
        optimizer.update_after_pred(&mut weights, &grad(&[("a", 0.3)]));
        restored_optimizer.update_after_pred(&mut restored_weights, &grad(&[("a", 0.3)]));
        assert_eq!(weights.get(&"a"), restored_weights.get(&"a"));
        assert_eq!(restored_optimizer.n_iterations(), 3);
    }

    #[test]
    fn test_restore_rejects_wrong_slot_count() {
        let mut optimizer: Optimizer<&str> = Optimizer::ada_max(0.1, 0.9, 0.999, 1e-8).unwrap();
        let snapshot = OptimizerSnapshot {
            n_iterations: 4,
            slots: vec![HashMap::new()],
        };
        assert!(matches!(
            optimizer.restore(snapshot),
            Err(LearningError::InvalidCheckpoint(_))
        ));
        assert_eq!(optimizer.n_iterations(), 0);
    }

    #[test]
    fn test_reset() {
        let mut optimizer: Optimizer<&str> = Optimizer::default_momentum_for_tests();
        let mut weights = SparseWeights::new(Initializer::Zeros);
        optimizer.update_after_pred(&mut weights, &grad(&[("a", 1.0)]));

        optimizer.reset();
        assert_eq!(optimizer.n_iterations(), 0);
        assert!(!optimizer.has_state(&"a"));
    }

    #[test]
    fn test_vector_values() {
        let mut optimizer: Optimizer<&str, Vec<f64>> =
            OptimizerConfig::default_ada_bound().build().unwrap();
        let mut latents = SparseWeights::latent(Initializer::constant(0.1).unwrap(), 3);
        let gradient: Gradient<&str, Vec<f64>> =
            [("u", vec![1.0, 0.0, -1.0])].into_iter().collect();

        optimizer.update_after_pred(&mut latents, &gradient);

        let u = latents.get(&"u").unwrap();
        assert!(u[0] < 0.1);
        assert_eq!(u[1], 0.1);
        assert!(u[2] > 0.1);
    }

    #[test]
    fn test_apply_rejects_short_state_vectors() {
        let mut optimizer: Optimizer<&str, Vec<f64>> =
            OptimizerConfig::default_ada_max().build().unwrap();
        let mut latents = SparseWeights::latent(Initializer::constant(0.1).unwrap(), 3);
        let gradient: Gradient<&str, Vec<f64>> =
            [("u", vec![1.0, 0.0, -1.0])].into_iter().collect();
        optimizer.update_after_pred(&mut latents, &gradient);
        let before = ParameterSnapshot::capture(&latents, &optimizer);

        // weights fit, but the moments have 2 components instead of 3
        let mut snapshot = before.clone();
        snapshot.weights.insert("v", vec![0.0; 3]);
        snapshot.optimizer.n_iterations = 7;
        snapshot.optimizer.slots[0].insert("u", vec![0.0; 2]);

        assert!(matches!(
            snapshot.apply(&mut latents, &mut optimizer),
            Err(LearningError::InvalidCheckpoint(_))
        ));
        assert_eq!(ParameterSnapshot::capture(&latents, &optimizer), before);
        assert_eq!(optimizer.n_iterations(), 1);
    }

    #[test]
    fn test_apply_rejects_bad_weights_before_touching_optimizer() {
        let mut optimizer: Optimizer<&str, Vec<f64>> =
            OptimizerConfig::default_momentum().build().unwrap();
        let mut latents = SparseWeights::latent(Initializer::Zeros, 2);
        let before = ParameterSnapshot::capture(&latents, &optimizer);

        let snapshot = ParameterSnapshot {
            weights: [("u", vec![1.0])].into_iter().collect(),
            optimizer: OptimizerSnapshot {
                n_iterations: 5,
                slots: vec![HashMap::new()],
            },
        };

        assert!(snapshot.apply(&mut latents, &mut optimizer).is_err());
        assert_eq!(ParameterSnapshot::capture(&latents, &optimizer), before);
    }

    impl<K: Eq + Hash + Clone, V: Param> Optimizer<K, V> {
        fn default_momentum_for_tests() -> Self {
            OptimizerConfig::default_momentum().build().unwrap()
        }
    }
}
