//! Baseline recommender: global mean plus user and item biases.

use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::initializer::Initializer;
use crate::learning::{Result, ensure_non_negative, ensure_positive};
use crate::linear_model::DEFAULT_CLIP_GRADIENT;
use crate::loss::RegressionLoss;
use crate::math::clamp;
use crate::optim::{Gradient, Optimizer, OptimizerConfig, ParameterSnapshot};
use crate::reco::Recommender;
use crate::stats::Mean;
use crate::weights::SparseWeights;

/// Configuration of [`Baseline`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Optimizer copied for the user and the item biases (default: SGD, lr=0.01).
    pub optimizer: OptimizerConfig,
    pub loss: RegressionLoss,
    /// L2 penalty on the biases (default: 0).
    pub l2: f64,
    /// Initial biases (default: zeros).
    pub initializer: Initializer,
    /// Absolute bound on the loss gradient (default: 1e12).
    pub clip_gradient: f64,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            optimizer: OptimizerConfig::default(),
            loss: RegressionLoss::Squared,
            l2: 0.0,
            initializer: Initializer::Zeros,
            clip_gradient: DEFAULT_CLIP_GRADIENT,
        }
    }
}

impl BaselineConfig {
    pub fn validate(&self) -> Result<()> {
        self.optimizer.validate()?;
        ensure_non_negative("l2", self.l2)?;
        ensure_positive("clip_gradient", self.clip_gradient)
    }
}

/// Learned state of a [`Baseline`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BaselineSnapshot<U: Eq + Hash, I: Eq + Hash> {
    pub global_mean: Mean,
    pub users: ParameterSnapshot<U, f64>,
    pub items: ParameterSnapshot<I, f64>,
}

/// Baseline recommender.
///
/// # Example
///
/// ```
/// use streamlearn::optim::OptimizerConfig;
/// use streamlearn::reco::{Baseline, BaselineConfig, Recommender};
///
/// let mut model = Baseline::new(BaselineConfig {
///     optimizer: OptimizerConfig::sgd(0.005),
///     ..Default::default()
/// })
/// .unwrap();
///
/// model.fit_one(&"Alice", &"Superman", 8.0);
/// model.fit_one(&"Bob", &"Superman", 6.0);
///
/// let rating = model.predict_one(&"Bob", &"Terminator");
/// assert!(rating > 6.0 && rating < 8.0);
/// ```
#[derive(Clone, Debug)]
pub struct Baseline<U, I> {
    global_mean: Mean,
    u_biases: SparseWeights<U>,
    i_biases: SparseWeights<I>,
    u_optimizer: Optimizer<U>,
    i_optimizer: Optimizer<I>,
    loss: RegressionLoss,
    l2: f64,
    clip_gradient: f64,
}

impl<U, I> Baseline<U, I>
where
    U: Eq + Hash + Clone + Debug,
    I: Eq + Hash + Clone + Debug,
{
    pub fn new(config: BaselineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            global_mean: Mean::new(),
            u_biases: SparseWeights::new(config.initializer.clone()),
            i_biases: SparseWeights::new(config.initializer),
            u_optimizer: config.optimizer.build()?,
            i_optimizer: config.optimizer.build()?,
            loss: config.loss,
            l2: config.l2,
            clip_gradient: config.clip_gradient,
        })
    }

    pub fn global_mean(&self) -> f64 {
        self.global_mean.get()
    }

    pub fn user_biases(&self) -> &SparseWeights<U> {
        &self.u_biases
    }

    pub fn item_biases(&self) -> &SparseWeights<I> {
        &self.i_biases
    }

    pub fn user_optimizer(&self) -> &Optimizer<U> {
        &self.u_optimizer
    }

    pub fn item_optimizer(&self) -> &Optimizer<I> {
        &self.i_optimizer
    }

    /// Bias of `user`, registering it when unseen.
    fn user_bias(&mut self, user: &U) -> f64 {
        if !self.u_biases.contains_key(user) {
            log::debug!("Registering user {:?}", user);
        }
        *self.u_biases.get_or_init(user)
    }

    /// Bias of `item`, registering it when unseen.
    fn item_bias(&mut self, item: &I) -> f64 {
        if !self.i_biases.contains_key(item) {
            log::debug!("Registering item {:?}", item);
        }
        *self.i_biases.get_or_init(item)
    }

    pub fn snapshot(&self) -> BaselineSnapshot<U, I> {
        BaselineSnapshot {
            global_mean: self.global_mean.clone(),
            users: ParameterSnapshot::capture(&self.u_biases, &self.u_optimizer),
            items: ParameterSnapshot::capture(&self.i_biases, &self.i_optimizer),
        }
    }

    /// Restore state captured by [`Self::snapshot`]. On error the model is unchanged.
    pub fn restore(&mut self, snapshot: BaselineSnapshot<U, I>) -> Result<()> {
        snapshot.users.validate(&self.u_biases, &self.u_optimizer)?;
        snapshot.items.validate(&self.i_biases, &self.i_optimizer)?;

        snapshot
            .users
            .apply(&mut self.u_biases, &mut self.u_optimizer)?;
        snapshot
            .items
            .apply(&mut self.i_biases, &mut self.i_optimizer)?;
        self.global_mean = snapshot.global_mean;
        Ok(())
    }

    pub fn check_finite(&self) -> Result<()> {
        self.u_biases.check_finite()?;
        self.i_biases.check_finite()
    }
}

impl<U, I> Recommender<U, I> for Baseline<U, I>
where
    U: Eq + Hash + Clone + Debug,
    I: Eq + Hash + Clone + Debug,
{
    fn fit_one(&mut self, user: &U, item: &I, y: f64) -> &mut Self {
        self.u_optimizer.update_before_pred(&mut self.u_biases);
        self.i_optimizer.update_before_pred(&mut self.i_biases);

        self.global_mean.update(y);

        let y_pred = self.predict_one(user, item);
        let g = clamp(
            self.loss.gradient(y, y_pred),
            -self.clip_gradient,
            self.clip_gradient,
        );

        let u_bias = self.user_bias(user);
        let i_bias = self.item_bias(item);
        let u_grad: Gradient<U> = Gradient::from([(user.clone(), g + self.l2 * u_bias)]);
        let i_grad: Gradient<I> = Gradient::from([(item.clone(), g + self.l2 * i_bias)]);

        self.u_optimizer.update_after_pred(&mut self.u_biases, &u_grad);
        self.i_optimizer.update_after_pred(&mut self.i_biases, &i_grad);

        self
    }

    fn predict_one(&mut self, user: &U, item: &I) -> f64 {
        self.global_mean.get() + self.user_bias(user) + self.item_bias(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratings() -> Vec<(&'static str, &'static str, f64)> {
        vec![
            ("Alice", "Superman", 8.0),
            ("Alice", "Terminator", 9.0),
            ("Alice", "Star Wars", 8.0),
            ("Alice", "Notting Hill", 2.0),
            ("Alice", "Harry Potter", 5.0),
            ("Bob", "Superman", 8.0),
            ("Bob", "Terminator", 9.0),
            ("Bob", "Star Wars", 8.0),
            ("Bob", "Notting Hill", 2.0),
        ]
    }

    fn sgd_baseline(lr: f64) -> Baseline<&'static str, &'static str> {
        Baseline::new(BaselineConfig {
            optimizer: OptimizerConfig::sgd(lr),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_reference_prediction() {
        let mut model = sgd_baseline(0.005);
        for (user, item, y) in ratings() {
            model.fit_one(&user, &item, y);
        }

        let prediction = model.predict_one(&"Bob", &"Harry Potter");
        assert!((prediction - 6.546827734027778).abs() < 1e-12);
    }

    #[test]
    fn test_global_mean_updated_before_gradient() {
        // mean becomes 4 before predicting, so the gradient is 4 - 4 = 0
        let mut model = sgd_baseline(0.1);
        model.fit_one(&"u", &"i", 4.0);

        assert_eq!(model.global_mean(), 4.0);
        assert_eq!(model.user_biases().get(&"u"), Some(&0.0));
        assert_eq!(model.item_biases().get(&"i"), Some(&0.0));
    }

    #[test]
    fn test_second_example() {
        let mut model = sgd_baseline(0.1);
        model.fit_one(&"u", &"i", 4.0);
        model.fit_one(&"v", &"i", 8.0);

        // mean 6, prediction 6 + 0 + 0, gradient -2
        assert!((model.user_biases().get(&"v").unwrap() - 0.2).abs() < 1e-12);
        assert!((model.item_biases().get(&"i").unwrap() - 0.2).abs() < 1e-12);
        assert_eq!(model.user_biases().get(&"u"), Some(&0.0));
    }

    #[test]
    fn test_predict_registers_unseen_ids() {
        let mut model = sgd_baseline(0.01);
        assert!(model.user_biases().is_empty());

        model.predict_one(&"new user", &"new item");

        assert!(model.user_biases().contains_key(&"new user"));
        assert!(model.item_biases().contains_key(&"new item"));
    }

    #[test]
    fn test_optimizers_are_separate() {
        let mut model = sgd_baseline(0.01);
        model.fit_one(&"u", &"i", 1.0);
        model.fit_one(&"u", &"j", 2.0);

        assert_eq!(model.user_optimizer().n_iterations(), 2);
        assert_eq!(model.item_optimizer().n_iterations(), 2);
    }

    #[test]
    fn test_clip_gradient() {
        let mut model: Baseline<&str, &str> = Baseline::new(BaselineConfig {
            optimizer: OptimizerConfig::sgd(1.0),
            clip_gradient: 0.25,
            ..Default::default()
        })
        .unwrap();
        model.fit_one(&"u", &"i", 0.0);
        model.fit_one(&"u", &"i", 1000.0);

        assert_eq!(model.user_biases().get(&"u"), Some(&0.25));
    }

    #[test]
    fn test_snapshot_restore() {
        let mut model = sgd_baseline(0.005);
        for (user, item, y) in ratings() {
            model.fit_one(&user, &item, y);
        }

        let mut restored = sgd_baseline(0.005);
        restored.restore(model.snapshot()).unwrap();

        assert_eq!(
            model.predict_one(&"Alice", &"Superman"),
            restored.predict_one(&"Alice", &"Superman")
        );
        assert_eq!(restored.user_optimizer().n_iterations(), 9);
    }

    #[test]
    fn test_failed_restore_leaves_model_untouched() {
        let mut trained = sgd_baseline(0.005);
        for (user, item, y) in ratings() {
            trained.fit_one(&user, &item, y);
        }
        let mut snapshot = trained.snapshot();
        // SGD keeps no state, so an item slot makes the snapshot unusable
        snapshot.items.optimizer.slots.push(std::collections::HashMap::new());

        let mut model = sgd_baseline(0.005);
        model.fit_one(&"Carol", &"Alien", 3.0);
        let before = model.snapshot();

        assert!(model.restore(snapshot).is_err());
        assert_eq!(model.snapshot(), before);
        assert_eq!(model.user_optimizer().n_iterations(), 1);
        assert!(!model.user_biases().contains_key(&"Alice"));
    }

    #[test]
    fn test_invalid_config() {
        let config = BaselineConfig {
            clip_gradient: -1.0,
            ..Default::default()
        };
        assert!(Baseline::<u32, u32>::new(config).is_err());
    }
}
