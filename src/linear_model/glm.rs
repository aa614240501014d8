//! Generalized linear models: a shared update loop parameterized by the loss.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::base::{Classifier, Features, Regressor};
use crate::initializer::Initializer;
use crate::learning::{
    LearningError, Result, ensure_finite, ensure_non_negative, ensure_positive,
};
use crate::loss::{BinaryLoss, RegressionLoss};
use crate::math::{clamp, sigmoid, sparse_dot};
use crate::optim::{Gradient, LearningRate, Optimizer, OptimizerConfig, ParameterSnapshot};
use crate::weights::SparseWeights;

/// Default learning rate of the intercept
pub const DEFAULT_INTERCEPT_LR: f64 = 0.01;

/// Default absolute bound on the loss gradient
pub const DEFAULT_CLIP_GRADIENT: f64 = 1e12;

/// Configuration of a linear model with loss `L`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GlmConfig<L> {
    /// Optimizer for the feature weights (default: SGD, lr=0.01).
    pub optimizer: OptimizerConfig,
    /// Loss to minimize.
    pub loss: L,
    /// L2 penalty on the feature weights (default: 0).
    pub l2: f64,
    /// Initial intercept (default: 0).
    pub intercept: f64,
    /// Whether the intercept is learned (default: true).
    pub fit_intercept: bool,
    /// Learning rate of the intercept, evaluated at the optimizer's iteration count.
    pub intercept_lr: LearningRate,
    /// Absolute bound on the loss gradient (default: 1e12).
    pub clip_gradient: f64,
    /// Values of weights the optimizer materializes (default: zeros).
    pub initializer: Initializer,
}

pub type LinearRegressionConfig = GlmConfig<RegressionLoss>;
pub type LogisticRegressionConfig = GlmConfig<BinaryLoss>;

impl<L: Default> Default for GlmConfig<L> {
    fn default() -> Self {
        Self {
            optimizer: OptimizerConfig::default(),
            loss: L::default(),
            l2: 0.0,
            intercept: 0.0,
            fit_intercept: true,
            intercept_lr: LearningRate::from(DEFAULT_INTERCEPT_LR),
            clip_gradient: DEFAULT_CLIP_GRADIENT,
            initializer: Initializer::Zeros,
        }
    }
}

impl<L> GlmConfig<L> {
    pub fn validate(&self) -> Result<()> {
        self.optimizer.validate()?;
        ensure_non_negative("l2", self.l2)?;
        ensure_finite("intercept", self.intercept)?;
        self.intercept_lr.validate()?;
        ensure_positive("clip_gradient", self.clip_gradient)
    }
}

/// Learned state of a linear model, in snapshot form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlmSnapshot<K: Eq + Hash> {
    pub parameters: ParameterSnapshot<K, f64>,
    pub intercept: f64,
}

/// Weights, optimizer and intercept shared by the linear models.
#[derive(Clone, Debug)]
struct Glm<K> {
    weights: SparseWeights<K>,
    optimizer: Optimizer<K>,
    intercept: f64,
    fit_intercept: bool,
    intercept_lr: LearningRate,
    l2: f64,
    clip_gradient: f64,
}

impl<K> Default for Glm<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self {
            weights: SparseWeights::new(Initializer::Zeros),
            optimizer: Optimizer::default(),
            intercept: 0.0,
            fit_intercept: true,
            intercept_lr: LearningRate::from(DEFAULT_INTERCEPT_LR),
            l2: 0.0,
            clip_gradient: DEFAULT_CLIP_GRADIENT,
        }
    }
}

impl<K> Glm<K>
where
    K: Eq + Hash + Clone,
{
    fn new<L>(config: &GlmConfig<L>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            weights: SparseWeights::new(config.initializer.clone()),
            optimizer: config.optimizer.build()?,
            intercept: config.intercept,
            fit_intercept: config.fit_intercept,
            intercept_lr: config.intercept_lr,
            l2: config.l2,
            clip_gradient: config.clip_gradient,
        })
    }

    /// `w . x + intercept`. Weights never seen read as 0.
    #[inline]
    fn raw_dot(&self, x: &Features<K>) -> f64 {
        sparse_dot(x, |i| self.weights.get(i).copied()) + self.intercept
    }

    /// One step of the update loop; `loss_gradient` maps the raw prediction to
    /// the derivative of the loss.
    fn fit_one<F>(&mut self, x: &Features<K>, loss_gradient: F)
    where
        F: FnOnce(f64) -> f64,
    {
        self.optimizer.update_before_pred(&mut self.weights);

        let y_pred = self.raw_dot(x);
        let g = clamp(loss_gradient(y_pred), -self.clip_gradient, self.clip_gradient);

        let gradient: Gradient<K> = x
            .iter()
            .map(|(i, xi)| {
                let wi = self.weights.get(i).copied().unwrap_or(0.0);
                (i.clone(), xi * g + self.l2 * wi)
            })
            .collect();
        self.optimizer.update_after_pred(&mut self.weights, &gradient);

        if self.fit_intercept {
            self.intercept -= self.intercept_lr.rate(self.optimizer.n_iterations()) * g;
        }
    }

    fn snapshot(&self) -> GlmSnapshot<K> {
        GlmSnapshot {
            parameters: ParameterSnapshot::capture(&self.weights, &self.optimizer),
            intercept: self.intercept,
        }
    }

    fn restore(&mut self, snapshot: GlmSnapshot<K>) -> Result<()> {
        ensure_finite("intercept", snapshot.intercept)
            .map_err(|e| LearningError::InvalidCheckpoint(e.to_string()))?;
        snapshot
            .parameters
            .apply(&mut self.weights, &mut self.optimizer)?;
        self.intercept = snapshot.intercept;
        Ok(())
    }

    fn check_finite(&self) -> Result<()>
    where
        K: Debug,
    {
        if !self.intercept.is_finite() {
            log::warn!("Non-finite intercept: {}", self.intercept);
            return Err(LearningError::Divergence(format!(
                "non-finite intercept: {}",
                self.intercept
            )));
        }
        self.weights.check_finite()
    }
}

/// Accessors and persistence shared by both linear models.
macro_rules! impl_glm_accessors {
    ($model:ident) => {
        impl<K> $model<K>
        where
            K: Eq + Hash + Clone,
        {
            /// Feature weights.
            pub fn weights(&self) -> &SparseWeights<K> {
                &self.glm.weights
            }

            pub fn intercept(&self) -> f64 {
                self.glm.intercept
            }

            /// Optimizer of the feature weights.
            pub fn optimizer(&self) -> &Optimizer<K> {
                &self.glm.optimizer
            }

            /// Copy of the weights, optimizer state and intercept.
            pub fn snapshot(&self) -> GlmSnapshot<K> {
                self.glm.snapshot()
            }

            /// Restore state captured by [`Self::snapshot`] on a model built with the
            /// same optimizer.
            pub fn restore(&mut self, snapshot: GlmSnapshot<K>) -> Result<()> {
                self.glm.restore(snapshot)
            }

            /// Fail with `LearningError::Divergence` if any parameter is NaN or infinite.
            pub fn check_finite(&self) -> Result<()>
            where
                K: Debug,
            {
                self.glm.check_finite()
            }
        }
    };
}

/// Online linear regression.
///
/// # Example
///
/// ```
/// use streamlearn::base::{Features, Regressor};
/// use streamlearn::linear_model::{LinearRegression, LinearRegressionConfig};
///
/// let mut model = LinearRegression::new(LinearRegressionConfig::default()).unwrap();
/// for (xi, y) in [(1.0, 3.0), (2.0, 5.0), (3.0, 7.0)] {
///     let x: Features<&str> = [("x", xi)].into_iter().collect();
///     model.fit_one(&x, y);
/// }
///
/// let x: Features<&str> = [("x", 4.0)].into_iter().collect();
/// assert!((model.predict_one(&x) - 1.441619).abs() < 1e-6);
/// ```
#[derive(Clone, Debug)]
pub struct LinearRegression<K> {
    glm: Glm<K>,
    loss: RegressionLoss,
}

impl<K> Default for LinearRegression<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self {
            glm: Glm::default(),
            loss: RegressionLoss::default(),
        }
    }
}

impl<K> LinearRegression<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new(config: LinearRegressionConfig) -> Result<Self> {
        Ok(Self {
            glm: Glm::new(&config)?,
            loss: config.loss,
        })
    }

    pub fn loss(&self) -> RegressionLoss {
        self.loss
    }
}

impl_glm_accessors!(LinearRegression);

impl<K> Regressor<K> for LinearRegression<K>
where
    K: Eq + Hash + Clone,
{
    fn fit_one(&mut self, x: &Features<K>, y: f64) -> &mut Self {
        let loss = self.loss;
        self.glm.fit_one(x, |y_pred| loss.gradient(y, y_pred));
        self
    }

    fn predict_one(&self, x: &Features<K>) -> f64 {
        self.glm.raw_dot(x)
    }
}

/// Online logistic regression on boolean targets.
#[derive(Clone, Debug)]
pub struct LogisticRegression<K> {
    glm: Glm<K>,
    loss: BinaryLoss,
}

impl<K> Default for LogisticRegression<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self {
            glm: Glm::default(),
            loss: BinaryLoss::default(),
        }
    }
}

impl<K> LogisticRegression<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new(config: LogisticRegressionConfig) -> Result<Self> {
        Ok(Self {
            glm: Glm::new(&config)?,
            loss: config.loss,
        })
    }

    pub fn loss(&self) -> BinaryLoss {
        self.loss
    }

    /// Probability that the target of `x` is `true`.
    pub fn predict_proba(&self, x: &Features<K>) -> f64 {
        sigmoid(self.glm.raw_dot(x))
    }
}

impl_glm_accessors!(LogisticRegression);

impl<K> Classifier<K, bool> for LogisticRegression<K>
where
    K: Eq + Hash + Clone,
{
    fn fit_one(&mut self, x: &Features<K>, y: &bool) -> &mut Self {
        let loss = self.loss;
        let y = *y;
        self.glm.fit_one(x, |y_pred| loss.gradient(y, y_pred));
        self
    }

    fn predict_proba_one(&self, x: &Features<K>) -> HashMap<bool, f64> {
        let p = self.predict_proba(x);
        HashMap::from([(true, p), (false, 1.0 - p)])
    }

    fn predict_one(&self, x: &Features<K>) -> Option<bool> {
        Some(self.predict_proba(x) >= 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(pairs: &[(&'static str, f64)]) -> Features<&'static str> {
        pairs.iter().copied().collect()
    }

    // ========== LinearRegression ==========

    #[test]
    fn test_linear_regression_reference_values() {
        let mut model: LinearRegression<&str> = LinearRegression::default();

        for (xi, y) in [(1.0, 3.0), (2.0, 5.0), (3.0, 7.0)] {
            model.fit_one(&features(&[("x", xi)]), y);
        }

        assert!((model.weights().get(&"x").unwrap() - 0.324289).abs() < 1e-9);
        assert!((model.intercept() - 0.144463).abs() < 1e-9);
        assert!((model.predict_one(&features(&[("x", 4.0)])) - 1.441619).abs() < 1e-9);
        assert_eq!(model.optimizer().n_iterations(), 3);
    }

    #[test]
    fn test_predict_does_not_materialize() {
        let model: LinearRegression<&str> = LinearRegression::default();
        assert_eq!(model.predict_one(&features(&[("unseen", 10.0)])), 0.0);
        assert!(model.weights().is_empty());
    }

    #[test]
    fn test_untouched_features_keep_their_weight() {
        let mut model: LinearRegression<&str> = LinearRegression::default();
        model.fit_one(&features(&[("a", 1.0)]), 2.0);
        let a = *model.weights().get(&"a").unwrap();

        model.fit_one(&features(&[("b", 1.0)]), 2.0);

        assert_eq!(*model.weights().get(&"a").unwrap(), a);
    }

    #[test]
    fn test_l2_shrinks_weights() {
        let plain_config = LinearRegressionConfig {
            fit_intercept: false,
            ..Default::default()
        };
        let l2_config = LinearRegressionConfig {
            l2: 1.0,
            ..plain_config.clone()
        };
        let mut plain = LinearRegression::new(plain_config).unwrap();
        let mut regularized = LinearRegression::new(l2_config).unwrap();

        for _ in 0..50 {
            plain.fit_one(&features(&[("x", 1.0)]), 1.0);
            regularized.fit_one(&features(&[("x", 1.0)]), 1.0);
        }

        let w_plain = *plain.weights().get(&"x").unwrap();
        let w_l2 = *regularized.weights().get(&"x").unwrap();
        assert!(w_l2 < w_plain);
        assert!(w_l2 > 0.0);
    }

    #[test]
    fn test_clip_gradient() {
        let config = LinearRegressionConfig {
            optimizer: OptimizerConfig::sgd(1.0),
            clip_gradient: 0.5,
            fit_intercept: false,
            ..Default::default()
        };
        let mut model = LinearRegression::new(config).unwrap();

        model.fit_one(&features(&[("x", 1.0)]), 1000.0);

        assert_eq!(*model.weights().get(&"x").unwrap(), 0.5);
    }

    #[test]
    fn test_fixed_intercept() {
        let config = LinearRegressionConfig {
            intercept: 2.0,
            fit_intercept: false,
            ..Default::default()
        };
        let mut model = LinearRegression::new(config).unwrap();
        model.fit_one(&features(&[("x", 1.0)]), 10.0);

        assert_eq!(model.intercept(), 2.0);
    }

    #[test]
    fn test_invalid_config() {
        let config = LinearRegressionConfig {
            l2: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            LinearRegression::<&str>::new(config),
            Err(LearningError::Config(_))
        ));

        let config = LinearRegressionConfig {
            clip_gradient: 0.0,
            ..Default::default()
        };
        assert!(LinearRegression::<&str>::new(config).is_err());
    }

    #[test]
    fn test_snapshot_round_trip_continues_identically() {
        let config = LinearRegressionConfig {
            optimizer: OptimizerConfig::default_ada_max(),
            ..Default::default()
        };
        let mut model: LinearRegression<&str> = LinearRegression::new(config.clone()).unwrap();
        model.fit_one(&features(&[("a", 1.0), ("b", -2.0)]), 1.0);

        let mut restored: LinearRegression<&str> = LinearRegression::new(config).unwrap();
        restored.restore(model.snapshot()).unwrap();

        let x = features(&[("a", 0.5)]);
        model.fit_one(&x, 2.0);
        restored.fit_one(&x, 2.0);
        assert_eq!(model.predict_one(&x), restored.predict_one(&x));
    }

    #[test]
    fn test_check_finite() {
        let mut model: LinearRegression<&str> = LinearRegression::default();
        model.fit_one(&features(&[("x", 1.0)]), 1.0);
        assert!(model.check_finite().is_ok());

        model.fit_one(&features(&[("x", f64::NAN)]), 1.0);
        assert!(matches!(
            model.check_finite(),
            Err(LearningError::Divergence(_))
        ));
    }

    // ========== LogisticRegression ==========

    #[test]
    fn test_logistic_regression_separates() {
        let mut model: LogisticRegression<&str> = LogisticRegression::new(LogisticRegressionConfig {
            optimizer: OptimizerConfig::sgd(0.5),
            ..Default::default()
        })
        .unwrap();

        for _ in 0..100 {
            model.fit_one(&features(&[("x", 1.0)]), &true);
            model.fit_one(&features(&[("x", -1.0)]), &false);
        }

        assert!(model.predict_proba(&features(&[("x", 1.0)])) > 0.9);
        assert_eq!(model.predict_one(&features(&[("x", -1.0)])), Some(false));
    }

    #[test]
    fn test_logistic_probabilities_sum_to_one() {
        let mut model: LogisticRegression<&str> = LogisticRegression::default();
        model.fit_one(&features(&[("x", 1.0)]), &true);

        let proba = model.predict_proba_one(&features(&[("x", 2.0)]));
        assert!((proba[&true] + proba[&false] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_logistic_first_step() {
        // raw prediction 0 -> sigmoid 0.5 -> gradient -0.5
        let mut model: LogisticRegression<&str> = LogisticRegression::default();
        model.fit_one(&features(&[("x", 2.0)]), &true);

        assert!((model.weights().get(&"x").unwrap() - 0.01).abs() < 1e-12);
        assert!((model.intercept() - 0.005).abs() < 1e-12);
    }

    #[test]
    fn test_hinge_loss_stops_inside_margin() {
        let mut model: LogisticRegression<&str> = LogisticRegression::new(LogisticRegressionConfig {
            loss: BinaryLoss::Hinge,
            optimizer: OptimizerConfig::sgd(1.0),
            fit_intercept: false,
            ..Default::default()
        })
        .unwrap();

        model.fit_one(&features(&[("x", 2.0)]), &true);
        let w = *model.weights().get(&"x").unwrap();
        assert_eq!(w, 2.0);

        // margin y*z = 4 >= 1: no further change
        model.fit_one(&features(&[("x", 1.0)]), &true);
        assert_eq!(*model.weights().get(&"x").unwrap(), w);
    }
}
