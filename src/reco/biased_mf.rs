//! Biased matrix factorization.
//!
//! ```text
//! y = mean + b_u + b_i + <v_u, v_i>
//! ```
//!
//! Four parameter groups, each with its own optimizer: user biases, item biases, user
//! latent vectors and item latent vectors. All four gradients are computed from the
//! parameters as they were before the update.

use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::initializer::Initializer;
use crate::learning::{LearningError, Result, ensure_non_negative, ensure_positive};
use crate::linear_model::DEFAULT_CLIP_GRADIENT;
use crate::loss::RegressionLoss;
use crate::math::{clamp, dot};
use crate::optim::{Gradient, Optimizer, OptimizerConfig, ParameterSnapshot};
use crate::reco::Recommender;
use crate::stats::Mean;
use crate::weights::SparseWeights;

/// Default number of latent factors
pub const DEFAULT_N_FACTORS: usize = 10;

/// Standard deviation of the default latent initializer
const DEFAULT_LATENT_SIGMA: f64 = 0.1;

/// Configuration of [`BiasedMF`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BiasedMfConfig {
    /// Length of every latent vector (default: 10).
    pub n_factors: usize,
    /// Optimizer copied for the user and the item biases (default: SGD, lr=0.01).
    pub bias_optimizer: OptimizerConfig,
    /// Optimizer copied for the user and the item latent vectors (default: SGD, lr=0.01).
    pub latent_optimizer: OptimizerConfig,
    pub loss: RegressionLoss,
    /// L2 penalty on the biases (default: 0).
    pub l2_bias: f64,
    /// L2 penalty on the latent vectors (default: 0).
    pub l2_latent: f64,
    /// Initial biases (default: zeros).
    pub weight_initializer: Initializer,
    /// Initial latent vectors. `None` means `Normal(0, 0.1)` seeded with `seed`.
    pub latent_initializer: Option<Initializer>,
    /// Absolute bound on the loss gradient (default: 1e12).
    pub clip_gradient: f64,
    /// Seed of the default latent initializer.
    pub seed: Option<u64>,
}

impl Default for BiasedMfConfig {
    fn default() -> Self {
        Self {
            n_factors: DEFAULT_N_FACTORS,
            bias_optimizer: OptimizerConfig::default(),
            latent_optimizer: OptimizerConfig::default(),
            loss: RegressionLoss::Squared,
            l2_bias: 0.0,
            l2_latent: 0.0,
            weight_initializer: Initializer::Zeros,
            latent_initializer: None,
            clip_gradient: DEFAULT_CLIP_GRADIENT,
            seed: None,
        }
    }
}

impl BiasedMfConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_factors == 0 {
            return Err(LearningError::Config(
                "n_factors should be at least 1".to_string(),
            ));
        }
        self.bias_optimizer.validate()?;
        self.latent_optimizer.validate()?;
        ensure_non_negative("l2_bias", self.l2_bias)?;
        ensure_non_negative("l2_latent", self.l2_latent)?;
        ensure_positive("clip_gradient", self.clip_gradient)
    }

    /// The latent initializer, building the seeded normal default when none is set.
    fn latent_initializer(&self) -> Result<Initializer> {
        match &self.latent_initializer {
            Some(initializer) => Ok(initializer.clone()),
            None => Initializer::normal(0.0, DEFAULT_LATENT_SIGMA, self.seed),
        }
    }
}

/// Learned state of a [`BiasedMF`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BiasedMfSnapshot<U: Eq + Hash, I: Eq + Hash> {
    pub global_mean: Mean,
    pub user_biases: ParameterSnapshot<U, f64>,
    pub item_biases: ParameterSnapshot<I, f64>,
    pub user_latents: ParameterSnapshot<U, Vec<f64>>,
    pub item_latents: ParameterSnapshot<I, Vec<f64>>,
}

/// Biased matrix factorization recommender.
///
/// # Example
///
/// ```
/// use streamlearn::initializer::Initializer;
/// use streamlearn::optim::OptimizerConfig;
/// use streamlearn::reco::{BiasedMF, BiasedMfConfig, Recommender};
///
/// let mut model = BiasedMF::new(BiasedMfConfig {
///     n_factors: 3,
///     bias_optimizer: OptimizerConfig::sgd(0.025),
///     latent_optimizer: OptimizerConfig::sgd(0.025),
///     latent_initializer: Some(Initializer::normal(0.0, 0.1, Some(71)).unwrap()),
///     ..Default::default()
/// })
/// .unwrap();
///
/// model.fit_one(&1_u32, &10_u32, 4.0);
/// assert_eq!(model.user_latents().get(&1).unwrap().len(), 3);
/// ```
#[derive(Clone, Debug)]
pub struct BiasedMF<U, I> {
    n_factors: usize,
    global_mean: Mean,
    u_biases: SparseWeights<U>,
    i_biases: SparseWeights<I>,
    u_latents: SparseWeights<U, Vec<f64>>,
    i_latents: SparseWeights<I, Vec<f64>>,
    /// Draws user and item latent vectors alike, in registration order
    latent_initializer: Initializer,
    u_bias_optimizer: Optimizer<U>,
    i_bias_optimizer: Optimizer<I>,
    u_latent_optimizer: Optimizer<U, Vec<f64>>,
    i_latent_optimizer: Optimizer<I, Vec<f64>>,
    loss: RegressionLoss,
    l2_bias: f64,
    l2_latent: f64,
    clip_gradient: f64,
}

impl<U, I> BiasedMF<U, I>
where
    U: Eq + Hash + Clone + Debug,
    I: Eq + Hash + Clone + Debug,
{
    pub fn new(config: BiasedMfConfig) -> Result<Self> {
        config.validate()?;
        let latent_initializer = config.latent_initializer()?;

        Ok(Self {
            n_factors: config.n_factors,
            global_mean: Mean::new(),
            u_biases: SparseWeights::new(config.weight_initializer.clone()),
            i_biases: SparseWeights::new(config.weight_initializer.clone()),
            u_latents: SparseWeights::latent(Initializer::Zeros, config.n_factors),
            i_latents: SparseWeights::latent(Initializer::Zeros, config.n_factors),
            latent_initializer,
            u_bias_optimizer: config.bias_optimizer.build()?,
            i_bias_optimizer: config.bias_optimizer.build()?,
            u_latent_optimizer: config.latent_optimizer.build()?,
            i_latent_optimizer: config.latent_optimizer.build()?,
            loss: config.loss,
            l2_bias: config.l2_bias,
            l2_latent: config.l2_latent,
            clip_gradient: config.clip_gradient,
        })
    }

    pub fn n_factors(&self) -> usize {
        self.n_factors
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

    pub fn user_latents(&self) -> &SparseWeights<U, Vec<f64>> {
        &self.u_latents
    }

    pub fn item_latents(&self) -> &SparseWeights<I, Vec<f64>> {
        &self.i_latents
    }

    /// Optimizers in the order user bias, item bias, user latent, item latent.
    pub fn optimizers(
        &self,
    ) -> (
        &Optimizer<U>,
        &Optimizer<I>,
        &Optimizer<U, Vec<f64>>,
        &Optimizer<I, Vec<f64>>,
    ) {
        (
            &self.u_bias_optimizer,
            &self.i_bias_optimizer,
            &self.u_latent_optimizer,
            &self.i_latent_optimizer,
        )
    }

    /// Bias and latent vector of `user`, registering it when unseen.
    fn user_params(&mut self, user: &U) -> (f64, Vec<f64>) {
        if !self.u_biases.contains_key(user) {
            log::debug!("Registering user {:?}", user);
        }
        let bias = *self.u_biases.get_or_init(user);
        let latent = self.u_latents.get_or_init_with(user, &mut self.latent_initializer);
        (bias, latent.clone())
    }

    /// Bias and latent vector of `item`, registering it when unseen.
    fn item_params(&mut self, item: &I) -> (f64, Vec<f64>) {
        if !self.i_biases.contains_key(item) {
            log::debug!("Registering item {:?}", item);
        }
        let bias = *self.i_biases.get_or_init(item);
        let latent = self.i_latents.get_or_init_with(item, &mut self.latent_initializer);
        (bias, latent.clone())
    }

    pub fn snapshot(&self) -> BiasedMfSnapshot<U, I> {
        BiasedMfSnapshot {
            global_mean: self.global_mean.clone(),
            user_biases: ParameterSnapshot::capture(&self.u_biases, &self.u_bias_optimizer),
            item_biases: ParameterSnapshot::capture(&self.i_biases, &self.i_bias_optimizer),
            user_latents: ParameterSnapshot::capture(&self.u_latents, &self.u_latent_optimizer),
            item_latents: ParameterSnapshot::capture(&self.i_latents, &self.i_latent_optimizer),
        }
    }

    /// Restore state captured by [`Self::snapshot`]. Latent vectors must have
    /// `n_factors` components. On error the model is unchanged.
    pub fn restore(&mut self, snapshot: BiasedMfSnapshot<U, I>) -> Result<()> {
        snapshot
            .user_biases
            .validate(&self.u_biases, &self.u_bias_optimizer)?;
        snapshot
            .item_biases
            .validate(&self.i_biases, &self.i_bias_optimizer)?;
        snapshot
            .user_latents
            .validate(&self.u_latents, &self.u_latent_optimizer)?;
        snapshot
            .item_latents
            .validate(&self.i_latents, &self.i_latent_optimizer)?;

        snapshot
            .user_biases
            .apply(&mut self.u_biases, &mut self.u_bias_optimizer)?;
        snapshot
            .item_biases
            .apply(&mut self.i_biases, &mut self.i_bias_optimizer)?;
        snapshot
            .user_latents
            .apply(&mut self.u_latents, &mut self.u_latent_optimizer)?;
        snapshot
            .item_latents
            .apply(&mut self.i_latents, &mut self.i_latent_optimizer)?;
        self.global_mean = snapshot.global_mean;
        Ok(())
    }

    pub fn check_finite(&self) -> Result<()> {
        self.u_biases.check_finite()?;
        self.i_biases.check_finite()?;
        self.u_latents.check_finite()?;
        self.i_latents.check_finite()
    }
}

impl<U, I> Recommender<U, I> for BiasedMF<U, I>
where
    U: Eq + Hash + Clone + Debug,
    I: Eq + Hash + Clone + Debug,
{
    fn fit_one(&mut self, user: &U, item: &I, y: f64) -> &mut Self {
        self.u_bias_optimizer.update_before_pred(&mut self.u_biases);
        self.i_bias_optimizer.update_before_pred(&mut self.i_biases);
        self.u_latent_optimizer.update_before_pred(&mut self.u_latents);
        self.i_latent_optimizer.update_before_pred(&mut self.i_latents);

        self.global_mean.update(y);

        let (u_bias, u_latent) = self.user_params(user);
        let (i_bias, i_latent) = self.item_params(item);
        let y_pred = self.global_mean.get() + u_bias + i_bias + dot(&u_latent, &i_latent);

        let g = clamp(
            self.loss.gradient(y, y_pred),
            -self.clip_gradient,
            self.clip_gradient,
        );

        let l2_bias = self.l2_bias;
        let u_bias_grad: Gradient<U> = Gradient::from([(user.clone(), g + l2_bias * u_bias)]);
        let i_bias_grad: Gradient<I> = Gradient::from([(item.clone(), g + l2_bias * i_bias)]);

        let l2 = self.l2_latent;
        let u_latent_grad: Gradient<U, Vec<f64>> = Gradient::from([(
            user.clone(),
            i_latent
                .iter()
                .zip(&u_latent)
                .map(|(vi, vu)| g * vi + l2 * vu)
                .collect(),
        )]);
        let i_latent_grad: Gradient<I, Vec<f64>> = Gradient::from([(
            item.clone(),
            u_latent
                .iter()
                .zip(&i_latent)
                .map(|(vu, vi)| g * vu + l2 * vi)
                .collect(),
        )]);

        self.u_bias_optimizer
            .update_after_pred(&mut self.u_biases, &u_bias_grad);
        self.i_bias_optimizer
            .update_after_pred(&mut self.i_biases, &i_bias_grad);
        self.u_latent_optimizer
            .update_after_pred(&mut self.u_latents, &u_latent_grad);
        self.i_latent_optimizer
            .update_after_pred(&mut self.i_latents, &i_latent_grad);

        self
    }

    fn predict_one(&mut self, user: &U, item: &I) -> f64 {
        let (u_bias, u_latent) = self.user_params(user);
        let (i_bias, i_latent) = self.item_params(item);
        self.global_mean.get() + u_bias + i_bias + dot(&u_latent, &i_latent)
    }
}
