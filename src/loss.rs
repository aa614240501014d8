//! Loss functions and their gradients with respect to the prediction.
//!
//! All gradients are closed-form; nothing here differentiates automatically.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::math::sigmoid;

/// Losses for real-valued targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegressionLoss {
    /// `(y_pred - y_true)^2 / 2`, gradient `y_pred - y_true`.
    #[default]
    Squared,
    /// `|y_pred - y_true|`, gradient `sign(y_pred - y_true)`.
    Absolute,
}

impl RegressionLoss {
    pub fn eval(&self, y_true: f64, y_pred: f64) -> f64 {
        match self {
            RegressionLoss::Squared => 0.5 * (y_pred - y_true).powi(2),
            RegressionLoss::Absolute => (y_pred - y_true).abs(),
        }
    }

    #[inline]
    pub fn gradient(&self, y_true: f64, y_pred: f64) -> f64 {
        match self {
            RegressionLoss::Squared => y_pred - y_true,
            RegressionLoss::Absolute => {
                if y_pred > y_true {
                    1.0
                } else if y_pred < y_true {
                    -1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Losses for boolean targets. `y_pred` is the raw score (logit), not a probability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryLoss {
    /// Logistic loss, gradient `sigmoid(z) - y`.
    #[default]
    Log,
    /// Hinge loss with margin 1 on labels mapped to -1/+1.
    Hinge,
}

impl BinaryLoss {
    pub fn eval(&self, y_true: bool, y_pred: f64) -> f64 {
        match self {
            BinaryLoss::Log => {
                // log(1 + exp(-y*z)) with y in {-1, 1}, written to avoid overflow
                let m = -sign(y_true) * y_pred;
                if m > 0.0 {
                    m + (-m).exp().ln_1p()
                } else {
                    m.exp().ln_1p()
                }
            }
            BinaryLoss::Hinge => (1.0 - sign(y_true) * y_pred).max(0.0),
        }
    }

    #[inline]
    pub fn gradient(&self, y_true: bool, y_pred: f64) -> f64 {
        match self {
            BinaryLoss::Log => sigmoid(y_pred) - if y_true { 1.0 } else { 0.0 },
            BinaryLoss::Hinge => {
                let y = sign(y_true);
                if y * y_pred < 1.0 { -y } else { 0.0 }
            }
        }
    }
}

#[inline]
fn sign(y: bool) -> f64 {
    if y { 1.0 } else { -1.0 }
}

/// Losses over a probability distribution of labels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MultiClassLoss {
    /// Softmax cross-entropy.
    #[default]
    CrossEntropy,
}

impl MultiClassLoss {
    /// `-log(p[y_true])`, with the probability floored to avoid infinities.
    pub fn eval<L>(&self, y_true: &L, y_pred: &HashMap<L, f64>) -> f64
    where
        L: Eq + Hash,
    {
        match self {
            MultiClassLoss::CrossEntropy => {
                let p = y_pred.get(y_true).copied().unwrap_or(0.0);
                -p.max(1e-15).ln()
            }
        }
    }

    /// Gradient with respect to each label's logit.
    ///
    /// Covers every label of `y_pred` plus `y_true`: `p_l - 1` for the true label,
    /// `p_l` for the others. A true label missing from `y_pred` has probability 0 and
    /// gets `-1`, which is how a label is introduced to the model.
    pub fn gradient<L>(&self, y_true: &L, y_pred: &HashMap<L, f64>) -> HashMap<L, f64>
    where
        L: Eq + Hash + Clone,
    {
        match self {
            MultiClassLoss::CrossEntropy => {
                let mut gradient: HashMap<L, f64> = y_pred
                    .iter()
                    .map(|(label, &p)| {
                        let g = if label == y_true { p - 1.0 } else { p };
                        (label.clone(), g)
                    })
                    .collect();
                gradient.entry(y_true.clone()).or_insert(-1.0);
                gradient
            }
        }
    }
}
