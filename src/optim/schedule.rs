//! Learning-rate schedules: a function from the iteration count `n` to a rate.

use serde::{Deserialize, Serialize};

use crate::learning::{LearningError, Result, ensure_non_negative, ensure_positive};

/// Learning rate as a function of the optimizer's iteration count.
///
/// # Example
///
/// ```
/// use streamlearn::optim::LearningRate;
///
/// let constant = LearningRate::from(0.1);
/// assert_eq!(constant.rate(1_000), 0.1);
///
/// let decaying = LearningRate::InverseScaling { lr: 0.1, power: 0.5 };
/// assert!((decaying.rate(3) - 0.05).abs() < 1e-12);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LearningRate {
    /// Same rate at every iteration.
    Constant { lr: f64 },
    /// `lr / (n + 1)^power`
    InverseScaling { lr: f64, power: f64 },
    /// `lr * gamma^(n / step_size)`
    Step { lr: f64, step_size: u64, gamma: f64 },
}

impl From<f64> for LearningRate {
    fn from(lr: f64) -> Self {
        LearningRate::Constant { lr }
    }
}

impl LearningRate {
    /// Rate to use at iteration `n`.
    #[inline]
    pub fn rate(&self, n: u64) -> f64 {
        match *self {
            LearningRate::Constant { lr } => lr,
            LearningRate::InverseScaling { lr, power } => lr / ((n + 1) as f64).powf(power),
            LearningRate::Step {
                lr,
                step_size,
                gamma,
            } => lr * gamma.powf((n / step_size) as f64),
        }
    }

    /// Rate at iteration 0.
    pub fn base(&self) -> f64 {
        self.rate(0)
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            LearningRate::Constant { lr } => ensure_positive("learning rate", lr),
            LearningRate::InverseScaling { lr, power } => {
                ensure_positive("learning rate", lr)?;
                ensure_non_negative("power", power)
            }
            LearningRate::Step {
                lr,
                step_size,
                gamma,
            } => {
                ensure_positive("learning rate", lr)?;
                ensure_positive("gamma", gamma)?;
                if step_size == 0 {
                    return Err(LearningError::Config(
                        "step_size should be at least 1".to_string(),
                    ));
                }
                if gamma > 1.0 {
                    return Err(LearningError::Config(format!(
                        "gamma should be at most 1 but got {}",
                        gamma
                    )));
                }
                Ok(())
            }
        }
    }
}
