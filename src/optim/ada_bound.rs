//! AdaBound optimizer: Adam whose per-coordinate step is clamped into bounds that
//! converge towards a final SGD learning rate.
//!
//! # Update Rule
//!
//! For iteration `n` (0-based, before increment):
//!
//! ```text
//! step        = lr * sqrt(1 - beta2^(n+1)) / (1 - beta1^(n+1))
//! final_lr_t  = final_lr * lr / base_lr
//! lower_bound = final_lr_t * (1 - 1 / (gamma * (n+1) + 1))
//! upper_bound = final_lr_t * (1 + 1 / (gamma * (n+1)))
//! m_i         = beta1 * m_i + (1 - beta1) * g_i
//! v_i         = beta2 * v_i + (1 - beta2) * g_i^2
//! w_i         = w_i - clamp(step / (sqrt(v_i) + eps), lower_bound, upper_bound) * m_i
//! ```
//!
//! `final_lr` is a fixed hyperparameter: the ratio `lr / base_lr` is recomputed from
//! the schedule on every call and never folded back into the stored value. With a
//! constant schedule the ratio is exactly 1.
//!
//! # References
//!
//! Luo, Xiong, Liu, Sun (2019). Adaptive gradient methods with dynamic bound of
//! learning rate. arXiv:1902.09843

use std::collections::HashMap;
use std::hash::Hash;

use crate::math::clamp;
use crate::optim::Gradient;
use crate::weights::{Param, SparseWeights};

/// Default learning rate
pub const DEFAULT_LR: f64 = 1e-3;

/// Default first moment decay rate (beta1)
pub const DEFAULT_BETA1: f64 = 0.9;

/// Default second moment decay rate (beta2)
pub const DEFAULT_BETA2: f64 = 0.999;

/// Default epsilon for numerical stability
pub const DEFAULT_EPSILON: f64 = 1e-8;

/// Default convergence speed of the bounds
pub const DEFAULT_GAMMA: f64 = 1e-3;

/// Default learning rate the bounds converge to
pub const DEFAULT_FINAL_LR: f64 = 0.1;

/// Step bounds for one iteration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepBounds {
    pub lower: f64,
    pub upper: f64,
}

/// AdaBound state.
#[derive(Clone, Debug)]
pub struct AdaBound<K, V = f64> {
    /// First moment decay rate
    beta1: f64,
    /// Second moment decay rate
    beta2: f64,
    /// Numerical stability term
    eps: f64,
    /// Convergence speed of the bounds
    gamma: f64,
    /// Learning rate the bounds converge to
    final_lr: f64,
    /// key -> first moment
    m: HashMap<K, V>,
    /// key -> second moment
    v: HashMap<K, V>,
}

impl<K, V> AdaBound<K, V>
where
    K: Eq + Hash + Clone,
    V: Param,
{
    pub(crate) fn new(beta1: f64, beta2: f64, eps: f64, gamma: f64, final_lr: f64) -> Self {
        Self {
            beta1,
            beta2,
            eps,
            gamma,
            final_lr,
            m: HashMap::new(),
            v: HashMap::new(),
        }
    }

    /// Bounds used at iteration `n` when the schedule gives `lr` and started at `base_lr`.
    pub fn bounds(&self, lr: f64, base_lr: f64, n: u64) -> StepBounds {
        let t = (n + 1) as f64;
        let final_lr = self.final_lr * lr / base_lr;
        StepBounds {
            lower: final_lr * (1.0 - 1.0 / (self.gamma * t + 1.0)),
            upper: final_lr * (1.0 + 1.0 / (self.gamma * t)),
        }
    }

    pub(crate) fn update(
        &mut self,
        lr: f64,
        base_lr: f64,
        n: u64,
        weights: &mut SparseWeights<K, V>,
        gradient: &Gradient<K, V>,
    ) {
        let t = (n + 1) as f64;
        let bias_1 = 1.0 - self.beta1.powf(t);
        let bias_2 = 1.0 - self.beta2.powf(t);
        let step_size = lr * bias_2.sqrt() / bias_1;
        let bounds = self.bounds(lr, base_lr, n);

        for (key, g) in gradient {
            let m = self
                .m
                .entry(key.clone())
                .or_insert_with(|| g.zeros_like())
                .as_mut_slice();
            let v = self
                .v
                .entry(key.clone())
                .or_insert_with(|| g.zeros_like())
                .as_mut_slice();
            let w = weights.get_or_init(key).as_mut_slice();
            debug_assert_eq!(w.len(), g.as_slice().len());

            for (((wi, mi), vi), gi) in w
                .iter_mut()
                .zip(m.iter_mut())
                .zip(v.iter_mut())
                .zip(g.as_slice())
            {
                *mi = self.beta1 * *mi + (1.0 - self.beta1) * gi;
                *vi = self.beta2 * *vi + (1.0 - self.beta2) * gi * gi;

                let step = step_size / (vi.sqrt() + self.eps);
                *wi -= clamp(step, bounds.lower, bounds.upper) * *mi;
            }
        }
    }

    pub fn beta1(&self) -> f64 {
        self.beta1
    }

    pub fn beta2(&self) -> f64 {
        self.beta2
    }

    pub fn eps(&self) -> f64 {
        self.eps
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Configured final learning rate. Never modified by updates.
    pub fn final_lr(&self) -> f64 {
        self.final_lr
    }

    /// First moment for `key`.
    pub fn first_moment(&self, key: &K) -> Option<&V> {
        self.m.get(key)
    }

    /// Second moment for `key`.
    pub fn second_moment(&self, key: &K) -> Option<&V> {
        self.v.get(key)
    }

    pub(crate) fn slots(&self) -> Vec<HashMap<K, V>> {
        vec![self.m.clone(), self.v.clone()]
    }

    pub(crate) fn restore_slots(&mut self, slots: Vec<HashMap<K, V>>) {
        let mut slots = slots.into_iter();
        self.m = slots.next().unwrap_or_default();
        self.v = slots.next().unwrap_or_default();
    }

    pub(crate) fn has_state(&self, key: &K) -> bool {
        self.m.contains_key(key)
    }

    pub(crate) fn reset(&mut self) {
        self.m.clear();
        self.v.clear();
    }
}
