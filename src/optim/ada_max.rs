//! AdaMax optimizer: Adam with the infinity norm in place of the second moment.
//!
//! # Update Rule
//!
//! ```text
//! lr_t = lr / (1 - beta1^(n+1))
//! m_i  = beta1 * m_i + (1 - beta1) * g_i
//! u_i  = max(beta2 * u_i, |g_i|)
//! w_i  = w_i - lr_t * m_i / (u_i + eps)
//! ```
//!
//! The bias correction is applied to the learning rate rather than to `m`, which
//! is equivalent and saves a division per coordinate.

use std::collections::HashMap;
use std::hash::Hash;

use crate::optim::Gradient;
use crate::weights::{Param, SparseWeights};

/// Default learning rate
pub const DEFAULT_LR: f64 = 0.1;

/// Default first moment decay rate (beta1)
pub const DEFAULT_BETA1: f64 = 0.9;

/// Default infinity-norm decay rate (beta2)
pub const DEFAULT_BETA2: f64 = 0.999;

/// Default epsilon for numerical stability
pub const DEFAULT_EPSILON: f64 = 1e-8;

/// AdaMax state.
#[derive(Clone, Debug)]
pub struct AdaMax<K, V = f64> {
    /// First moment decay rate
    beta1: f64,
    /// Infinity-norm decay rate
    beta2: f64,
    /// Numerical stability term
    eps: f64,
    /// key -> first moment
    m: HashMap<K, V>,
    /// key -> exponentially weighted infinity norm
    u: HashMap<K, V>,
}

impl<K, V> AdaMax<K, V>
where
    K: Eq + Hash + Clone,
    V: Param,
{
    pub(crate) fn new(beta1: f64, beta2: f64, eps: f64) -> Self {
        Self {
            beta1,
            beta2,
            eps,
            m: HashMap::new(),
            u: HashMap::new(),
        }
    }

    /// Apply one step. `n` is the iteration count before this call.
    pub(crate) fn update(
        &mut self,
        lr: f64,
        n: u64,
        weights: &mut SparseWeights<K, V>,
        gradient: &Gradient<K, V>,
    ) {
        let lr_t = lr / (1.0 - self.beta1.powf((n + 1) as f64));

        for (key, g) in gradient {
            let m = self
                .m
                .entry(key.clone())
                .or_insert_with(|| g.zeros_like())
                .as_mut_slice();
            let u = self
                .u
                .entry(key.clone())
                .or_insert_with(|| g.zeros_like())
                .as_mut_slice();
            let w = weights.get_or_init(key).as_mut_slice();
            debug_assert_eq!(w.len(), g.as_slice().len());

            for (((wi, mi), ui), gi) in w
                .iter_mut()
                .zip(m.iter_mut())
                .zip(u.iter_mut())
                .zip(g.as_slice())
            {
                *mi = self.beta1 * *mi + (1.0 - self.beta1) * gi;
                *ui = (self.beta2 * *ui).max(gi.abs());
                *wi -= lr_t * *mi / (*ui + self.eps);
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

    /// First moment for `key`.
    pub fn first_moment(&self, key: &K) -> Option<&V> {
        self.m.get(key)
    }

    /// Infinity-norm accumulator for `key`.
    pub fn infinity_norm(&self, key: &K) -> Option<&V> {
        self.u.get(key)
    }

    pub(crate) fn slots(&self) -> Vec<HashMap<K, V>> {
        vec![self.m.clone(), self.u.clone()]
    }

    pub(crate) fn restore_slots(&mut self, slots: Vec<HashMap<K, V>>) {
        let mut slots = slots.into_iter();
        self.m = slots.next().unwrap_or_default();
        self.u = slots.next().unwrap_or_default();
    }

    pub(crate) fn has_state(&self, key: &K) -> bool {
        self.m.contains_key(key)
    }

    pub(crate) fn reset(&mut self) {
        self.m.clear();
        self.u.clear();
    }
}
