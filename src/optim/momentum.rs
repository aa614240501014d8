//! Momentum optimizer.
//!
//! # Update Rule
//!
//! ```text
//! s_i = rho * s_i + lr * g_i
//! w_i = w_i - s_i
//! ```
//!
//! One velocity accumulator `s` per key, created (at zero) the first time the key
//! receives a gradient.

use std::collections::HashMap;
use std::hash::Hash;

use crate::optim::Gradient;
use crate::weights::{Param, SparseWeights};

/// Default learning rate
pub const DEFAULT_LR: f64 = 0.1;

/// Default velocity decay
pub const DEFAULT_RHO: f64 = 0.9;

/// Momentum state.
#[derive(Clone, Debug)]
pub struct Momentum<K, V = f64> {
    /// Velocity decay rate
    rho: f64,
    /// key -> velocity
    s: HashMap<K, V>,
}

impl<K, V> Momentum<K, V>
where
    K: Eq + Hash + Clone,
    V: Param,
{
    pub(crate) fn new(rho: f64) -> Self {
        Self {
            rho,
            s: HashMap::new(),
        }
    }

    pub(crate) fn update(
        &mut self,
        lr: f64,
        weights: &mut SparseWeights<K, V>,
        gradient: &Gradient<K, V>,
    ) {
        for (key, g) in gradient {
            let s = self
                .s
                .entry(key.clone())
                .or_insert_with(|| g.zeros_like())
                .as_mut_slice();
            let w = weights.get_or_init(key).as_mut_slice();
            debug_assert_eq!(w.len(), g.as_slice().len());

            for ((wi, si), gi) in w.iter_mut().zip(s.iter_mut()).zip(g.as_slice()) {
                *si = self.rho * *si + lr * gi;
                *wi -= *si;
            }
        }
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    /// Velocity for `key`, if it has received a gradient.
    pub fn velocity(&self, key: &K) -> Option<&V> {
        self.s.get(key)
    }

    pub(crate) fn slots(&self) -> Vec<HashMap<K, V>> {
        vec![self.s.clone()]
    }

    pub(crate) fn restore_slots(&mut self, mut slots: Vec<HashMap<K, V>>) {
        self.s = slots.pop().unwrap_or_default();
    }

    pub(crate) fn has_state(&self, key: &K) -> bool {
        self.s.contains_key(key)
    }

    pub(crate) fn reset(&mut self) {
        self.s.clear();
    }
}
