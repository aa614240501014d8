//! Plain stochastic gradient descent: `w_i <- w_i - lr * g_i`.

use std::hash::Hash;

use crate::optim::Gradient;
use crate::weights::{Param, SparseWeights};

/// Default learning rate.
pub const DEFAULT_LR: f64 = 0.01;

/// SGD keeps no per-key state.
#[derive(Clone, Debug, Default)]
pub struct Sgd;

impl Sgd {
    pub(crate) fn update<K, V>(
        &mut self,
        lr: f64,
        weights: &mut SparseWeights<K, V>,
        gradient: &Gradient<K, V>,
    ) where
        K: Eq + Hash + Clone,
        V: Param,
    {
        for (key, g) in gradient {
            let w = weights.get_or_init(key).as_mut_slice();
            debug_assert_eq!(w.len(), g.as_slice().len());

            for (wi, gi) in w.iter_mut().zip(g.as_slice()) {
                *wi -= lr * gi;
            }
        }
    }
}
