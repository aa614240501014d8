//! Core traits shared by every online model.
//!
//! Models consume one example at a time and can predict at any point. `fit_one`
//! never fails: invalid hyperparameters are rejected when the model is built.

use std::collections::HashMap;
use std::hash::Hash;

use crate::math::argmax;

/// Sparse feature map: feature key -> value.
pub type Features<K> = HashMap<K, f64>;

/// Trait for online regressors.
///
/// # Examples
///
/// ```
/// use streamlearn::base::{Features, Regressor};
/// use streamlearn::linear_model::LinearRegression;
///
/// let mut model = LinearRegression::<&str>::default();
/// let x: Features<&str> = [("x", 1.0)].into_iter().collect();
///
/// model.fit_one(&x, 3.0).fit_one(&x, 3.0);
/// assert!(model.predict_one(&x) > 0.0);
/// ```
pub trait Regressor<K> {
    /// Update the model with one example. Returns the model for chaining.
    fn fit_one(&mut self, x: &Features<K>, y: f64) -> &mut Self;

    /// Predict the target of `x`.
    fn predict_one(&self, x: &Features<K>) -> f64;
}

/// Trait for online classifiers over labels `L`.
pub trait Classifier<K, L>
where
    L: Eq + Hash + Clone,
{
    /// Update the model with one example. Returns the model for chaining.
    fn fit_one(&mut self, x: &Features<K>, y: &L) -> &mut Self;

    /// Probability of each known label. Empty when no label is known yet.
    fn predict_proba_one(&self, x: &Features<K>) -> HashMap<L, f64>;

    /// Most probable label, or `None` when no label is known yet.
    fn predict_one(&self, x: &Features<K>) -> Option<L> {
        argmax(&self.predict_proba_one(x))
    }
}
