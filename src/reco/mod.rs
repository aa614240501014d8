//! Recommenders trained on a stream of `(user, item, rating)` triples.
//!
//! Both models predict around a running global mean of every rating seen:
//!
//! ```text
//! Baseline:  y = mean + b_u + b_i
//! BiasedMF:  y = mean + b_u + b_i + <v_u, v_i>
//! ```
//!
//! Per example the global mean is updated first, so the gradient of that same example
//! already sees the new mean. The loss gradient is then clipped and pushed through one
//! optimizer per parameter group.
//!
//! Predicting for an unseen user or item registers it: its bias and latent vector are
//! materialized from the initializers and stay in the model.

mod baseline;
mod biased_mf;

pub use baseline::{Baseline, BaselineConfig, BaselineSnapshot};
pub use biased_mf::{BiasedMF, BiasedMfConfig, BiasedMfSnapshot, DEFAULT_N_FACTORS};

/// Trait for online recommenders.
pub trait Recommender<U, I> {
    /// Update the model with the rating `y` given by `user` to `item`.
    fn fit_one(&mut self, user: &U, item: &I, y: f64) -> &mut Self;

    /// Predict the rating of `user` for `item`, registering either if unseen.
    fn predict_one(&mut self, user: &U, item: &I) -> f64;
}
