//! Online linear models.
//!
//! - [`LinearRegression`]: squared (or absolute) loss on a real target
//! - [`LogisticRegression`]: log (or hinge) loss on a boolean target
//! - [`SoftmaxRegression`]: one weight map and one optimizer per label
//!
//! Every model follows the same per-example loop: predict, take the loss gradient with
//! respect to the prediction, build `grad[i] = x_i * g + l2 * w_i` over the features
//! of the example, and hand it to the optimizer. Weights of features absent from the
//! example are never touched.

mod glm;
mod softmax;

pub use glm::{
    DEFAULT_CLIP_GRADIENT, DEFAULT_INTERCEPT_LR, GlmConfig, GlmSnapshot, LinearRegression,
    LinearRegressionConfig, LogisticRegression, LogisticRegressionConfig,
};
pub use softmax::{SoftmaxConfig, SoftmaxRegression};
