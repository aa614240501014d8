//! streamlearn - incremental parameter updates for online machine learning
//!
//! Models learn one example at a time. Parameters live in sparse, lazily initialized
//! maps keyed by feature name, label, user or item; optimizers touch only the keys
//! present in a gradient.
//!
//! ```
//! use streamlearn::base::{Features, Regressor};
//! use streamlearn::linear_model::LinearRegression;
//!
//! let mut model = LinearRegression::default();
//! let x: Features<&str> = [("x", 1.0)].into_iter().collect();
//! for _ in 0..200 {
//!     model.fit_one(&x, 3.0);
//! }
//! assert!((model.predict_one(&x) - 3.0).abs() < 0.5);
//! ```

pub mod base;
pub mod ensemble;
pub mod initializer;
pub mod learning;
pub mod linear_model;
pub mod loss;
pub mod math;
pub mod optim;
pub mod reco;
pub mod stats;
pub mod weights;

pub use base::{Classifier, Features, Regressor};
pub use initializer::Initializer;
pub use learning::{LearningError, Result};
pub use optim::{LearningRate, Optimizer, OptimizerConfig};
pub use reco::Recommender;
pub use weights::SparseWeights;
