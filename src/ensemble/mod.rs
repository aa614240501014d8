//! Ensembles of independent model replicas.

mod bagging;

pub use bagging::{BaggingClassifier, BaggingConfig, BaggingRegressor, DEFAULT_N_MODELS};
